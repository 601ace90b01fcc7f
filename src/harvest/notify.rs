use crate::config::CompletionSettings;
use crate::error::HarvestError;
use crate::harvest::model::Peer;
use crate::harvest::platform::Platform;

/// How a crawl task ended, as far as the operator needs to know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Succeeded,
    Failed,
}

/// Tells the operator about a command: a reply when its crawl starts, and
/// an edit of the command message once it is over.
#[derive(Debug, Clone)]
pub struct CompletionNotifier {
    start_text: String,
    success_text: String,
    failure_text: String,
}

impl CompletionNotifier {
    pub fn new(settings: &CompletionSettings) -> Self {
        Self {
            start_text: settings.start_text.clone(),
            success_text: settings.success_text.clone(),
            failure_text: settings.failure_text.clone(),
        }
    }

    pub fn text_for(&self, completion: Completion) -> &str {
        match completion {
            Completion::Succeeded => &self.success_text,
            Completion::Failed => &self.failure_text,
        }
    }

    /// `None` when start replies are turned off.
    pub fn start_text_for(&self, reference: &str) -> Option<String> {
        if self.start_text.is_empty() {
            return None;
        }
        Some(self.start_text.replace("{channel}", reference))
    }

    /// Reply to the command message that its crawl has started. Best
    /// effort, like [`notify`](Self::notify).
    pub async fn announce_start<P: Platform>(
        &self,
        platform: &P,
        peer: &Peer,
        message_id: i32,
        reference: &str,
    ) -> Result<(), HarvestError> {
        let Some(text) = self.start_text_for(reference) else {
            return Ok(());
        };
        platform
            .send_reply(peer, message_id, &text)
            .await
            .map_err(HarvestError::Notification)
    }

    /// Best effort. Telegram refuses edits after 48 hours; the caller logs
    /// the error and moves on.
    pub async fn notify<P: Platform>(
        &self,
        platform: &P,
        peer: &Peer,
        message_id: i32,
        completion: Completion,
    ) -> Result<(), HarvestError> {
        platform
            .edit_message(peer, message_id, self.text_for(completion))
            .await
            .map_err(HarvestError::Notification)
    }
}
