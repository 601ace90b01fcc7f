//! Scriptable in-memory [`Platform`] for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::error::PlatformError;
use crate::harvest::model::{
    Attachment, Attribute, Entity, HistoryPage, Media, Message, Peer, ResolvedChannel,
};
use crate::harvest::platform::Platform;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub peer: Peer,
    pub offset_id: i32,
    pub limit: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRequest {
    pub attachment_id: i64,
    pub offset: i64,
    pub limit: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub peer: Peer,
    pub message_id: i32,
    pub text: String,
}

/// Replies and edits in the order they were made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Reply { reply_to: i32, text: String },
    Edit { message_id: i32, text: String },
}

#[derive(Default)]
struct State {
    entities: HashMap<String, Entity>,
    resolve_error: Option<PlatformError>,
    /// Saved Messages, newest first.
    saved: Vec<Message>,
    saved_failures: usize,
    channel_pages: VecDeque<Result<HistoryPage, PlatformError>>,
    chunks: HashMap<i64, VecDeque<Result<Vec<u8>, PlatformError>>>,
    edit_error: Option<PlatformError>,
    /// Cancelled once this many chunk requests have been served.
    cancel_on_chunk: Option<(usize, CancellationToken)>,
    reply_error: Option<PlatformError>,
    resolves: Vec<String>,
    history_requests: Vec<HistoryRequest>,
    chunk_requests: Vec<ChunkRequest>,
    edits: Vec<Edit>,
    outgoing: Vec<Outgoing>,
}

#[derive(Clone, Default)]
pub struct MockPlatform {
    state: Arc<Mutex<State>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(&self, handle: &str, entity: Entity) -> &Self {
        self.state
            .lock()
            .unwrap()
            .entities
            .insert(handle.to_ascii_lowercase(), entity);
        self
    }

    pub fn fail_resolve(&self, err: PlatformError) {
        self.state.lock().unwrap().resolve_error = Some(err);
    }

    /// Append a message to Saved Messages (it becomes the newest).
    pub fn send_to_self(&self, id: i32, text: &str) {
        self.state.lock().unwrap().saved.insert(
            0,
            Message {
                id,
                text: text.to_string(),
                media: Media::None,
            },
        );
    }

    /// Make the next `count` Saved Messages fetches fail.
    pub fn fail_saved_fetches(&self, count: usize) {
        self.state.lock().unwrap().saved_failures = count;
    }

    pub fn push_page(&self, page: HistoryPage) {
        self.state.lock().unwrap().channel_pages.push_back(Ok(page));
    }

    pub fn push_page_error(&self, err: PlatformError) {
        self.state.lock().unwrap().channel_pages.push_back(Err(err));
    }

    pub fn push_chunk(&self, attachment_id: i64, bytes: Vec<u8>) {
        self.state
            .lock()
            .unwrap()
            .chunks
            .entry(attachment_id)
            .or_default()
            .push_back(Ok(bytes));
    }

    pub fn push_chunk_error(&self, attachment_id: i64, err: PlatformError) {
        self.state
            .lock()
            .unwrap()
            .chunks
            .entry(attachment_id)
            .or_default()
            .push_back(Err(err));
    }

    pub fn cancel_after_chunks(&self, count: usize, token: CancellationToken) {
        self.state.lock().unwrap().cancel_on_chunk = Some((count, token));
    }

    pub fn fail_edits(&self, err: PlatformError) {
        self.state.lock().unwrap().edit_error = Some(err);
    }

    pub fn fail_replies(&self, err: PlatformError) {
        self.state.lock().unwrap().reply_error = Some(err);
    }

    pub fn resolves(&self) -> Vec<String> {
        self.state.lock().unwrap().resolves.clone()
    }

    pub fn history_requests(&self) -> Vec<HistoryRequest> {
        self.state.lock().unwrap().history_requests.clone()
    }

    pub fn chunk_requests(&self) -> Vec<ChunkRequest> {
        self.state.lock().unwrap().chunk_requests.clone()
    }

    pub fn edits(&self) -> Vec<Edit> {
        self.state.lock().unwrap().edits.clone()
    }

    pub fn outgoing(&self) -> Vec<Outgoing> {
        self.state.lock().unwrap().outgoing.clone()
    }
}

impl Platform for MockPlatform {
    async fn resolve_channel(&self, handle: &str) -> Result<Option<Entity>, PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.resolves.push(handle.to_string());
        if let Some(err) = state.resolve_error.clone() {
            return Err(err);
        }
        // Usernames are case-insensitive.
        Ok(state.entities.get(&handle.to_ascii_lowercase()).cloned())
    }

    async fn fetch_history(
        &self,
        peer: &Peer,
        offset_id: i32,
        limit: i32,
    ) -> Result<HistoryPage, PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.history_requests.push(HistoryRequest {
            peer: peer.clone(),
            offset_id,
            limit,
        });
        match peer {
            Peer::SelfChat => {
                if state.saved_failures > 0 {
                    state.saved_failures -= 1;
                    return Err(PlatformError::Rpc("FLOOD_WAIT_5".into()));
                }
                let page: Vec<Message> = state
                    .saved
                    .iter()
                    .filter(|m| offset_id == 0 || m.id < offset_id)
                    .take(limit.max(0) as usize)
                    .cloned()
                    .collect();
                Ok(HistoryPage::Messages(page))
            }
            Peer::Channel(_) => state
                .channel_pages
                .pop_front()
                .unwrap_or(Ok(HistoryPage::Empty)),
        }
    }

    async fn fetch_file_chunk(
        &self,
        attachment: &Attachment,
        offset: i64,
        limit: i32,
    ) -> Result<Vec<u8>, PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.chunk_requests.push(ChunkRequest {
            attachment_id: attachment.id,
            offset,
            limit,
        });
        if let Some((count, token)) = &state.cancel_on_chunk {
            if state.chunk_requests.len() == *count {
                token.cancel();
            }
        }
        state
            .chunks
            .get_mut(&attachment.id)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(Ok(Vec::new()))
    }

    async fn edit_message(
        &self,
        peer: &Peer,
        message_id: i32,
        text: &str,
    ) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.edit_error.clone() {
            return Err(err);
        }
        state.edits.push(Edit {
            peer: peer.clone(),
            message_id,
            text: text.to_string(),
        });
        state.outgoing.push(Outgoing::Edit {
            message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_reply(
        &self,
        _peer: &Peer,
        reply_to: i32,
        text: &str,
    ) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.reply_error.clone() {
            return Err(err);
        }
        state.outgoing.push(Outgoing::Reply {
            reply_to,
            text: text.to_string(),
        });
        Ok(())
    }
}

// ── Fixtures ──────────────────────────────────────────────────────────────────

pub fn resolved(handle: &str) -> ResolvedChannel {
    ResolvedChannel {
        id: 1000,
        access_hash: 77,
        handle: handle.to_string(),
        title: format!("{handle} title"),
    }
}

pub fn channel_entity(handle: &str) -> Entity {
    Entity::Channel(resolved(handle))
}

pub fn video(id: i64, name: Option<&str>) -> Attachment {
    let mut attributes = vec![Attribute::Video];
    if let Some(name) = name {
        attributes.push(Attribute::Filename(name.to_string()));
    }
    Attachment {
        id,
        access_hash: id * 10,
        file_reference: vec![1, 2, 3],
        mime_type: "video/mp4".to_string(),
        attributes,
        size: None,
    }
}

pub fn document(id: i64, mime: &str) -> Attachment {
    Attachment {
        id,
        access_hash: id * 10,
        file_reference: vec![1, 2, 3],
        mime_type: mime.to_string(),
        attributes: vec![],
        size: None,
    }
}

pub fn message(id: i32, media: Media) -> Message {
    Message {
        id,
        text: String::new(),
        media,
    }
}
