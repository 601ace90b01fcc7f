//! Polls Saved Messages for `download <channel>` commands.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::PollSettings;
use crate::error::HarvestError;
use crate::harvest::model::{Message, Peer};
use crate::harvest::platform::Platform;
use crate::harvest::tasks::{DownloadCommand, TaskPool};

const COMMAND_PREFIX: &str = "download ";

/// Extract the channel reference from a `download <reference>` message.
///
/// The prefix is matched case-insensitively; only the first
/// whitespace-delimited token after it is used.
pub fn parse_command(text: &str) -> Option<String> {
    let text = text.trim_start();
    let head = text.get(..COMMAND_PREFIX.len())?;
    if !head.eq_ignore_ascii_case(COMMAND_PREFIX) {
        return None;
    }
    text[COMMAND_PREFIX.len()..]
        .split_whitespace()
        .next()
        .map(str::to_string)
}

/// Highest Saved Messages id already handled. Never decreases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollState {
    high_water_mark: i32,
}

impl PollState {
    pub fn high_water_mark(&self) -> i32 {
        self.high_water_mark
    }

    pub fn advance(&mut self, message_id: i32) {
        self.high_water_mark = self.high_water_mark.max(message_id);
    }
}

pub struct CommandPoller<P> {
    settings: PollSettings,
    state: PollState,
    pool: TaskPool<P>,
    shutdown: CancellationToken,
}

impl<P: Platform> CommandPoller<P> {
    pub fn new(settings: PollSettings, pool: TaskPool<P>, shutdown: CancellationToken) -> Self {
        Self {
            settings,
            state: PollState::default(),
            pool,
            shutdown,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    #[cfg(test)]
    pub fn pool_mut(&mut self) -> &mut TaskPool<P> {
        &mut self.pool
    }

    async fn fetch_recent(&self) -> Result<Vec<Message>, HarvestError> {
        let page = self
            .pool
            .platform()
            .fetch_history(&Peer::SelfChat, 0, self.settings.limit)
            .await
            .map_err(HarvestError::Poll)?;
        Ok(page.into_messages())
    }

    /// Treat everything already in Saved Messages as handled.
    pub async fn seed(&mut self) -> Result<(), HarvestError> {
        let messages = self.fetch_recent().await?;
        if let Some(newest) = messages.iter().map(|m| m.id).max() {
            self.state.advance(newest);
        }
        log::info!(
            "Ignoring existing Saved Messages up to id {}",
            self.state().high_water_mark()
        );
        Ok(())
    }

    /// One poll cycle: dispatch every unseen command, oldest first.
    /// Returns the commands dispatched.
    pub async fn poll_once(&mut self) -> Result<Vec<DownloadCommand>, HarvestError> {
        let mut messages = self.fetch_recent().await?;
        messages.sort_by_key(|m| m.id);

        let mut dispatched = Vec::new();
        for message in messages {
            if message.id <= self.state.high_water_mark() {
                continue;
            }
            match parse_command(&message.text) {
                Some(reference) => {
                    log::info!("Command {}: download {}", message.id, reference);
                    let command = DownloadCommand {
                        message_id: message.id,
                        reference,
                    };
                    self.pool.spawn(command.clone());
                    dispatched.push(command);
                }
                None => log::debug!("Ignoring message {}", message.id),
            }
            self.state.advance(message.id);
        }
        Ok(dispatched)
    }

    /// Poll until shutdown, then cancel and drain the running crawls.
    pub async fn run(mut self) {
        let interval = Duration::from_secs(self.settings.interval_secs);

        if self.settings.seed_from_history {
            while let Err(e) = self.seed().await {
                log::error!("{}", e);
                if !self.pause(interval).await {
                    return;
                }
            }
        }

        log::info!(
            "Watching Saved Messages every {}s for \"download <channel>\" commands",
            self.settings.interval_secs
        );
        while self.pause(interval).await {
            self.pool.reap();
            if self.pool.active() > 0 {
                log::debug!("{} crawl(s) running", self.pool.active());
            }
            if let Err(e) = self.poll_once().await {
                log::error!("{}", e);
            }
        }

        self.pool.shutdown().await;
    }

    /// Sleep for `interval`; false if shutdown was requested meanwhile.
    async fn pause(&self, interval: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(interval) => true,
        }
    }
}
