//! Crawl tasks spawned by the poller.
//!
//! Every dispatched command becomes one task on a `JoinSet` that replies to
//! the command, runs the crawl and then edits the command message. The
//! poller reaps finished tasks each cycle so their outcome is logged, and
//! cancels the rest on shutdown.

use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::error::HarvestError;
use crate::harvest::crawl::{CrawlReport, Crawler};
use crate::harvest::model::Peer;
use crate::harvest::notify::{Completion, CompletionNotifier};
use crate::harvest::platform::Platform;

/// A `download <reference>` message found in Saved Messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadCommand {
    pub message_id: i32,
    pub reference: String,
}

#[derive(Debug)]
pub struct TaskOutcome {
    pub command: DownloadCommand,
    pub result: Result<CrawlReport, HarvestError>,
}

pub struct TaskPool<P> {
    crawler: Crawler<P>,
    notifier: CompletionNotifier,
    tasks: JoinSet<TaskOutcome>,
    shutdown: CancellationToken,
}

impl<P: Platform> TaskPool<P> {
    pub fn new(
        crawler: Crawler<P>,
        notifier: CompletionNotifier,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            crawler,
            notifier,
            tasks: JoinSet::new(),
            shutdown,
        }
    }

    pub fn platform(&self) -> &P {
        self.crawler.platform()
    }

    pub fn active(&self) -> usize {
        self.tasks.len()
    }

    /// Start a crawl for `command` and return immediately.
    pub fn spawn(&mut self, command: DownloadCommand) {
        let crawler = self.crawler.clone();
        let notifier = self.notifier.clone();
        let cancel = self.shutdown.child_token();
        self.tasks
            .spawn(async move { run_task(crawler, notifier, command, cancel).await });
    }

    /// Collect tasks that have already finished, without waiting.
    pub fn reap(&mut self) -> Vec<TaskOutcome> {
        let mut done = Vec::new();
        while let Some(joined) = self.tasks.try_join_next() {
            if let Some(outcome) = log_joined(joined) {
                done.push(outcome);
            }
        }
        done
    }

    /// Wait for every task to finish.
    pub async fn join_all(&mut self) -> Vec<TaskOutcome> {
        let mut done = Vec::new();
        while let Some(joined) = self.tasks.join_next().await {
            if let Some(outcome) = log_joined(joined) {
                done.push(outcome);
            }
        }
        done
    }

    /// Cancel all running crawls and wait for them to wind down.
    pub async fn shutdown(mut self) -> Vec<TaskOutcome> {
        if !self.tasks.is_empty() {
            log::info!("Cancelling {} running crawl(s)…", self.tasks.len());
        }
        self.shutdown.cancel();
        self.join_all().await
    }
}

async fn run_task<P: Platform>(
    crawler: Crawler<P>,
    notifier: CompletionNotifier,
    command: DownloadCommand,
    cancel: CancellationToken,
) -> TaskOutcome {
    if let Err(e) = notifier
        .announce_start(
            crawler.platform().as_ref(),
            &Peer::SelfChat,
            command.message_id,
            &command.reference,
        )
        .await
    {
        log::warn!("Command {}: {}", command.message_id, e);
    }

    let result = crawler.crawl(&command.reference, &cancel).await;

    let completion = match &result {
        Ok(_) => Some(Completion::Succeeded),
        // Leave the command text in place so it can be re-issued.
        Err(HarvestError::Cancelled) => None,
        Err(_) => Some(Completion::Failed),
    };
    if let Some(completion) = completion {
        match notifier
            .notify(
                crawler.platform().as_ref(),
                &Peer::SelfChat,
                command.message_id,
                completion,
            )
            .await
        {
            Ok(()) => log::info!(
                "Command {} marked \"{}\"",
                command.message_id,
                notifier.text_for(completion)
            ),
            Err(e) => log::warn!("Command {}: {}", command.message_id, e),
        }
    }

    TaskOutcome { command, result }
}

fn log_joined(joined: Result<TaskOutcome, JoinError>) -> Option<TaskOutcome> {
    match joined {
        Ok(outcome) => {
            match &outcome.result {
                Ok(report) => log::info!(
                    "Command {} ({}) done: {} video(s) saved to {}",
                    outcome.command.message_id,
                    outcome.command.reference,
                    report.downloaded.len(),
                    report.output_dir.display()
                ),
                Err(HarvestError::Cancelled) => log::info!(
                    "Command {} ({}) cancelled",
                    outcome.command.message_id,
                    outcome.command.reference
                ),
                Err(e) if e.is_resolution() => log::warn!(
                    "Command {} ({}): {}",
                    outcome.command.message_id,
                    outcome.command.reference,
                    e
                ),
                Err(e) => log::error!(
                    "Command {} ({}) failed: {}",
                    outcome.command.message_id,
                    outcome.command.reference,
                    e
                ),
            }
            Some(outcome)
        }
        Err(e) => {
            log::error!("Crawl task panicked or was aborted: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CompletionSettings, CrawlSettings};
    use crate::error::PlatformError;
    use crate::harvest::mock::{channel_entity, MockPlatform, Outgoing};
    use std::sync::Arc;

    fn pool(platform: &MockPlatform, root: &std::path::Path) -> TaskPool<MockPlatform> {
        let settings = CrawlSettings {
            pacing_min_minutes: 0,
            pacing_max_minutes: 0,
            ..CrawlSettings::default()
        };
        TaskPool::new(
            Crawler::new(Arc::new(platform.clone()), &settings, root.to_path_buf()),
            CompletionNotifier::new(&CompletionSettings::default()),
            CancellationToken::new(),
        )
    }

    fn command(id: i32, reference: &str) -> DownloadCommand {
        DownloadCommand {
            message_id: id,
            reference: reference.to_string(),
        }
    }

    #[tokio::test]
    async fn successful_crawl_marks_finished() {
        let dir = tempfile::tempdir().unwrap();
        let platform = MockPlatform::new();
        platform.with_entity("foo", channel_entity("foo"));

        let mut pool = pool(&platform, dir.path());
        pool.spawn(command(12, "https://t.me/foo"));
        let outcomes = pool.join_all().await;

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].result.is_ok());
        let edits = platform.edits();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].message_id, 12);
        assert_eq!(edits[0].text, "finished");
    }

    #[tokio::test]
    async fn start_reply_comes_before_completion_edit() {
        let dir = tempfile::tempdir().unwrap();
        let platform = MockPlatform::new();
        platform.with_entity("foo", channel_entity("foo"));

        let mut pool = pool(&platform, dir.path());
        pool.spawn(command(12, "foo"));
        pool.join_all().await;

        assert_eq!(
            platform.outgoing(),
            vec![
                Outgoing::Reply {
                    reply_to: 12,
                    text: "Downloading videos from foo…".into(),
                },
                Outgoing::Edit {
                    message_id: 12,
                    text: "finished".into(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn start_reply_failure_does_not_block_crawl() {
        let dir = tempfile::tempdir().unwrap();
        let platform = MockPlatform::new();
        platform.with_entity("foo", channel_entity("foo"));
        platform.fail_replies(PlatformError::Rpc("CHAT_WRITE_FORBIDDEN".into()));

        let mut pool = pool(&platform, dir.path());
        pool.spawn(command(12, "foo"));
        let outcomes = pool.join_all().await;

        assert!(outcomes[0].result.is_ok());
        assert_eq!(platform.resolves(), vec!["foo".to_string()]);
        assert_eq!(platform.edits()[0].text, "finished");
    }

    #[tokio::test]
    async fn failed_crawl_marks_failed() {
        let dir = tempfile::tempdir().unwrap();
        let platform = MockPlatform::new();

        let mut pool = pool(&platform, dir.path());
        pool.spawn(command(13, "nobody"));
        let outcomes = pool.join_all().await;

        assert!(matches!(outcomes[0].result, Err(HarvestError::NotFound(_))));
        assert_eq!(platform.edits()[0].text, "failed");
    }

    #[tokio::test]
    async fn edit_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let platform = MockPlatform::new();
        platform.with_entity("foo", channel_entity("foo"));
        platform.fail_edits(PlatformError::Rpc(
            "MESSAGE_EDIT_TIME_EXPIRED".into(),
        ));

        let mut pool = pool(&platform, dir.path());
        pool.spawn(command(14, "foo"));
        let outcomes = pool.join_all().await;
        assert!(outcomes[0].result.is_ok());
    }

    #[tokio::test]
    async fn concurrent_commands_run_independently() {
        let dir = tempfile::tempdir().unwrap();
        let platform = MockPlatform::new();
        platform.with_entity("foo", channel_entity("foo"));

        let mut pool = pool(&platform, dir.path());
        pool.spawn(command(1, "foo"));
        pool.spawn(command(2, "missing"));
        let mut ids: Vec<i32> = pool
            .join_all()
            .await
            .iter()
            .map(|o| o.command.message_id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(platform.edits().len(), 2);
    }

    #[tokio::test]
    async fn reap_returns_nothing_when_idle() {
        let dir = tempfile::tempdir().unwrap();
        let platform = MockPlatform::new();
        let mut pool = pool(&platform, dir.path());
        assert!(pool.reap().is_empty());
        assert_eq!(pool.active(), 0);
    }
}
