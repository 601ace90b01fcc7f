//! Walks a channel's full history and downloads every video in it.
//!
//! A crawl is a small state machine. Suspension happens only while fetching
//! a page, inside the download chunk loop and while pacing, and each of
//! those waits also watches the task's cancellation token.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::CrawlSettings;
use crate::error::HarvestError;
use crate::harvest::classify;
use crate::harvest::download::{ChunkedDownloader, DownloadedFile};
use crate::harvest::model::{Attachment, Entity, Media, Message, Peer, ResolvedChannel};
use crate::harvest::pacing::PacingPolicy;
use crate::harvest::platform::Platform;

const LINK_PREFIXES: [&str; 3] = ["https://t.me/", "http://t.me/", "t.me/"];

/// Reduce a link or handle to a bare handle.
///
/// At most one link prefix is removed; a leading `@` is dropped as well.
pub fn normalize_reference(reference: &str) -> String {
    let trimmed = reference.trim();
    let stripped = LINK_PREFIXES
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(prefix))
        .unwrap_or(trimmed);
    let stripped = stripped.trim();
    stripped.strip_prefix('@').unwrap_or(stripped).to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub handle: String,
    pub channel_id: i64,
    pub title: String,
    pub output_dir: PathBuf,
    pub pages: usize,
    pub videos_seen: usize,
    pub downloaded: Vec<DownloadedFile>,
    /// Message ids whose download failed.
    pub failed: Vec<i32>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CrawlReport {
    fn new(channel: &ResolvedChannel, output_dir: PathBuf) -> Self {
        Self {
            handle: channel.handle.clone(),
            channel_id: channel.id,
            title: channel.title.clone(),
            output_dir,
            pages: 0,
            videos_seen: 0,
            downloaded: Vec::new(),
            failed: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn bytes_downloaded(&self) -> u64 {
        self.downloaded.iter().map(|f| f.bytes).sum()
    }
}

/// Progress through one resolved channel. Only exists once resolution has
/// succeeded, so every later state has a peer and a report to write to.
struct Walk {
    peer: Peer,
    report: CrawlReport,
    /// Unprocessed messages of the current page, newest first.
    items: VecDeque<Message>,
    /// `None` when the current page was the last one to fetch.
    next_cursor: Option<i32>,
}

enum CrawlState {
    Resolving,
    FetchingPage {
        walk: Walk,
        cursor: i32,
    },
    ClassifyingItem(Walk),
    Downloading {
        walk: Walk,
        message_id: i32,
        attachment: Attachment,
    },
    Pacing(Walk),
    Done(CrawlReport),
    Failed(HarvestError),
    Cancelled,
}

/// Shared, immutable crawl configuration. Cheap to clone into tasks.
pub struct Crawler<P> {
    platform: Arc<P>,
    downloader: ChunkedDownloader,
    pacing: PacingPolicy,
    page_limit: i32,
    output_root: PathBuf,
    per_channel_dirs: bool,
}

impl<P> Clone for Crawler<P> {
    fn clone(&self) -> Self {
        Self {
            platform: Arc::clone(&self.platform),
            downloader: self.downloader,
            pacing: self.pacing,
            page_limit: self.page_limit,
            output_root: self.output_root.clone(),
            per_channel_dirs: self.per_channel_dirs,
        }
    }
}

impl<P: Platform> Crawler<P> {
    pub fn new(platform: Arc<P>, settings: &CrawlSettings, output_root: PathBuf) -> Self {
        Self {
            platform,
            downloader: ChunkedDownloader::new(settings.chunk_size),
            pacing: PacingPolicy::new(settings.pacing_min_minutes, settings.pacing_max_minutes),
            page_limit: settings.page_limit,
            output_root,
            per_channel_dirs: settings.per_channel_dirs,
        }
    }

    pub fn platform(&self) -> &Arc<P> {
        &self.platform
    }

    /// Crawl the channel behind `reference` from newest to oldest message.
    ///
    /// Fails only if the channel cannot be resolved, the output directory
    /// cannot be created, or a history page cannot be fetched. Individual
    /// download failures are recorded in the report.
    pub async fn crawl(
        &self,
        reference: &str,
        cancel: &CancellationToken,
    ) -> Result<CrawlReport, HarvestError> {
        let run = CrawlRun {
            crawler: self,
            handle: normalize_reference(reference),
            cancel,
        };
        let mut state = CrawlState::Resolving;
        loop {
            state = match state {
                CrawlState::Done(mut report) => {
                    report.finished_at = Some(Utc::now());
                    log::info!(
                        "[@{}] crawl finished: {} pages, {} videos, {} downloaded ({} bytes), {} failed",
                        report.handle,
                        report.pages,
                        report.videos_seen,
                        report.downloaded.len(),
                        report.bytes_downloaded(),
                        report.failed.len()
                    );
                    return Ok(report);
                }
                CrawlState::Failed(err) => {
                    log::error!("[@{}] crawl failed: {}", run.handle, err);
                    return Err(err);
                }
                CrawlState::Cancelled => {
                    log::info!("[@{}] crawl cancelled", run.handle);
                    return Err(HarvestError::Cancelled);
                }
                _ if cancel.is_cancelled() => CrawlState::Cancelled,
                state => run.step(state).await,
            };
        }
    }
}

struct CrawlRun<'a, P> {
    crawler: &'a Crawler<P>,
    handle: String,
    cancel: &'a CancellationToken,
}

impl<P: Platform> CrawlRun<'_, P> {
    async fn step(&self, state: CrawlState) -> CrawlState {
        match state {
            CrawlState::Resolving => match self.resolve().await {
                Ok(walk) => CrawlState::FetchingPage { walk, cursor: 0 },
                Err(err) => CrawlState::Failed(err),
            },
            CrawlState::FetchingPage { walk, cursor } => self.fetch_page(walk, cursor).await,
            CrawlState::ClassifyingItem(mut walk) => match walk.items.pop_front() {
                None => match walk.next_cursor.take() {
                    Some(cursor) if cursor != 0 => CrawlState::FetchingPage { walk, cursor },
                    _ => CrawlState::Done(walk.report),
                },
                Some(message) => match message.media {
                    Media::Document(attachment) if classify::is_video(&attachment) => {
                        CrawlState::Downloading {
                            walk,
                            message_id: message.id,
                            attachment,
                        }
                    }
                    Media::Document(_) | Media::Other | Media::None => {
                        CrawlState::ClassifyingItem(walk)
                    }
                },
            },
            CrawlState::Downloading {
                mut walk,
                message_id,
                attachment,
            } => match self.download(&mut walk.report, message_id, &attachment).await {
                Err(HarvestError::Cancelled) => CrawlState::Cancelled,
                _ => CrawlState::Pacing(walk),
            },
            CrawlState::Pacing(walk) => {
                let delay = self.crawler.pacing.next_delay();
                if !delay.is_zero() {
                    log::info!(
                        "[@{}] waiting {} min before the next video",
                        self.handle,
                        delay.as_secs() / 60
                    );
                }
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => CrawlState::Cancelled,
                    _ = tokio::time::sleep(delay) => CrawlState::ClassifyingItem(walk),
                }
            }
            terminal @ (CrawlState::Done(_) | CrawlState::Failed(_) | CrawlState::Cancelled) => {
                terminal
            }
        }
    }

    async fn resolve(&self) -> Result<Walk, HarvestError> {
        let crawler = self.crawler;
        let channel = match crawler.platform.resolve_channel(&self.handle).await? {
            Some(Entity::Channel(channel)) => channel,
            Some(other) => {
                return Err(HarvestError::WrongEntityType {
                    handle: self.handle.clone(),
                    kind: other.kind(),
                })
            }
            None => return Err(HarvestError::NotFound(self.handle.clone())),
        };

        // Named after the username Telegram reports, not what was typed.
        let dir = if crawler.per_channel_dirs {
            crawler.output_root.join(&channel.handle)
        } else {
            crawler.output_root.clone()
        };
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| HarvestError::Storage {
                path: dir.clone(),
                source,
            })?;

        log::info!(
            "[@{}] resolved to \"{}\" ({}), saving videos to {}",
            self.handle,
            channel.title,
            channel.id,
            dir.display()
        );
        Ok(Walk {
            report: CrawlReport::new(&channel, dir),
            peer: Peer::Channel(channel),
            items: VecDeque::new(),
            next_cursor: None,
        })
    }

    async fn fetch_page(&self, mut walk: Walk, cursor: i32) -> CrawlState {
        let page = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return CrawlState::Cancelled,
            res = self.crawler.platform.fetch_history(&walk.peer, cursor, self.crawler.page_limit) => res,
        };
        let messages = match page {
            Ok(page) => page.into_messages(),
            Err(err) => return CrawlState::Failed(err.into()),
        };
        if messages.is_empty() {
            log::debug!("[@{}] history exhausted at offset {}", self.handle, cursor);
            return CrawlState::Done(walk.report);
        }

        let oldest = messages.iter().map(|m| m.id).min().unwrap_or(0);
        walk.next_cursor = if cursor != 0 && oldest >= cursor {
            log::warn!(
                "[@{}] page at offset {} did not move past it (oldest {}), stopping",
                self.handle,
                cursor,
                oldest
            );
            None
        } else {
            Some(oldest)
        };
        log::debug!(
            "[@{}] page at offset {}: {} messages, oldest {}",
            self.handle,
            cursor,
            messages.len(),
            oldest
        );
        walk.report.pages += 1;
        walk.items = messages.into();
        CrawlState::ClassifyingItem(walk)
    }

    /// Per-item failures are recorded in `report`; only cancellation is
    /// returned as an error.
    async fn download(
        &self,
        report: &mut CrawlReport,
        message_id: i32,
        attachment: &Attachment,
    ) -> Result<(), HarvestError> {
        report.videos_seen += 1;
        let result = self
            .crawler
            .downloader
            .download(
                self.crawler.platform.as_ref(),
                message_id,
                attachment,
                &report.output_dir,
                self.cancel,
            )
            .await;
        match result {
            Ok(file) => {
                log::info!(
                    "[@{}] msg {}: saved {} ({} bytes)",
                    self.handle,
                    message_id,
                    file.path.display(),
                    file.bytes
                );
                report.downloaded.push(file);
                Ok(())
            }
            Err(HarvestError::Cancelled) => Err(HarvestError::Cancelled),
            Err(err) => {
                log::warn!("[@{}] {}", self.handle, err);
                report.failed.push(message_id);
                Ok(())
            }
        }
    }
}
