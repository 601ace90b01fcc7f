//! Chunked transfer of a single document to disk.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::error::{HarvestError, TransferFailure};
use crate::harvest::model::Attachment;
use crate::harvest::platform::Platform;

/// Name used when the document carries no usable filename attribute.
pub const FALLBACK_NAME: &str = "video";

#[derive(Debug, Clone, Serialize)]
pub struct DownloadedFile {
    pub message_id: i32,
    pub path: PathBuf,
    pub bytes: u64,
}

/// Progress of one transfer. Lives only as long as the transfer.
struct DownloadState {
    path: PathBuf,
    written: u64,
    chunk_size: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkedDownloader {
    chunk_size: usize,
}

impl ChunkedDownloader {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }

    /// Filename attribute reduced to its last path component, or `video`.
    pub fn file_name(attachment: &Attachment) -> String {
        attachment
            .file_name()
            .and_then(|name| Path::new(name).file_name())
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| FALLBACK_NAME.to_string())
    }

    /// Download `attachment` into `dir`, replacing any file of the same name.
    ///
    /// Chunks are requested at strictly increasing offsets; the transfer ends
    /// on an empty chunk or on the first chunk shorter than the chunk size.
    pub async fn download<P: Platform>(
        &self,
        platform: &P,
        message_id: i32,
        attachment: &Attachment,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<DownloadedFile, HarvestError> {
        let mut state = DownloadState {
            path: dir.join(Self::file_name(attachment)),
            written: 0,
            chunk_size: self.chunk_size,
        };
        let transfer_err = |source: TransferFailure| HarvestError::Transfer { message_id, source };
        match attachment.size {
            Some(size) => log::info!(
                "[msg {}] downloading {} ({} bytes)",
                message_id,
                state.path.display(),
                size
            ),
            None => log::info!("[msg {}] downloading {}", message_id, state.path.display()),
        }

        let mut file = File::create(&state.path).await.map_err(|source| {
            transfer_err(TransferFailure::Write {
                path: state.path.clone(),
                source,
            })
        })?;

        loop {
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                res = platform.fetch_file_chunk(
                    attachment,
                    state.written as i64,
                    state.chunk_size as i32,
                ) => Some(res),
            };
            let Some(fetched) = fetched else {
                // Keep what arrived so far; there is no resume.
                if let Err(e) = file.flush().await {
                    log::warn!("[msg {}] flush after cancel failed: {}", message_id, e);
                }
                log::info!(
                    "[msg {}] cancelled after {} bytes, partial file left at {}",
                    message_id,
                    state.written,
                    state.path.display()
                );
                return Err(HarvestError::Cancelled);
            };
            let chunk = fetched.map_err(|e| transfer_err(e.into()))?;

            if chunk.is_empty() {
                break;
            }

            file.write_all(&chunk).await.map_err(|source| {
                transfer_err(TransferFailure::Write {
                    path: state.path.clone(),
                    source,
                })
            })?;
            state.written += chunk.len() as u64;
            log::debug!(
                "[msg {}] {} bytes written to {}",
                message_id,
                state.written,
                state.path.display()
            );

            if chunk.len() < state.chunk_size {
                break;
            }
        }

        file.flush().await.map_err(|source| {
            transfer_err(TransferFailure::Write {
                path: state.path.clone(),
                source,
            })
        })?;

        Ok(DownloadedFile {
            message_id,
            path: state.path,
            bytes: state.written,
        })
    }
}
