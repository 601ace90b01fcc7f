//! Error types for the harvester core and context wrappers for grammers errors.
//!
//! The core reports failures through [`HarvestError`] so callers can tell a
//! task-fatal failure from a per-item one. The CLI layer works in `anyhow`
//! and uses [`TgErrorContext`] to attach readable context to client errors.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Failure reported by the messaging platform binding.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlatformError {
    /// The request reached the platform and failed (RPC error, dropped connection).
    #[error("request failed: {0}")]
    Rpc(String),
    /// The platform answered with a shape the harvester cannot use.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl PlatformError {
    pub fn rpc(err: impl std::fmt::Display) -> Self {
        PlatformError::Rpc(err.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("channel @{0} not found")]
    NotFound(String),

    #[error("@{handle} is a {kind}, not a broadcast channel")]
    WrongEntityType { handle: String, kind: &'static str },

    #[error("storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("download of message {message_id} failed: {source}")]
    Transfer {
        message_id: i32,
        #[source]
        source: TransferFailure,
    },

    #[error("failed to edit command message: {0}")]
    Notification(#[source] PlatformError),

    #[error("failed to poll saved messages: {0}")]
    Poll(#[source] PlatformError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("cancelled")]
    Cancelled,
}

impl HarvestError {
    /// Resolution failures end a crawl before anything is fetched.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            HarvestError::NotFound(_) | HarvestError::WrongEntityType { .. }
        )
    }
}

/// Why a single attachment transfer stopped.
#[derive(Debug, thiserror::Error)]
pub enum TransferFailure {
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error("write to {} failed: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Extension trait to add Telegram-specific context to errors.
pub trait TgErrorContext<T> {
    /// Add context for authorization check.
    fn context_auth_check(self) -> Result<T>;

    /// Add context for sending a login code request.
    fn context_login_code(self, phone: &str) -> Result<T>;

    /// Add context for 2FA password check.
    fn context_2fa(self) -> Result<T>;

    /// Add context for sign-out operations.
    fn context_sign_out(self) -> Result<T>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> TgErrorContext<T>
    for std::result::Result<T, E>
{
    fn context_auth_check(self) -> Result<T> {
        self.context("Failed to check authorization status")
    }

    fn context_login_code(self, phone: &str) -> Result<T> {
        self.with_context(|| {
            format!(
                "Failed to request login code for {}. Verify the phone number is correct.",
                phone
            )
        })
    }

    fn context_2fa(self) -> Result<T> {
        self.context("Two-factor authentication failed. Check your password.")
    }

    fn context_sign_out(self) -> Result<T> {
        self.context("Failed to sign out from Telegram")
    }
}
