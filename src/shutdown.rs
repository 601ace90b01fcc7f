//! Graceful shutdown coordination using cancellation tokens.
//!
//! The controller owns the root token. The poller watches it directly and
//! hands a child token to every crawl task, so Ctrl+C stops polling and
//! cancels in-flight crawls at their next suspension point.

use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
pub struct ShutdownController {
    token: CancellationToken,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger shutdown, notifying all waiting tasks.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The root token. Cancelling a clone cancels everyone.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Trigger shutdown on the first Ctrl+C.
    pub fn listen_for_ctrl_c(&self) {
        let controller = self.clone();
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                log::info!("Received Ctrl+C, initiating graceful shutdown...");
                controller.trigger();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_tokens_follow_root() {
        let controller = ShutdownController::new();
        let child = controller.token().child_token();
        assert!(!child.is_cancelled());
        controller.trigger();
        assert!(controller.is_triggered());
        assert!(child.is_cancelled());
    }
}
