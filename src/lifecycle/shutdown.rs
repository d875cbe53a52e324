//! Shutdown coordination for the relay.

use tokio_util::sync::CancellationToken;

/// Process-wide cancellation signal.
///
/// Every long-running task receives a clone of the token at spawn time.
#[derive(Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token to hand to a task.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Trigger the shutdown signal. Later calls have no effect.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until shutdown is triggered.
    pub async fn triggered(&self) {
        self.token.cancelled().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_every_clone() {
        let shutdown = Shutdown::new();
        let token = shutdown.token();
        assert!(!token.is_cancelled());

        shutdown.trigger();
        shutdown.trigger();
        token.cancelled().await;
        assert!(shutdown.is_triggered());
    }
}
