use super::error::EngineError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Cooperative cancellation shared between a caller and long-running work.
///
/// A token is cancelled either explicitly or once its deadline passes. Clones share the same
/// flag; [`CancellationToken::with_deadline`] derives a token that additionally expires.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token sharing this one's flag that also expires after `timeout`. The earlier of the
    /// two deadlines applies.
    pub fn with_deadline(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        Self {
            flag: self.flag.clone(),
            deadline: Some(self.deadline.map_or(candidate, |d| d.min(candidate))),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn check(&self) -> Result<(), EngineError> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_cancellation() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(clone.check().is_ok());
        token.cancel();
        assert!(matches!(clone.check(), Err(EngineError::Cancelled)));
    }

    #[test]
    fn expired_deadline_cancels() {
        let token = CancellationToken::new().with_deadline(Duration::ZERO);
        assert!(token.is_cancelled());
        let open = CancellationToken::new().with_deadline(Duration::from_secs(3600));
        assert!(!open.is_cancelled());
    }
}
