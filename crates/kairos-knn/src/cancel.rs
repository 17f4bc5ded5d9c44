//! Cooperative cancellation of in-flight queries.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag used to interrupt an in-flight classification.
///
/// Clones observe the same flag. The classifier clears it when it reports
/// [`KnnError::Interrupted`][crate::KnnError::Interrupted], so the next call
/// starts clean.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Return true if cancellation was requested and not yet consumed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Consume a pending cancellation, returning whether there was one.
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_flag() {
        let token = CancelToken::new();
        let handle = token.clone();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn take_clears() {
        let token = CancelToken::new();
        token.cancel();
        assert!(token.take());
        assert!(!token.take());
        assert!(!token.is_cancelled());
    }
}
