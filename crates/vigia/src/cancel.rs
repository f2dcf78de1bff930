//! Cooperative cancellation for recurring page callbacks.

use std::cell::Cell;
use std::rc::Rc;

/// Shared flag checked by a loop on every iteration
///
/// Clones observe the same flag. Cancelling is permanent.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    /// Create an un-cancelled token
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the loop stop at its next iteration
    pub fn cancel(&self) {
        self.0.set(true);
    }

    /// Whether cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_flag() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
    }
}
