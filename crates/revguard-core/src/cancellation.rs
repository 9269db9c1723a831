// crates/revguard-core/src/cancellation.rs
// ============================================================================
// Module: Revguard Cancellation
// Description: Cooperative cancellation signal propagated from the request
//   boundary through every blocking pipeline step.
// Purpose: Let a caller abort lock-wait polling, in-flight HTTP, and
//   between-step checks without a dependency on an async runtime.
// Dependencies: none
// ============================================================================

//! ## Overview
//! The donor workspace has no direct precedent for cooperative cancellation
//! — its blocking HTTP calls run to completion — so this primitive is built
//! fresh, but kept minimal: a single `Arc<AtomicBool>` flag, consistent with
//! the donor's general preference for small hand-rolled primitives over
//! pulling in a cancellation crate for one atomic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

// ============================================================================
// SECTION: CancellationToken
// ============================================================================

/// A cheap-to-clone cooperative cancellation flag.
///
/// # Invariants
/// - Once cancelled, a token never un-cancels.
/// - All clones of a token observe the same underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Creates a fresh, not-yet-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Marks this token (and all of its clones) cancelled.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns whether this token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_observe_cancellation() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
