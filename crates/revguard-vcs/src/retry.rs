// crates/revguard-vcs/src/retry.rs
// ============================================================================
// Module: Revguard VCS Retry
// Description: Exponential-backoff retry wrapper for rate-limited calls.
// Purpose: Give `check_file_exists_in_branch` (and any other call a provider
//   may 429) one shared retry loop instead of duplicating backoff math per
//   operation.
// Dependencies: revguard-core
// ============================================================================

//! ## Overview
//! `VcsError::RateLimited` is an internal-only retry signal (never returned
//! to a trait caller, per its own doc comment in `revguard-core`): a closure
//! returns it to request another attempt, and [`retry_with_backoff`] either
//! retries or gives up and surfaces the last real error. Initial backoff is
//! 2s, doubling, honouring the callee's `retry_after` hint when present, up
//! to [`MAX_ATTEMPTS`] attempts total.

use std::thread;
use std::time::Duration;

use revguard_core::CancellationToken;
use revguard_core::VcsError;

/// Maximum attempts (including the first) before giving up.
const MAX_ATTEMPTS: u8 = 3;

/// Initial backoff before the second attempt.
const INITIAL_BACKOFF: Duration = Duration::from_secs(2);

/// Runs `operation`, retrying while it returns `VcsError::RateLimited`, up to
/// [`MAX_ATTEMPTS`] attempts. Sleeps for the rate limiter's `retry_after`
/// hint, doubling from [`INITIAL_BACKOFF`] when no hint was given.
///
/// # Errors
///
/// Returns the last non-`RateLimited` error the operation produced, or
/// `VcsError::Cancelled` if cancellation is observed before a retry sleep.
pub(crate) fn retry_with_backoff<T>(
    cancel: &CancellationToken,
    mut operation: impl FnMut() -> Result<T, VcsError>,
) -> Result<T, VcsError> {
    let mut backoff = INITIAL_BACKOFF;
    for attempt in 1..=MAX_ATTEMPTS {
        if cancel.is_cancelled() {
            return Err(VcsError::Cancelled);
        }
        match operation() {
            Ok(value) => return Ok(value),
            Err(VcsError::RateLimited { retry_after, .. }) if attempt < MAX_ATTEMPTS => {
                let wait = if retry_after.is_zero() { backoff } else { retry_after };
                thread::sleep(wait);
                backoff *= 2;
            }
            Err(VcsError::RateLimited { retry_after, attempt: last_attempt }) => {
                return Err(VcsError::RateLimited { retry_after, attempt: last_attempt });
            }
            Err(other) => return Err(other),
        }
    }
    unreachable!("loop always returns by the MAX_ATTEMPTS-th iteration")
}

#[cfg(test)]
#[allow(clippy::expect_used, reason = "Unit tests use expect for setup clarity.")]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn succeeds_without_retry_when_first_attempt_succeeds() {
        let cancel = CancellationToken::new();
        let calls = Cell::new(0);
        let result = retry_with_backoff(&cancel, || {
            calls.set(calls.get() + 1);
            Ok::<_, VcsError>(42)
        });
        assert_eq!(result.expect("ok"), 42);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn retries_on_rate_limit_then_succeeds() {
        let cancel = CancellationToken::new();
        let calls = Cell::new(0);
        let result = retry_with_backoff(&cancel, || {
            let n = calls.get();
            calls.set(n + 1);
            if n == 0 {
                Err(VcsError::RateLimited { retry_after: Duration::from_millis(1), attempt: 1 })
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.expect("ok"), 7);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let cancel = CancellationToken::new();
        let calls = Cell::new(0);
        let result = retry_with_backoff(&cancel, || {
            calls.set(calls.get() + 1);
            Err::<i32, _>(VcsError::RateLimited { retry_after: Duration::from_millis(1), attempt: calls.get() })
        });
        assert!(matches!(result, Err(VcsError::RateLimited { .. })));
        assert_eq!(calls.get(), u32::from(MAX_ATTEMPTS));
    }

    #[test]
    fn non_rate_limit_errors_are_not_retried() {
        let cancel = CancellationToken::new();
        let calls = Cell::new(0);
        let result = retry_with_backoff(&cancel, || {
            calls.set(calls.get() + 1);
            Err::<i32, _>(VcsError::Transport("boom".to_string()))
        });
        assert!(matches!(result, Err(VcsError::Transport(_))));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn cancellation_short_circuits_before_first_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = Cell::new(0);
        let result = retry_with_backoff(&cancel, || {
            calls.set(calls.get() + 1);
            Ok::<_, VcsError>(0)
        });
        assert!(matches!(result, Err(VcsError::Cancelled)));
        assert_eq!(calls.get(), 0);
    }
}
