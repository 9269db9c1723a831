// crates/revguard-core/src/identifiers.rs
// ============================================================================
// Module: Revguard Identifiers
// Description: Canonical opaque identifiers for projects, branches, analyses
//   and their owned detail rows.
// Purpose: Provide strongly typed, serializable identifiers with stable wire
//   forms so callers cannot transpose a project id for a branch id at a
//   call boundary.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every aggregate in the analysis orchestration core is addressed through a
//! newtype identifier rather than a bare integer or string. Identifiers
//! serialize as plain numbers or strings on the wire (`#[serde(transparent)]`)
//! so the wrapping costs nothing outside the Rust type system.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroU64;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Numeric Identifiers
// ============================================================================

/// Declares a `NonZeroU64`-backed identifier newtype with the boilerplate
/// every identifier in this module shares (construction, display, transparent
/// wire form).
macro_rules! numeric_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(NonZeroU64);

        impl $name {
            /// Creates an identifier from a non-zero value.
            #[must_use]
            pub const fn new(id: NonZeroU64) -> Self {
                Self(id)
            }

            /// Creates an identifier from a raw value, returning `None` when
            /// the value is zero.
            #[must_use]
            pub fn from_raw(raw: u64) -> Option<Self> {
                NonZeroU64::new(raw).map(Self)
            }

            /// Returns the raw identifier value (always >= 1).
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0.get()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.get().fmt(f)
            }
        }
    };
}

numeric_id!(ProjectId, "Identifier of a `Project` aggregate root.");
numeric_id!(BranchId, "Identifier of a `Branch` aggregate root.");
numeric_id!(
    CodeAnalysisId,
    "Identifier of a `CodeAnalysis` run, scoped to its owning project."
);
numeric_id!(
    CodeAnalysisIssueId,
    "Identifier of a `CodeAnalysisIssue` detail row, owned by a `CodeAnalysis`."
);
numeric_id!(
    BranchIssueId,
    "Identifier of a `BranchIssue` link row, owned by a `Branch`."
);
numeric_id!(
    BranchFileId,
    "Identifier of a `BranchFile` row tracking per-file issue counts."
);
numeric_id!(
    PullRequestId,
    "Identifier of a `PullRequest` aggregate root."
);
numeric_id!(JobId, "Identifier of a `JobRecord` audit aggregate.");

/// Pull request number as assigned by the VCS provider.
///
/// # Invariants
/// - Always `>= 1`; providers number pull requests starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrNumber(NonZeroU64);

impl PrNumber {
    /// Creates a PR number from a non-zero value.
    #[must_use]
    pub const fn new(value: NonZeroU64) -> Self {
        Self(value)
    }

    /// Creates a PR number from a raw value, returning `None` when zero.
    #[must_use]
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Returns the raw PR number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for PrNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.get().fmt(f)
    }
}

// ============================================================================
// SECTION: String Identifiers
// ============================================================================

/// A VCS commit hash, opaque beyond non-emptiness.
///
/// # Invariants
/// - Never empty; construction from an empty string is rejected by callers at
///   the request-validation boundary (`InvalidRequestError`), not by this
///   type itself, since the core never second-guesses the shape of a hash a
///   provider already accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitHash(String);

impl CommitHash {
    /// Wraps a raw commit hash string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the commit hash as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CommitHash {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A branch name as reported by the VCS provider (e.g. `main`, `feat/x`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchName(String);

impl BranchName {
    /// Wraps a raw branch name.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the branch name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for BranchName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for BranchName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A repository-relative file path as it appears in a unified diff.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilePath(String);

impl FilePath {
    /// Wraps a raw file path.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the file path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for FilePath {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for FilePath {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Opaque lock key returned by `LockService::acquire`, unique across the
/// whole `analysis_lock` table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockKey(String);

impl LockKey {
    /// Wraps a raw lock key.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the lock key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Correlation identifier stamped on every event emitted by one pipeline
/// invocation, so a caller streaming events to multiple concurrent requests
/// can demultiplex them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Wraps a raw correlation id (typically a UUID rendered as text).
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the correlation id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, reason = "Unit tests use expect for setup clarity.")]
mod tests {
    use super::*;

    #[test]
    fn project_id_round_trips_through_json() {
        let id = ProjectId::from_raw(42).expect("non-zero");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "42");
        let back: ProjectId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }

    #[test]
    fn zero_is_rejected_for_numeric_identifiers() {
        assert!(ProjectId::from_raw(0).is_none());
        assert!(PrNumber::from_raw(0).is_none());
    }

    #[test]
    fn branch_name_display_matches_wire_form() {
        let name = BranchName::from("feat/x");
        assert_eq!(name.to_string(), "feat/x");
        assert_eq!(name.as_str(), "feat/x");
    }
}
