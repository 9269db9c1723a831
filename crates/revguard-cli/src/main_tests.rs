// crates/revguard-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for argument parsing and identifier validation in
//   the CLI entry point.
// Purpose: Ensure malformed identifiers are rejected before any adapter is
//   constructed, and that every subcommand's flags parse as expected.
// Dependencies: clap, revguard-cli main helpers
// ============================================================================

#![allow(clippy::unwrap_used, clippy::panic, reason = "test-only assertions")]

use clap::Parser;

use super::Cli;
use super::Command;
use super::parse_project_id;

#[test]
fn parse_project_id_rejects_zero() {
    let result = parse_project_id(0);
    assert!(result.is_err());
}

#[test]
fn parse_project_id_accepts_nonzero() {
    let result = parse_project_id(7);
    assert!(result.is_ok());
}

#[test]
fn pr_analysis_subcommand_parses_required_flags() {
    let cli = Cli::try_parse_from([
        "revguard",
        "--config",
        "revguard.toml",
        "pr-analysis",
        "--project-id",
        "1",
        "--pr-number",
        "42",
        "--commit-hash",
        "abc123",
        "--source-branch",
        "feat/x",
        "--target-branch",
        "main",
    ])
    .expect("parses");
    match cli.command {
        Command::PrAnalysis { project_id, pr_number, commit_hash, source_branch, target_branch, pr_author, placeholder_comment_id } => {
            assert_eq!(project_id, 1);
            assert_eq!(pr_number, 42);
            assert_eq!(commit_hash, "abc123");
            assert_eq!(source_branch, "feat/x");
            assert_eq!(target_branch, "main");
            assert!(pr_author.is_none());
            assert!(placeholder_comment_id.is_none());
        }
        other => panic!("expected PrAnalysis, got {other:?}"),
    }
}

#[test]
fn branch_analysis_subcommand_parses_optional_source_pr() {
    let cli = Cli::try_parse_from([
        "revguard",
        "branch-analysis",
        "--project-id",
        "1",
        "--target-branch",
        "main",
        "--commit-hash",
        "def456",
        "--source-pr-number",
        "9",
    ])
    .expect("parses");
    match cli.command {
        Command::BranchAnalysis { project_id, target_branch, commit_hash, source_pr_number } => {
            assert_eq!(project_id, 1);
            assert_eq!(target_branch, "main");
            assert_eq!(commit_hash, "def456");
            assert_eq!(source_pr_number, Some(9));
        }
        other => panic!("expected BranchAnalysis, got {other:?}"),
    }
}

#[test]
fn missing_subcommand_is_rejected() {
    let result = Cli::try_parse_from(["revguard"]);
    assert!(result.is_err());
}

#[test]
fn sweep_locks_subcommand_parses_with_no_flags() {
    let cli = Cli::try_parse_from(["revguard", "sweep-locks"]).expect("parses");
    assert!(matches!(cli.command, Command::SweepLocks));
}
