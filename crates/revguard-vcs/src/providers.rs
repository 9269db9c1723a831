// crates/revguard-vcs/src/providers.rs
// ============================================================================
// Module: Revguard VCS Providers
// Description: Per-provider endpoint construction and response handling for
//   GitHub, GitLab, and Bitbucket Cloud.
// Purpose: Keep the URL shape and payload parsing for each provider in one
//   file, dispatched from the single `VcsOperations` impl in `lib.rs`.
// Dependencies: revguard-core, reqwest, serde_json
// ============================================================================

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::blocking::Response;

use revguard_core::BranchName;
use revguard_core::CodeAnalysis;
use revguard_core::CommitHash;
use revguard_core::FilePath;
use revguard_core::PostReportOutcome;
use revguard_core::PrNumber;
use revguard_core::Project;
use revguard_core::Severity;
use revguard_core::VcsConnection;
use revguard_core::VcsError;
use revguard_core::VcsProvider;

use crate::credentials::VcsCredentials;

const GITHUB_API: &str = "https://api.github.com";
const GITLAB_API: &str = "https://gitlab.com/api/v4";
const BITBUCKET_API: &str = "https://api.bitbucket.org/2.0";

/// URL-encodes a path segment (workspace/repo slugs may contain `/`, spaces
/// never appear in practice but percent-encoding keeps this honest).
fn path_escape(segment: &str) -> String {
    segment.replace('%', "%25").replace('/', "%2F")
}

fn auth_header(provider: VcsProvider, credentials: &VcsCredentials) -> Option<(&'static str, String)> {
    let token = credentials.token_for(provider)?;
    match provider {
        VcsProvider::Github => Some(("Authorization", format!("Bearer {token}"))),
        VcsProvider::Gitlab => Some(("PRIVATE-TOKEN", token.to_string())),
        VcsProvider::BitbucketCloud => Some(("Authorization", format!("Bearer {token}"))),
    }
}

fn apply_auth(
    mut builder: reqwest::blocking::RequestBuilder,
    provider: VcsProvider,
    credentials: &VcsCredentials,
) -> reqwest::blocking::RequestBuilder {
    if let Some((header, value)) = auth_header(provider, credentials) {
        builder = builder.header(header, value);
    }
    builder
}

fn transport_err(err: &reqwest::Error) -> VcsError {
    VcsError::Transport(err.to_string())
}

/// Inspects a response for rate limiting, converting it into the internal
/// retry signal [`VcsError::RateLimited`]; otherwise returns the response for
/// the caller to read normally.
fn check_rate_limit(response: Response, attempt: u8) -> Result<Response, VcsError> {
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return Ok(response);
    }
    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .map(std::time::Duration::from_secs)
        .unwrap_or_default();
    Err(VcsError::RateLimited { retry_after, attempt })
}

fn ensure_success(response: Response) -> Result<Response, VcsError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().unwrap_or_default();
    Err(VcsError::Http { status: status.as_u16(), message })
}

fn read_text(response: Response) -> Result<String, VcsError> {
    response.text().map_err(|err| transport_err(&err))
}

fn read_json(response: Response) -> Result<serde_json::Value, VcsError> {
    response.json().map_err(|err| transport_err(&err))
}

// ============================================================================
// SECTION: Diff fetch
// ============================================================================

pub(crate) fn fetch_pull_request_diff(
    client: &Client,
    credentials: &VcsCredentials,
    project: &Project,
    pr_number: PrNumber,
) -> Result<String, VcsError> {
    let conn = project.effective_vcs_connection();
    match conn.provider {
        VcsProvider::Github => {
            let url = format!("{GITHUB_API}/repos/{}/{}/pulls/{pr_number}", conn.workspace, conn.repo_slug);
            let request = apply_auth(client.get(&url), conn.provider, credentials)
                .header("Accept", "application/vnd.github.v3.diff");
            let response = request.send().map_err(|err| transport_err(&err))?;
            read_text(ensure_success(response)?)
        }
        VcsProvider::Gitlab => {
            let url = format!(
                "{GITLAB_API}/projects/{}/merge_requests/{pr_number}/changes",
                path_escape(&format!("{}/{}", conn.workspace, conn.repo_slug))
            );
            let request = apply_auth(client.get(&url), conn.provider, credentials);
            let response = request.send().map_err(|err| transport_err(&err))?;
            let body = read_json(ensure_success(response)?)?;
            Ok(synthesize_unified_diff_from_gitlab_changes(&body))
        }
        VcsProvider::BitbucketCloud => {
            let url = format!(
                "{BITBUCKET_API}/repositories/{}/{}/pullrequests/{pr_number}/diff",
                conn.workspace, conn.repo_slug
            );
            let request = apply_auth(client.get(&url), conn.provider, credentials);
            let response = request.send().map_err(|err| transport_err(&err))?;
            read_text(ensure_success(response)?)
        }
    }
}

pub(crate) fn fetch_commit_diff(
    client: &Client,
    credentials: &VcsCredentials,
    project: &Project,
    commit_hash: &CommitHash,
) -> Result<String, VcsError> {
    let conn = project.effective_vcs_connection();
    match conn.provider {
        VcsProvider::Github => {
            let url = format!(
                "{GITHUB_API}/repos/{}/{}/commits/{}",
                conn.workspace,
                conn.repo_slug,
                commit_hash.as_str()
            );
            let request = apply_auth(client.get(&url), conn.provider, credentials)
                .header("Accept", "application/vnd.github.v3.diff");
            let response = request.send().map_err(|err| transport_err(&err))?;
            read_text(ensure_success(response)?)
        }
        VcsProvider::Gitlab => {
            let url = format!(
                "{GITLAB_API}/projects/{}/repository/commits/{}/diff",
                path_escape(&format!("{}/{}", conn.workspace, conn.repo_slug)),
                commit_hash.as_str()
            );
            let request = apply_auth(client.get(&url), conn.provider, credentials);
            let response = request.send().map_err(|err| transport_err(&err))?;
            let body = read_json(ensure_success(response)?)?;
            Ok(synthesize_unified_diff_from_gitlab_changes(&body))
        }
        VcsProvider::BitbucketCloud => {
            let url = format!(
                "{BITBUCKET_API}/repositories/{}/{}/diff/{}",
                conn.workspace,
                conn.repo_slug,
                commit_hash.as_str()
            );
            let request = apply_auth(client.get(&url), conn.provider, credentials);
            let response = request.send().map_err(|err| transport_err(&err))?;
            read_text(ensure_success(response)?)
        }
    }
}

/// GitLab's `changes`/`diff` endpoints return a JSON array of per-file diff
/// fragments rather than one unified-diff blob. Reassembles a `diff --git`
/// header per entry so [`revguard_diff::DiffParser`] sees the same shape it
/// would from GitHub or Bitbucket.
fn synthesize_unified_diff_from_gitlab_changes(body: &serde_json::Value) -> String {
    let changes = body
        .get("changes")
        .and_then(serde_json::Value::as_array)
        .cloned()
        .or_else(|| body.as_array().cloned())
        .unwrap_or_default();
    let mut out = String::new();
    for change in &changes {
        let old_path = change.get("old_path").and_then(serde_json::Value::as_str).unwrap_or("");
        let new_path = change.get("new_path").and_then(serde_json::Value::as_str).unwrap_or(old_path);
        let diff = change.get("diff").and_then(serde_json::Value::as_str).unwrap_or("");
        if new_path.is_empty() {
            continue;
        }
        out.push_str(&format!("diff --git a/{old_path} b/{new_path}\n"));
        if change.get("new_file").and_then(serde_json::Value::as_bool).unwrap_or(false) {
            out.push_str("new file mode 100644\n");
        }
        if change.get("deleted_file").and_then(serde_json::Value::as_bool).unwrap_or(false) {
            out.push_str("deleted file mode 100644\n");
        }
        if change.get("renamed_file").and_then(serde_json::Value::as_bool).unwrap_or(false) {
            out.push_str(&format!("rename from {old_path}\nrename to {new_path}\n"));
        }
        out.push_str(diff);
        if !diff.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

// ============================================================================
// SECTION: File existence
// ============================================================================

pub(crate) fn check_file_exists(
    client: &Client,
    credentials: &VcsCredentials,
    project: &Project,
    branch_name: &BranchName,
    file_path: &FilePath,
) -> Result<bool, VcsError> {
    let conn = project.effective_vcs_connection();
    let response = send_file_existence_probe(client, credentials, conn, branch_name, file_path)?;
    let response = check_rate_limit(response, 1)?;
    if response.status() == StatusCode::NOT_FOUND {
        return Ok(false);
    }
    ensure_success(response).map(|_| true)
}

fn send_file_existence_probe(
    client: &Client,
    credentials: &VcsCredentials,
    conn: &VcsConnection,
    branch_name: &BranchName,
    file_path: &FilePath,
) -> Result<Response, VcsError> {
    let request = match conn.provider {
        VcsProvider::Github => {
            let url = format!(
                "{GITHUB_API}/repos/{}/{}/contents/{}",
                conn.workspace,
                conn.repo_slug,
                file_path.as_str()
            );
            apply_auth(client.get(&url).query(&[("ref", branch_name.as_str())]), conn.provider, credentials)
        }
        VcsProvider::Gitlab => {
            let url = format!(
                "{GITLAB_API}/projects/{}/repository/files/{}",
                path_escape(&format!("{}/{}", conn.workspace, conn.repo_slug)),
                path_escape(file_path.as_str())
            );
            apply_auth(client.get(&url).query(&[("ref", branch_name.as_str())]), conn.provider, credentials)
        }
        VcsProvider::BitbucketCloud => {
            let url = format!(
                "{BITBUCKET_API}/repositories/{}/{}/src/{}/{}",
                conn.workspace,
                conn.repo_slug,
                branch_name.as_str(),
                file_path.as_str()
            );
            apply_auth(client.get(&url), conn.provider, credentials)
        }
    };
    request.send().map_err(|err| transport_err(&err))
}

// ============================================================================
// SECTION: Report posting
// ============================================================================

pub(crate) fn post_report(
    client: &Client,
    credentials: &VcsCredentials,
    project: &Project,
    analysis: &CodeAnalysis,
    pr_number: Option<PrNumber>,
    placeholder_comment_id: Option<&str>,
) -> Result<PostReportOutcome, VcsError> {
    let conn = project.effective_vcs_connection();
    let body = render_report_body(analysis);
    let response = match conn.provider {
        VcsProvider::Github => post_or_update_github_comment(client, credentials, conn, pr_number, placeholder_comment_id, &body)?,
        VcsProvider::Gitlab => post_or_update_gitlab_note(client, credentials, conn, pr_number, placeholder_comment_id, &body)?,
        VcsProvider::BitbucketCloud => {
            post_or_update_bitbucket_comment(client, credentials, conn, pr_number, placeholder_comment_id, &body)?
        }
    };
    let payload = read_json(ensure_success(response)?)?;
    let comment_id = extract_comment_id(&payload, placeholder_comment_id);
    Ok(PostReportOutcome { comment_id })
}

fn extract_comment_id(payload: &serde_json::Value, placeholder: Option<&str>) -> String {
    payload
        .get("id")
        .map(|value| {
            if let Some(number) = value.as_u64() {
                number.to_string()
            } else {
                value.as_str().unwrap_or_default().to_string()
            }
        })
        .filter(|id| !id.is_empty())
        .or_else(|| placeholder.map(ToString::to_string))
        .unwrap_or_default()
}

fn post_or_update_github_comment(
    client: &Client,
    credentials: &VcsCredentials,
    conn: &VcsConnection,
    pr_number: Option<PrNumber>,
    placeholder_comment_id: Option<&str>,
    body: &str,
) -> Result<Response, VcsError> {
    let payload = serde_json::json!({ "body": body });
    let request = if let Some(comment_id) = placeholder_comment_id {
        let url = format!("{GITHUB_API}/repos/{}/{}/issues/comments/{comment_id}", conn.workspace, conn.repo_slug);
        client.patch(&url)
    } else {
        let pr_number = pr_number.ok_or_else(|| VcsError::Http { status: 400, message: "pr_number required".to_string() })?;
        let url = format!("{GITHUB_API}/repos/{}/{}/issues/{pr_number}/comments", conn.workspace, conn.repo_slug);
        client.post(&url)
    };
    apply_auth(request, conn.provider, credentials)
        .json(&payload)
        .send()
        .map_err(|err| transport_err(&err))
}

fn post_or_update_gitlab_note(
    client: &Client,
    credentials: &VcsCredentials,
    conn: &VcsConnection,
    pr_number: Option<PrNumber>,
    placeholder_comment_id: Option<&str>,
    body: &str,
) -> Result<Response, VcsError> {
    let project_path = path_escape(&format!("{}/{}", conn.workspace, conn.repo_slug));
    let pr_number = pr_number.ok_or_else(|| VcsError::Http { status: 400, message: "pr_number required".to_string() })?;
    let payload = serde_json::json!({ "body": body });
    let request = if let Some(note_id) = placeholder_comment_id {
        let url = format!("{GITLAB_API}/projects/{project_path}/merge_requests/{pr_number}/notes/{note_id}");
        client.put(&url)
    } else {
        let url = format!("{GITLAB_API}/projects/{project_path}/merge_requests/{pr_number}/notes");
        client.post(&url)
    };
    apply_auth(request, conn.provider, credentials)
        .json(&payload)
        .send()
        .map_err(|err| transport_err(&err))
}

fn post_or_update_bitbucket_comment(
    client: &Client,
    credentials: &VcsCredentials,
    conn: &VcsConnection,
    pr_number: Option<PrNumber>,
    placeholder_comment_id: Option<&str>,
    body: &str,
) -> Result<Response, VcsError> {
    let pr_number = pr_number.ok_or_else(|| VcsError::Http { status: 400, message: "pr_number required".to_string() })?;
    let payload = serde_json::json!({ "content": { "raw": body } });
    let request = if let Some(comment_id) = placeholder_comment_id {
        let url = format!(
            "{BITBUCKET_API}/repositories/{}/{}/pullrequests/{pr_number}/comments/{comment_id}",
            conn.workspace, conn.repo_slug
        );
        client.put(&url)
    } else {
        let url =
            format!("{BITBUCKET_API}/repositories/{}/{}/pullrequests/{pr_number}/comments", conn.workspace, conn.repo_slug);
        client.post(&url)
    };
    apply_auth(request, conn.provider, credentials)
        .json(&payload)
        .send()
        .map_err(|err| transport_err(&err))
}

/// Renders a human-readable markdown report body from a persisted analysis.
fn render_report_body(analysis: &CodeAnalysis) -> String {
    if analysis.issues.is_empty() {
        return "Revguard found no issues in this change.".to_string();
    }
    let mut body = format!("Revguard found {} issue(s):\n\n", analysis.issues.len());
    for issue in &analysis.issues {
        let location = match issue.line_number {
            Some(line) => format!("{}:{line}", issue.file_path),
            None => issue.file_path.to_string(),
        };
        body.push_str(&format!("- **[{}]** {location} — {}\n", severity_label(issue.severity), issue.reason));
    }
    body
}

const fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "HIGH",
        Severity::Medium => "MEDIUM",
        Severity::Low => "LOW",
        Severity::Info => "INFO",
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, reason = "Unit tests use expect for setup clarity.")]
mod tests {
    use super::*;

    #[test]
    fn gitlab_changes_synthesis_builds_diff_header() {
        let body = serde_json::json!({
            "changes": [
                { "old_path": "a.py", "new_path": "a.py", "diff": "@@ -1 +1 @@\n-x\n+y\n" }
            ]
        });
        let diff = synthesize_unified_diff_from_gitlab_changes(&body);
        assert!(diff.starts_with("diff --git a/a.py b/a.py\n"));
        assert!(diff.contains("+y"));
    }

    #[test]
    fn render_report_body_lists_every_issue() {
        use revguard_core::AnalysisStatus;
        use revguard_core::AnalysisType;
        use revguard_core::CodeAnalysisId;
        use revguard_core::CodeAnalysisIssue;
        use revguard_core::CodeAnalysisIssueId;
        use revguard_core::ProjectId;

        let analysis = CodeAnalysis {
            id: CodeAnalysisId::from_raw(1).expect("non-zero"),
            project_id: ProjectId::from_raw(1).expect("non-zero"),
            analysis_type: AnalysisType::PrAnalysis,
            pr_number: None,
            branch_name: BranchName::from("main"),
            source_branch_name: None,
            commit_hash: CommitHash::new("abc"),
            pr_version: 0,
            status: AnalysisStatus::Accepted,
            created_at: 0,
            updated_at: 0,
            issues: vec![CodeAnalysisIssue {
                id: CodeAnalysisIssueId::from_raw(1).expect("non-zero"),
                code_analysis_id: CodeAnalysisId::from_raw(1).expect("non-zero"),
                file_path: FilePath::from("src/a.py"),
                line_number: Some(7),
                severity: Severity::High,
                reason: "Unvalidated input".to_string(),
                suggested_fix_description: None,
                resolved: false,
            }],
        };
        let body = render_report_body(&analysis);
        assert!(body.contains("HIGH"));
        assert!(body.contains("src/a.py:7"));
    }
}
