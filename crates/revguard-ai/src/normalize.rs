// crates/revguard-ai/src/normalize.rs
// ============================================================================
// Module: Revguard AI Result Normalization
// Description: Converts the wire `result` event's polymorphic `issues`
//   payload (list or keyed map) into deterministically ordered domain
//   types.
// Purpose: Give `AiFindingsResult`/`AiReconciliationResult` one canonical
//   shape regardless of which the AI service sent, per the "issues field
//   polymorphism" design note.
// Dependencies: revguard-core, serde_json
// ============================================================================

use revguard_core::AiFinding;
use revguard_core::AiResolutionDecision;
use revguard_core::CodeAnalysisIssueId;
use revguard_core::FilePath;
use revguard_core::Severity;

/// Returns the entries of `issues` regardless of whether it was sent as a
/// JSON array or a JSON object keyed by issue id / index.
fn entries(issues: &serde_json::Value) -> Vec<&serde_json::Value> {
    match issues {
        serde_json::Value::Array(items) => items.iter().collect(),
        serde_json::Value::Object(map) => map.values().collect(),
        _ => Vec::new(),
    }
}

/// Parses a severity string case-insensitively, defaulting to `Medium` for
/// anything unrecognized rather than rejecting the whole finding.
fn parse_severity(raw: Option<&str>) -> Severity {
    let Some(raw) = raw else { return Severity::Medium };
    serde_json::from_value(serde_json::Value::String(raw.to_uppercase())).unwrap_or(Severity::Medium)
}

/// Normalizes a full-analysis `result.issues` payload into a deterministically
/// sorted list, per `(file_path, line_number, issue_id)`.
pub(crate) fn normalize_findings(issues: &serde_json::Value) -> Vec<AiFinding> {
    let mut findings: Vec<AiFinding> = entries(issues)
        .into_iter()
        .filter_map(|item| {
            let file_path = item.get("filePath")?.as_str()?;
            Some(AiFinding {
                issue_id: item.get("issueId").and_then(serde_json::Value::as_u64).and_then(CodeAnalysisIssueId::from_raw),
                file_path: FilePath::from(file_path),
                line_number: item.get("lineNumber").and_then(serde_json::Value::as_u64).map(|n| n as u32),
                severity: parse_severity(item.get("severity").and_then(serde_json::Value::as_str)),
                reason: item.get("reason").and_then(serde_json::Value::as_str).unwrap_or_default().to_string(),
                suggested_fix_description: item
                    .get("suggestedFixDescription")
                    .and_then(serde_json::Value::as_str)
                    .map(ToString::to_string),
            })
        })
        .collect();
    findings.sort_by(|a, b| {
        a.file_path
            .as_str()
            .cmp(b.file_path.as_str())
            .then(a.line_number.cmp(&b.line_number))
            .then(a.issue_id.map(CodeAnalysisIssueId::get).cmp(&b.issue_id.map(CodeAnalysisIssueId::get)))
    });
    findings
}

/// Normalizes a reconciliation `result.issues` payload into a sorted list of
/// resolution decisions. Entries whose `issueId` does not parse as a
/// positive integer are skipped, per the branch pipeline's edge-case rule.
pub(crate) fn normalize_decisions(issues: &serde_json::Value) -> Vec<AiResolutionDecision> {
    let mut decisions: Vec<AiResolutionDecision> = entries(issues)
        .into_iter()
        .filter_map(|item| {
            let issue_id = parse_issue_id(item.get("issueId")?)?;
            let is_resolved = item
                .get("isResolved")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or_else(|| item.get("status").and_then(serde_json::Value::as_str) == Some("resolved"));
            Some(AiResolutionDecision { issue_id, is_resolved })
        })
        .collect();
    decisions.sort_by_key(|decision| decision.issue_id.get());
    decisions
}

fn parse_issue_id(value: &serde_json::Value) -> Option<CodeAnalysisIssueId> {
    let raw = match value {
        serde_json::Value::Number(number) => number.as_u64()?,
        serde_json::Value::String(text) => text.parse::<u64>().ok()?,
        _ => return None,
    };
    CodeAnalysisIssueId::from_raw(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_findings_accepts_list_shape() {
        let issues = serde_json::json!([
            { "filePath": "b.py", "lineNumber": 3, "severity": "low", "reason": "nit" },
            { "filePath": "a.py", "lineNumber": 1, "severity": "high", "reason": "bug" }
        ]);
        let findings = normalize_findings(&issues);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].file_path.as_str(), "a.py");
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn normalize_findings_accepts_map_shape() {
        let issues = serde_json::json!({
            "0": { "filePath": "a.py", "reason": "bug" },
            "1": { "filePath": "a.py", "lineNumber": 2, "reason": "other" }
        });
        let findings = normalize_findings(&issues);
        assert_eq!(findings.len(), 2);
    }

    #[test]
    fn normalize_decisions_skips_unparseable_issue_ids() {
        let issues = serde_json::json!({
            "0": { "issueId": "501", "isResolved": true },
            "1": { "issueId": "not-a-number", "isResolved": true },
            "2": { "issueId": 0, "isResolved": true }
        });
        let decisions = normalize_decisions(&issues);
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].issue_id.get(), 501);
    }

    #[test]
    fn normalize_decisions_reads_status_field_fallback() {
        let issues = serde_json::json!([{ "issueId": 7, "status": "resolved" }]);
        let decisions = normalize_decisions(&issues);
        assert!(decisions[0].is_resolved);
    }
}
