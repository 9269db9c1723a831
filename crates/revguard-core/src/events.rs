// crates/revguard-core/src/events.rs
// ============================================================================
// Module: Revguard Event Sink
// Description: Per-request event taxonomy and the serial callback surface
//   pipelines deliver them through.
// Purpose: Give every pipeline step a uniform way to narrate progress to a
//   caller-supplied sink without the processor ever blocking on, or being
//   destabilized by, that sink.
// Dependencies: crate::entities, crate::identifiers, serde
// ============================================================================

//! ## Overview
//! `EventSink` is a plain `Send + Sync` trait with one method returning `()`,
//! not `Result`: the "callbacks must not raise back into the processor"
//! requirement from the distilled spec is expressed in the type signature
//! itself. Two reference implementations ship here, mirroring the donor's
//! spread of named `Sink` implementations in
//! `decision-gate-broker/src/sink/mod.rs`: [`NdjsonEventSink`] writes one
//! JSON line per event to any `Write`, and [`CollectingEventSink`] is an
//! `Arc<Mutex<Vec<_>>>`-backed collector for tests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;

use serde::Deserialize;
use serde::Serialize;

use crate::entities::AnalysisType;
use crate::identifiers::CorrelationId;

// ============================================================================
// SECTION: Event Taxonomy
// ============================================================================

/// Terminal outcome carried by the `Completed` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionOutcome {
    /// Pipeline ran to success (including a cache hit).
    Success,
    /// Pipeline aborted on a surfaced error.
    Failed,
    /// Pipeline was cancelled via the caller's cancellation signal.
    Cancelled,
}

/// Events emitted by a pipeline at each state transition, forwarded verbatim
/// to the caller's `EventSink`. AI-stream events (`Status`, `Progress`,
/// `PartialIssue`, `Warning`) are forwarded unchanged from the transport
/// contract in §4.4; the remaining variants are pipeline-native.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisEvent {
    /// Emitted once at pipeline entry.
    AnalysisStarted {
        /// Correlation id for this invocation.
        correlation_id: CorrelationId,
        /// Which pipeline started.
        analysis_type: AnalysisType,
    },
    /// Emitted by `LockService::acquire_with_wait` on each contended poll.
    LockWaiting {
        /// Seconds elapsed since the wait began.
        elapsed_secs: u64,
    },
    /// Forwarded verbatim from the AI stream's `status` event.
    Status {
        /// Provider-defined state label.
        state: String,
        /// Human-readable message.
        message: String,
    },
    /// Forwarded verbatim from the AI stream's `progress` event.
    Progress {
        /// Units processed so far.
        processed: u64,
        /// Total units expected, if known.
        total: Option<u64>,
    },
    /// Forwarded verbatim from the AI stream's `partial_issue` event.
    PartialIssue {
        /// File path of the partial finding.
        file_path: String,
        /// Line number, if known.
        line_number: Option<u32>,
        /// Severity, if known.
        severity: Option<String>,
        /// Reason text accumulated so far.
        reason: String,
    },
    /// A non-fatal warning: a recovered error from a best-effort step
    /// (post-report, RAG, job-recorder) or a forwarded AI-stream `warning`.
    Warning {
        /// Human-readable warning message.
        message: String,
    },
    /// Terminal event; exactly one is emitted per pipeline invocation.
    Completed {
        /// Outcome of the run.
        outcome: CompletionOutcome,
        /// Free-text detail (e.g. `"Lock acquisition timeout"`,
        /// `"cancelled"`).
        detail: Option<String>,
        /// Number of issues found, when applicable.
        issues_found: Option<u32>,
        /// Number of files analyzed, when applicable.
        files_analyzed: Option<u32>,
    },
}

// ============================================================================
// SECTION: EventSink
// ============================================================================

/// Serial callback surface a pipeline delivers [`AnalysisEvent`]s through.
///
/// # Invariants
/// - `accept` is only ever called from the pipeline's own worker; no
///   interleaving across concurrent calls to the same sink instance from a
///   single pipeline invocation.
/// - Implementations MUST NOT propagate errors back into the pipeline — the
///   `()` return type enforces this at the type level. Internal failures
///   (e.g. a broken pipe) must be caught and swallowed by the implementation.
pub trait EventSink: Send + Sync {
    /// Accepts one event. Must not panic or block indefinitely; violating
    /// this stalls or aborts the pipeline's own worker.
    fn accept(&self, event: AnalysisEvent);
}

/// Writes one JSON line per event to any [`Write`] implementation — the
/// shape a streaming HTTP response handler hands a response-body writer.
pub struct NdjsonEventSink<W> {
    /// Underlying writer, guarded for interior mutability since `EventSink`
    /// methods take `&self`.
    writer: Mutex<W>,
}

impl<W> NdjsonEventSink<W> {
    /// Wraps a writer as an NDJSON event sink.
    pub const fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<W: Write + Send> EventSink for NdjsonEventSink<W> {
    fn accept(&self, event: AnalysisEvent) {
        let Ok(line) = serde_json::to_string(&event) else {
            return;
        };
        let Ok(mut writer) = self.writer.lock() else {
            return;
        };
        let _ = writeln!(writer, "{line}");
    }
}

/// Collects events in memory, for test assertions.
#[derive(Default)]
pub struct CollectingEventSink {
    /// Accumulated events, in delivery order.
    events: Arc<Mutex<Vec<AnalysisEvent>>>,
}

impl CollectingEventSink {
    /// Creates an empty collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a clone of the events accumulated so far, in delivery order.
    #[must_use]
    pub fn events(&self) -> Vec<AnalysisEvent> {
        self.events.lock().map(|guard| guard.clone()).unwrap_or_default()
    }
}

impl EventSink for CollectingEventSink {
    fn accept(&self, event: AnalysisEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event);
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, reason = "Unit tests use expect for setup clarity.")]
mod tests {
    use super::*;

    #[test]
    fn ndjson_sink_writes_one_line_per_event() {
        let buffer: Vec<u8> = Vec::new();
        let sink = NdjsonEventSink::new(buffer);
        sink.accept(AnalysisEvent::Warning {
            message: "disk nearly full".to_string(),
        });
        sink.accept(AnalysisEvent::Completed {
            outcome: CompletionOutcome::Success,
            detail: None,
            issues_found: Some(1),
            files_analyzed: Some(1),
        });
        let guard = sink.writer.lock().expect("writer mutex");
        let text = String::from_utf8(guard.clone()).expect("utf8");
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().next().expect("first line").contains("warning"));
    }

    #[test]
    fn collecting_sink_preserves_delivery_order() {
        let sink = CollectingEventSink::new();
        sink.accept(AnalysisEvent::LockWaiting { elapsed_secs: 5 });
        sink.accept(AnalysisEvent::LockWaiting { elapsed_secs: 10 });
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            AnalysisEvent::LockWaiting { elapsed_secs: 5 }
        );
    }
}
