// crates/revguard-ai/src/client.rs
// ============================================================================
// Module: Revguard AI HTTP Client
// Description: `AiClient` implementation driving the AI service's ndjson
//   streaming transport contract.
// Purpose: Turn a normalized `AiRequest` into the wire POST, forward every
//   streamed event to the caller's sink, and normalize the terminal result.
// Dependencies: revguard-core, reqwest
// ============================================================================

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::redirect::Policy;

use revguard_core::AiClient;
use revguard_core::AiClientError;
use revguard_core::AiFindingsResult;
use revguard_core::AiReconciliationResult;
use revguard_core::AiRequest;
use revguard_core::AnalysisEvent;
use revguard_core::CancellationToken;
use revguard_core::EventSink;

use crate::normalize::normalize_decisions;
use crate::normalize::normalize_findings;
use crate::stream::StreamMessage;
use crate::stream::spawn_reader;
use crate::wire::WireEvent;
use crate::wire::WireRequest;

/// Default request timeout covers connection + headers; the streamed body
/// itself is read incrementally and is not subject to this timeout.
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// `AiClient` backed by `reqwest::blocking`, posting to `{base_url}/analyze`
/// and consuming the ndjson response on a dedicated reader thread.
pub struct AiHttpClient {
    client: Client,
    base_url: String,
    service_secret: String,
}

impl AiHttpClient {
    /// Builds the client from the service's base URL and shared secret.
    ///
    /// # Errors
    ///
    /// Returns [`AiClientError::Transport`] when the underlying HTTP client
    /// cannot be constructed.
    pub fn new(base_url: impl Into<String>, service_secret: impl Into<String>) -> Result<Self, AiClientError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .redirect(Policy::none())
            .user_agent("revguard-ai/0.1")
            .build()
            .map_err(|err| AiClientError::Transport(format!("client build failed: {err}")))?;
        Ok(Self { client, base_url: base_url.into(), service_secret: service_secret.into() })
    }

    /// Posts `request` and drains the ndjson response, forwarding every
    /// event to `sink` and returning the terminal `result` event's raw
    /// payload.
    fn run_stream(
        &self,
        request: &AiRequest,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<(serde_json::Value, Option<String>), AiClientError> {
        if cancel.is_cancelled() {
            return Err(AiClientError::Cancelled);
        }
        let wire_request = WireRequest::from(request);
        let response = self
            .client
            .post(format!("{}/analyze", self.base_url))
            .header("x-service-secret", &self.service_secret)
            .json(&wire_request)
            .send()
            .map_err(|err| AiClientError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(AiClientError::Http { status: status.as_u16(), message });
        }

        let receiver = spawn_reader(response);
        for message in &receiver {
            if cancel.is_cancelled() {
                return Err(AiClientError::Cancelled);
            }
            match message {
                StreamMessage::ReaderFailed(reason) => return Err(AiClientError::Transport(reason)),
                StreamMessage::Event(WireEvent::Status { state, message }) => {
                    sink.accept(AnalysisEvent::Status { state, message });
                }
                StreamMessage::Event(WireEvent::Progress { processed, total }) => {
                    sink.accept(AnalysisEvent::Progress { processed, total });
                }
                StreamMessage::Event(WireEvent::PartialIssue { file_path, line_number, severity, reason }) => {
                    sink.accept(AnalysisEvent::PartialIssue { file_path, line_number, severity, reason });
                }
                StreamMessage::Event(WireEvent::Warning { message }) => {
                    sink.accept(AnalysisEvent::Warning { message });
                }
                StreamMessage::Event(WireEvent::Error { message }) => {
                    sink.accept(AnalysisEvent::Warning { message: message.clone() });
                    return Err(AiClientError::StreamError(message));
                }
                StreamMessage::Event(WireEvent::Result { issues, comment }) => {
                    return Ok((issues, comment));
                }
            }
        }
        Err(AiClientError::ProtocolFailure)
    }
}

impl AiClient for AiHttpClient {
    fn analyze(
        &self,
        request: &AiRequest,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<AiFindingsResult, AiClientError> {
        let (issues, comment) = self.run_stream(request, sink, cancel)?;
        Ok(AiFindingsResult { issues: normalize_findings(&issues), comment })
    }

    fn reconcile(
        &self,
        request: &AiRequest,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<AiReconciliationResult, AiClientError> {
        let (issues, _comment) = self.run_stream(request, sink, cancel)?;
        Ok(AiReconciliationResult { decisions: normalize_decisions(&issues) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_construction_succeeds_with_plain_base_url() {
        let client = AiHttpClient::new("https://ai.example.test", "secret");
        assert!(client.is_ok());
    }
}
