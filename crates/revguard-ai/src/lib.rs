// crates/revguard-ai/src/lib.rs
// ============================================================================
// Module: Revguard AI Client
// Description: `AiClient` implementation driving the AI service's ndjson
//   streaming transport contract (§4.4).
// Purpose: Own the wire protocol end to end so the rest of the workspace
//   only ever sees the normalized `revguard_core::interfaces` shapes.
// Dependencies: revguard-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! [`AiHttpClient`] posts a request to `{base_url}/analyze` and reads the
//! ndjson response body on a dedicated reader thread
//! ([`stream::spawn_reader`]), pushing parsed events onto a bounded
//! `std::sync::mpsc` channel the calling thread drains — the same
//! writer-gateway shape `revguard-store-sqlite` uses for its command queue,
//! applied here to a consumer instead of a producer. [`normalize`] absorbs
//! the wire protocol's "issues may be a list or a keyed map" polymorphism
//! before anything reaches `revguard-core`'s normalized result types.

#![forbid(unsafe_code)]

mod client;
mod normalize;
mod stream;
mod wire;

pub use client::AiHttpClient;
