// crates/revguard-ai/src/stream.rs
// ============================================================================
// Module: Revguard AI Stream Reader
// Description: Reads the ndjson response body on a dedicated worker thread,
//   pushing parsed events onto a bounded channel.
// Purpose: Mirror the SQLite store's writer-gateway discipline
//   (`revguard-store-sqlite/src/writer.rs`) on the consuming side: one
//   thread owns the blocking I/O, the caller drains a bounded channel and
//   never touches the response directly.
// Dependencies: reqwest, serde_json, std::sync::mpsc, std::thread
// ============================================================================

use std::io::BufRead;
use std::io::BufReader;
use std::sync::mpsc;
use std::thread;

use reqwest::blocking::Response;

use crate::wire::WireEvent;

/// Bound on queued-but-unconsumed stream events, giving backpressure against
/// a slow `EventSink`.
const STREAM_CHANNEL_CAPACITY: usize = 16;

/// One message handed from the reader thread to the consuming pipeline.
pub(crate) enum StreamMessage {
    /// A successfully parsed wire event.
    Event(WireEvent),
    /// The reader hit a transport or parse failure and is giving up.
    ReaderFailed(String),
}

/// Spawns the line reader thread and returns the receiving end of its
/// channel. The thread exits on its own once the body is exhausted or the
/// receiver is dropped.
pub(crate) fn spawn_reader(response: Response) -> mpsc::Receiver<StreamMessage> {
    let (sender, receiver) = mpsc::sync_channel(STREAM_CHANNEL_CAPACITY);
    thread::spawn(move || {
        let mut lines = BufReader::new(response).lines();
        loop {
            let line = match lines.next() {
                Some(Ok(line)) => line,
                Some(Err(err)) => {
                    let _ = sender.send(StreamMessage::ReaderFailed(format!("ndjson read failed: {err}")));
                    return;
                }
                None => return,
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<WireEvent>(&line) {
                Ok(event) => {
                    if sender.send(StreamMessage::Event(event)).is_err() {
                        return;
                    }
                }
                Err(err) => {
                    let _ = sender.send(StreamMessage::ReaderFailed(format!("malformed ndjson line: {err}")));
                    return;
                }
            }
        }
    });
    receiver
}
