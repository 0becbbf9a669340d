//! Incremental newline framing for the byte stream
//!
//! The server writes one JSON document per line. Chunks arriving off the
//! socket carry no alignment guarantee: a document may span several chunks
//! and a chunk may hold several documents plus a partial tail. The framer
//! buffers bytes and drains every complete line on each push, so the emitted
//! document sequence is independent of how the bytes were chunked.

use serde_json::Value;
use tracing::warn;

const DELIMITER: u8 = b'\n';

/// Incremental parser from byte chunks to complete JSON documents
#[derive(Debug, Default)]
pub struct StreamFramer {
    buffer: Vec<u8>,
}

impl StreamFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every complete frame it unlocks.
    ///
    /// A frame that fails to parse as JSON is dropped and logged; later
    /// frames on the same stream are unaffected. Empty lines are skipped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Value> {
        self.buffer.extend_from_slice(chunk);

        let mut documents = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == DELIMITER) {
            let frame: Vec<u8> = self.buffer.drain(..=pos).take(pos).collect();
            let line = String::from_utf8_lossy(&frame);
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(line) {
                Ok(document) => documents.push(document),
                Err(e) => {
                    warn!(frame = %line, error = %e, "dropping malformed frame");
                }
            }
        }
        documents
    }

    /// Bytes held back waiting for a delimiter
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}
