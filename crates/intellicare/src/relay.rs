//! Re-emits a streaming generation as newline delimited `{"chunk": ...}` lines.
//!
//! The upstream body is a sequence of JSON frames separated by newlines, but
//! network reads are not aligned with those lines. [`RelayState`] keeps the
//! unfinished tail of the last read and a [`ReasoningFilter`] that remembers
//! whether the stream is currently inside a `<think>` region, so reasoning is
//! removed even when its markers arrive in different frames or reads.
use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::TransportError;
use crate::providers::base::ByteStream;

const OPEN_MARKER: &str = "<think>";
const CLOSE_MARKER: &str = "</think>";

/// One decoded line of the upstream generation stream
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StreamFrame {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub done: bool,
}

/// One unit of relay output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayChunk {
    pub chunk: String,
}

impl RelayChunk {
    pub fn new(chunk: impl Into<String>) -> Self {
        Self {
            chunk: chunk.into(),
        }
    }

    /// The chunk as one line of line delimited JSON, newline included
    pub fn to_line(&self) -> String {
        let mut line = serde_json::json!({ "chunk": self.chunk }).to_string();
        line.push('\n');
        line
    }
}

/// Removes `<think>...</think>` regions from text that arrives in pieces.
///
/// Markers are matched case-insensitively. A trailing piece of text that could
/// be the start of a marker is held back until the next push decides it.
/// Anything after an opening marker that is never closed is dropped.
#[derive(Debug, Default)]
pub struct ReasoningFilter {
    inside: bool,
    pending: String,
}

impl ReasoningFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_inside(&self) -> bool {
        self.inside
    }

    /// Feed more text; returns the visible spans completed by it
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.pending.push_str(text);
        let mut visible = Vec::new();

        loop {
            let marker = if self.inside { CLOSE_MARKER } else { OPEN_MARKER };
            // ASCII lowercasing keeps byte offsets identical to `pending`
            let lowered = self.pending.to_ascii_lowercase();

            if let Some(index) = lowered.find(marker) {
                if !self.inside && index > 0 {
                    visible.push(self.pending[..index].to_string());
                }
                self.pending.drain(..index + marker.len());
                self.inside = !self.inside;
                continue;
            }

            let held = partial_marker_len(&lowered, marker);
            let settled = self.pending.len() - held;
            if !self.inside && settled > 0 {
                visible.push(self.pending[..settled].to_string());
            }
            self.pending.drain(..settled);
            break;
        }

        visible
    }

    /// End of input: release held back text unless it belongs to an open region
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        if self.inside {
            if !rest.is_empty() {
                debug!("dropping text after an unclosed reasoning marker");
            }
            return None;
        }
        Some(rest).filter(|rest| !rest.is_empty())
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of `marker`
fn partial_marker_len(text: &str, marker: &str) -> usize {
    (1..marker.len())
        .rev()
        .find(|&len| text.ends_with(&marker[..len]))
        .unwrap_or(0)
}

/// Strip reasoning regions from a complete text.
///
/// Everything after an opening marker that is never closed is dropped as well,
/// matching the streamed output. A reply that is all unclosed reasoning comes
/// back empty.
pub fn strip_reasoning(text: &str) -> String {
    let mut filter = ReasoningFilter::new();
    let mut visible: String = filter.push(text).concat();
    if let Some(rest) = filter.finish() {
        visible.push_str(&rest);
    }
    visible
}

/// Carry-over state for one relayed stream
#[derive(Debug, Default)]
pub struct RelayState {
    buffer: Vec<u8>,
    filter: ReasoningFilter,
    done: bool,
}

impl RelayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the upstream has sent its final frame
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one block of bytes as read from the network
    pub fn push(&mut self, block: &[u8]) -> Vec<RelayChunk> {
        self.buffer.extend_from_slice(block);

        let mut chunks = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            self.process_line(&line[..newline], &mut chunks);
        }
        chunks
    }

    /// Process whatever is left once the upstream has closed
    pub fn finish(&mut self) -> Vec<RelayChunk> {
        let mut chunks = Vec::new();
        let rest = std::mem::take(&mut self.buffer);
        self.process_line(&rest, &mut chunks);
        if let Some(rest) = self.filter.finish() {
            chunks.push(RelayChunk::new(rest));
        }
        chunks
    }

    fn process_line(&mut self, line: &[u8], chunks: &mut Vec<RelayChunk>) {
        let line = String::from_utf8_lossy(line);
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let frame: StreamFrame = match serde_json::from_str(line) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, %line, "skipping unparseable stream line");
                return;
            }
        };

        if frame.done {
            self.done = true;
        }
        if let Some(text) = frame.response.filter(|text| !text.is_empty()) {
            chunks.extend(self.filter.push(&text).into_iter().map(RelayChunk::new));
        }
    }
}

/// Relay an upstream generation body as normalized chunks.
///
/// Reading stops as soon as `cancel` fires; nothing is yielded after that and
/// the upstream body is dropped with the returned stream.
pub fn relay(
    mut upstream: ByteStream,
    cancel: CancellationToken,
) -> BoxStream<'static, Result<RelayChunk, TransportError>> {
    let stream = try_stream! {
        let mut state = RelayState::new();

        'read: loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("relay cancelled");
                    break 'read;
                }
                next = upstream.next() => next,
            };

            let block = match next {
                Some(block) => block?,
                None => break 'read,
            };

            for chunk in state.push(&block) {
                if cancel.is_cancelled() {
                    break 'read;
                }
                yield chunk;
            }

            if state.is_done() {
                break 'read;
            }
        }

        if !cancel.is_cancelled() {
            for chunk in state.finish() {
                yield chunk;
            }
        }
    };

    stream.boxed()
}
