//! Incremental subscribe stream reader.
//!
//! Turns the chunks of one streamed HTTP response body into a sequence of
//! [`Envelope`]s. Chunk boundaries may fall anywhere, including inside a
//! JSON value or inside a multi-byte UTF-8 sequence; unconsumed bytes stay
//! buffered until the rest of the record arrives.
//!
//! # Record Rules
//!
//! | Candidate | Action |
//! |-----------|--------|
//! | Parses as an envelope | Emit, consume |
//! | Ends early (EOF inside the value) | Keep, retry joined with following bytes |
//! | Newline-terminated and invalid | Discard with a warning |
//! | Unterminated tail, not yet valid | Keep |

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;

use futures_util::stream::{self, Stream, StreamExt};
use tracing::{trace, warn};

use crate::error::Result;
use crate::transport::ByteStream;

use super::envelope::{Envelope, RecordParse, parse_record};

// ============================================================================
// Constants
// ============================================================================

/// Record separator on the subscribe stream.
const RECORD_SEPARATOR: u8 = b'\n';

/// Default upper bound on unconsumed bytes (4 MiB).
///
/// This is a hard limit on a single record. A record that is still
/// arriving is kept for as long as it fits; one that grows past the cap is
/// discarded with a warning. Raise it with
/// [`SessionRegistryBuilder::max_buffer`](crate::session::SessionRegistryBuilder::max_buffer)
/// if the service can emit larger envelopes.
pub const DEFAULT_MAX_BUFFER: usize = 4 * 1024 * 1024;

// ============================================================================
// StreamReader
// ============================================================================

/// Buffering envelope decoder for one response body.
///
/// A reader belongs to exactly one response; a restarted stream gets a fresh
/// reader so stale partial records never leak across requests.
///
/// # Example
///
/// ```ignore
/// let mut reader = StreamReader::new();
/// assert!(reader.feed(br#"[["aGk="],"1"#).is_empty());
/// let envelopes = reader.feed(b"7\"]\n");
/// assert_eq!(envelopes[0].cursor.as_str(), "17");
/// ```
#[derive(Debug, Clone)]
pub struct StreamReader {
    /// Bytes received but not yet consumed.
    buffer: Vec<u8>,
    /// Cap on `buffer` before the oldest record is discarded.
    max_buffer: usize,
}

impl Default for StreamReader {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamReader {
    /// Creates a reader with the default buffer cap.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_buffer(DEFAULT_MAX_BUFFER)
    }

    /// Creates a reader with a custom buffer cap in bytes.
    #[inline]
    #[must_use]
    pub fn with_max_buffer(max_buffer: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_buffer: max_buffer.max(1),
        }
    }

    /// Returns the number of buffered, unconsumed bytes.
    #[inline]
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Appends a chunk and returns every envelope it completes, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Envelope> {
        self.buffer.extend_from_slice(chunk);

        let mut envelopes = Vec::new();
        self.drain_records(&mut envelopes);

        while self.buffer.len() > self.max_buffer {
            self.discard_oldest_record();
            self.drain_records(&mut envelopes);
        }

        envelopes
    }

    /// Parses and removes every complete record from the front of the buffer.
    fn drain_records(&mut self, out: &mut Vec<Envelope>) {
        let len = self.buffer.len();
        let mut start = 0;

        'records: loop {
            start = skip_whitespace(&self.buffer, start);
            if start >= len {
                break;
            }

            let mut search_from = start;
            loop {
                let Some(newline) = find_separator(&self.buffer, search_from) else {
                    // Unterminated tail: emit only if already complete.
                    if let RecordParse::Complete(envelope) = parse_record(&self.buffer[start..]) {
                        out.push(envelope);
                        start = len;
                    }
                    break 'records;
                };

                match parse_record(&self.buffer[start..newline]) {
                    RecordParse::Complete(envelope) => {
                        out.push(envelope);
                        start = newline + 1;
                        continue 'records;
                    }
                    RecordParse::Malformed(reason) => {
                        warn!(
                            bytes = newline - start,
                            reason = %reason,
                            "Discarding malformed stream record"
                        );
                        start = newline + 1;
                        continue 'records;
                    }
                    RecordParse::Incomplete => {
                        if self.next_record_is_complete(newline + 1) {
                            warn!(bytes = newline - start, "Discarding truncated stream record");
                            start = newline + 1;
                            continue 'records;
                        }
                        // The value may span lines; retry with the next one joined.
                        search_from = newline + 1;
                    }
                }
            }
        }

        self.buffer.drain(..start);
    }

    /// Returns `true` if the record starting at `from` parses on its own.
    fn next_record_is_complete(&self, from: usize) -> bool {
        let start = skip_whitespace(&self.buffer, from);
        if start >= self.buffer.len() {
            return false;
        }

        let end = find_separator(&self.buffer, start).unwrap_or(self.buffer.len());
        matches!(
            parse_record(&self.buffer[start..end]),
            RecordParse::Complete(_)
        )
    }

    /// Drops the oldest buffered record to get back under the cap.
    fn discard_oldest_record(&mut self) {
        match find_separator(&self.buffer, 0) {
            Some(newline) => {
                warn!(
                    bytes = newline + 1,
                    max = self.max_buffer,
                    "Stream buffer over capacity, discarding oldest record"
                );
                self.buffer.drain(..=newline);
            }
            None => {
                warn!(
                    bytes = self.buffer.len(),
                    max = self.max_buffer,
                    "Stream buffer over capacity, discarding unterminated record"
                );
                self.buffer.clear();
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Returns the index of the next separator at or after `from`.
#[inline]
fn find_separator(buffer: &[u8], from: usize) -> Option<usize> {
    buffer
        .get(from..)?
        .iter()
        .position(|&b| b == RECORD_SEPARATOR)
        .map(|offset| from + offset)
}

/// Returns the index of the first non-whitespace byte at or after `from`.
#[inline]
fn skip_whitespace(buffer: &[u8], from: usize) -> usize {
    let mut index = from;
    while index < buffer.len() && buffer[index].is_ascii_whitespace() {
        index += 1;
    }
    index
}

// ============================================================================
// Envelope Stream
// ============================================================================

/// Internal state for [`envelope_stream`].
struct EnvelopeStreamState {
    body: ByteStream,
    reader: StreamReader,
    pending: VecDeque<Envelope>,
    finished: bool,
}

/// Adapts a streamed response body into a lazy envelope sequence.
///
/// Yields `Err` once if the body fails, then ends. Ends without error when
/// the body completes; whatever partial record is still buffered is dropped.
/// The sequence cannot be restarted.
pub fn envelope_stream(
    body: ByteStream,
    reader: StreamReader,
) -> impl Stream<Item = Result<Envelope>> + Send {
    let state = EnvelopeStreamState {
        body,
        reader,
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(envelope) = state.pending.pop_front() {
                return Some((Ok(envelope), state));
            }

            if state.finished {
                return None;
            }

            match state.body.next().await {
                Some(Ok(chunk)) => {
                    trace!(bytes = chunk.len(), "Stream chunk received");
                    state.pending.extend(state.reader.feed(&chunk));
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(e), state));
                }
                None => {
                    trace!(
                        leftover = state.reader.buffered_len(),
                        "Stream body ended"
                    );
                    state.finished = true;
                }
            }
        }
    })
}

// ============================================================================
// Tests
// ============================================================================
