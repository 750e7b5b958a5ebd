//! Server-Sent-Event Frame Decoder
//!
//! Turns the raw body of a streaming chat-completion response into a sequence
//! of JSON payloads. Input chunks may split a line (or a multi-byte UTF-8
//! sequence) anywhere; the decoder keeps the trailing partial line in a byte
//! buffer and prepends it to the next chunk.

use tracing::warn;

/// SSE field prefix carrying event payloads
const DATA_PREFIX: &[u8] = b"data: ";

/// Payload marking the end of the stream
const DONE_SENTINEL: &str = "[DONE]";

/// One logical event decoded from the stream
#[derive(Clone, Debug, PartialEq)]
pub enum RawEvent {
    /// A JSON payload from a `data:` line
    Payload(serde_json::Value),
    /// The `[DONE]` sentinel; nothing follows
    Done,
}

/// Incremental SSE decoder for a single stream
///
/// Construct a fresh decoder per stream; it carries no cross-stream state.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Bytes of the current, not yet terminated line
    pending: Vec<u8>,
    /// Whether `[DONE]` has been seen
    finished: bool,
    /// Data lines skipped because their payload was not valid JSON
    skipped_lines: u32,
}

impl FrameDecoder {
    /// Create a decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the stream-end sentinel has been decoded
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of malformed data lines that were skipped
    #[must_use]
    pub fn skipped_lines(&self) -> u32 {
        self.skipped_lines
    }

    /// Feed one chunk of body bytes, returning every event it completes
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<RawEvent> {
        if self.finished {
            return Vec::new();
        }

        self.pending.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut consumed = 0;

        while let Some(offset) = self.pending[consumed..].iter().position(|&b| b == b'\n') {
            let end = consumed + offset;
            let line = self.pending[consumed..end].to_vec();
            consumed = end + 1;

            if let Some(event) = self.decode_line(&line) {
                let done = event == RawEvent::Done;
                events.push(event);
                if done {
                    self.finish_stream();
                    return events;
                }
            }
        }

        self.pending.drain(..consumed);
        events
    }

    /// Flush a final line that was not newline-terminated
    ///
    /// Call once when the body ends.
    pub fn finish(&mut self) -> Vec<RawEvent> {
        if self.finished || self.pending.is_empty() {
            self.pending.clear();
            return Vec::new();
        }

        let line = std::mem::take(&mut self.pending);
        let events: Vec<RawEvent> = self.decode_line(&line).into_iter().collect();
        if events.contains(&RawEvent::Done) {
            self.finish_stream();
        }
        events
    }

    fn finish_stream(&mut self) {
        self.finished = true;
        self.pending.clear();
    }

    /// Decode one complete line (without its `\n`)
    fn decode_line(&mut self, line: &[u8]) -> Option<RawEvent> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let payload = line.strip_prefix(DATA_PREFIX)?;
        let text = String::from_utf8_lossy(payload);
        let data = text.trim();

        if data.is_empty() {
            return None;
        }

        if data == DONE_SENTINEL {
            return Some(RawEvent::Done);
        }

        match serde_json::from_str(data) {
            Ok(value) => Some(RawEvent::Payload(value)),
            Err(e) => {
                self.skipped_lines += 1;
                warn!(error = %e, data = %data, "Skipping malformed stream event");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const STREAM: &str = concat!(
        ": keep-alive\n",
        "data: {\"choices\":[{\"delta\":{\"reasoning\":\"Hmm, \"}}]}\n",
        "\n",
        "event: message\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"h\u{e9}llo \u{4f60}\u{597d}\"}}]}\r\n",
        "data: {not json}\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"!\"}}]}\n",
        "data: [DONE]\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n",
    );

    fn decode_in_chunks(bytes: &[u8], splits: &[usize]) -> Vec<RawEvent> {
        let mut decoder = FrameDecoder::new();
        let mut events = Vec::new();
        let mut start = 0;
        for &split in splits {
            events.extend(decoder.feed(&bytes[start..split]));
            start = split;
        }
        events.extend(decoder.feed(&bytes[start..]));
        events.extend(decoder.finish());
        events
    }

    #[test]
    fn test_decodes_data_lines_and_done() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(STREAM.as_bytes());

        assert_eq!(
            events,
            vec![
                RawEvent::Payload(json!({"choices":[{"delta":{"reasoning":"Hmm, "}}]})),
                RawEvent::Payload(json!({"choices":[{"delta":{"content":"h\u{e9}llo \u{4f60}\u{597d}"}}]})),
                RawEvent::Payload(json!({"choices":[{"delta":{"content":"!"}}]})),
                RawEvent::Done,
            ]
        );
        assert!(decoder.is_finished());
        assert_eq!(decoder.skipped_lines(), 1);
    }

    #[test]
    fn test_every_two_way_split_yields_identical_events() {
        let bytes = STREAM.as_bytes();
        let expected = decode_in_chunks(bytes, &[]);

        for split in 0..=bytes.len() {
            assert_eq!(
                decode_in_chunks(bytes, &[split]),
                expected,
                "split at byte {split}"
            );
        }
    }

    #[test]
    fn test_every_three_way_split_yields_identical_events() {
        let bytes = STREAM.as_bytes();
        let expected = decode_in_chunks(bytes, &[]);

        for first in (0..bytes.len()).step_by(3) {
            for second in first..=bytes.len() {
                assert_eq!(decode_in_chunks(bytes, &[first, second]), expected);
            }
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let bytes = STREAM.as_bytes();
        let splits: Vec<usize> = (1..bytes.len()).collect();
        assert_eq!(decode_in_chunks(bytes, &splits), decode_in_chunks(bytes, &[]));
    }

    #[test]
    fn test_feed_after_done_is_ignored() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.feed(b"data: [DONE]\ndata: {\"a\":1}\n"), vec![RawEvent::Done]);
        assert!(decoder.feed(b"data: {\"b\":2}\n").is_empty());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"data: {\"x\":").is_empty());
        assert!(decoder.feed(b"1}").is_empty());
        assert_eq!(decoder.finish(), vec![RawEvent::Payload(json!({"x": 1}))]);
    }

    #[test]
    fn test_lines_without_data_prefix_are_ignored() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(b"data:{\"no\":\"space\"}\nid: 7\nretry: 10\n\n");
        assert!(events.is_empty());
        assert_eq!(decoder.skipped_lines(), 0);
    }
}
