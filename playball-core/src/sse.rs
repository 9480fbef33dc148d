//! Server-sent events framing.
//!
//! Splits the raw byte chunks of an `text/event-stream` response into the
//! `data` payloads of complete events. Only the `data` field matters to the
//! recorder; `event`, `id`, `retry` and comment lines are ignored.

use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct EventFramer {
    buffer: Vec<u8>,
    data: Option<String>,
    ready: VecDeque<String>,
}

impl EventFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk; chunks may split lines and UTF-8 sequences anywhere
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
        while let Some(line) = self.take_line() {
            self.process_line(&String::from_utf8_lossy(&line));
        }
    }

    /// Remove the next line ended by CRLF, LF or a lone CR.
    ///
    /// A CR as the last buffered byte waits for more input, since an LF may
    /// follow in the next chunk.
    fn take_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.buffer.iter().position(|b| *b == b'\n' || *b == b'\r')?;
        let terminator = match (self.buffer[pos], self.buffer.get(pos + 1)) {
            (b'\r', None) => return None,
            (b'\r', Some(b'\n')) => 2,
            _ => 1,
        };
        let mut line: Vec<u8> = self.buffer.drain(..pos + terminator).collect();
        line.truncate(pos);
        Some(line)
    }

    /// Next complete event payload, if any
    pub fn next_event(&mut self) -> Option<String> {
        self.ready.pop_front()
    }

    /// Drop partial state, e.g. after the connection was re-established
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.data = None;
        self.ready.clear();
    }

    fn process_line(&mut self, line: &str) {
        if line.is_empty() {
            if let Some(data) = self.data.take() {
                self.ready.push_back(data);
            }
            return;
        }
        if line.starts_with(':') {
            return;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            match self.data.as_mut() {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut framer = EventFramer::new();
        framer.push(b"data: {\"a\":1}\n\n");
        assert_eq!(framer.next_event().as_deref(), Some("{\"a\":1}"));
        assert_eq!(framer.next_event(), None);
    }

    #[test]
    fn test_split_chunks_and_crlf() {
        let mut framer = EventFramer::new();
        framer.push(b"event: msg\r\nda");
        framer.push(b"ta: hel");
        assert_eq!(framer.next_event(), None);
        framer.push(b"lo\r\n\r\ndata:x\n\n");
        assert_eq!(framer.next_event().as_deref(), Some("hello"));
        assert_eq!(framer.next_event().as_deref(), Some("x"));
    }

    #[test]
    fn test_lone_cr_ends_lines() {
        let mut framer = EventFramer::new();
        framer.push(b"data: a\r\rdata: b\r");
        assert_eq!(framer.next_event().as_deref(), Some("a"));
        framer.push(b"\r\n");
        assert_eq!(framer.next_event().as_deref(), Some("b"));
        assert_eq!(framer.next_event(), None);
    }

    #[test]
    fn test_crlf_split_after_cr() {
        let mut framer = EventFramer::new();
        framer.push(b"data: a\r");
        framer.push(b"\ndata: b\r\n\r");
        assert_eq!(framer.next_event(), None);
        framer.push(b"\n");
        assert_eq!(framer.next_event().as_deref(), Some("a\nb"));
        assert_eq!(framer.next_event(), None);
    }

    #[test]
    fn test_multiline_data_and_comments() {
        let mut framer = EventFramer::new();
        framer.push(b": keep-alive\n\ndata: one\ndata: two\nid: 4\n\n");
        assert_eq!(framer.next_event().as_deref(), Some("one\ntwo"));
        assert_eq!(framer.next_event(), None);
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let mut framer = EventFramer::new();
        let text = "data: caf\u{e9}\n\n".as_bytes();
        let (a, b) = text.split_at(10);
        framer.push(a);
        framer.push(b);
        assert_eq!(framer.next_event().as_deref(), Some("caf\u{e9}"));
    }

    #[test]
    fn test_reset_drops_partial_event() {
        let mut framer = EventFramer::new();
        framer.push(b"data: partial\n");
        framer.reset();
        framer.push(b"\ndata: fresh\n\n");
        assert_eq!(framer.next_event().as_deref(), Some("fresh"));
    }
}
