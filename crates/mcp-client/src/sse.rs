//! Parsing for the raw `text/event-stream` framing used by the MCP SSE
//! transport: `event: <name>` / `data: <payload>` pairs separated by a
//! blank line, data lines may repeat and are joined with `\n`.

/// One decoded SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental SSE frame decoder: feed it raw bytes as they arrive off the
/// wire, get back zero or more complete events.
#[derive(Default)]
pub struct SseDecoder {
    buf: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self { buf: String::new() }
    }

    /// Feed a chunk of bytes and drain every complete event currently
    /// buffered.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buf.push_str(&String::from_utf8_lossy(chunk));
        let mut events = Vec::new();
        while let Some(idx) = find_blank_line(&self.buf) {
            let (block, rest) = self.buf.split_at(idx);
            let block = block.to_string();
            // Skip the blank-line separator itself (either "\n\n" or "\r\n\r\n").
            let skip = if rest.starts_with("\r\n\r\n") { 4 } else { 2 };
            self.buf = rest[skip..].to_string();
            if let Some(ev) = parse_block(&block) {
                events.push(ev);
            }
        }
        events
    }
}

fn find_blank_line(s: &str) -> Option<usize> {
    s.find("\n\n").or_else(|| s.find("\r\n\r\n"))
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = String::from("message");
    let mut data_lines = Vec::new();
    for line in block.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.trim_start().to_string());
        }
    }
    if data_lines.is_empty() {
        return None;
    }
    Some(SseEvent {
        event,
        data: data_lines.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_event() {
        let mut dec = SseDecoder::new();
        let events = dec.feed(b"event: endpoint\ndata: /messages?session=abc\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "endpoint");
        assert_eq!(events[0].data, "/messages?session=abc");
    }

    #[test]
    fn defaults_event_name_to_message() {
        let mut dec = SseDecoder::new();
        let events = dec.feed(b"data: {\"jsonrpc\":\"2.0\"}\n\n");
        assert_eq!(events[0].event, "message");
    }

    #[test]
    fn handles_split_chunks() {
        let mut dec = SseDecoder::new();
        assert!(dec.feed(b"event: message\ndata: {\"a\":").is_empty());
        let events = dec.feed(b"1}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"a\":1}");
    }

    #[test]
    fn joins_multiple_data_lines() {
        let mut dec = SseDecoder::new();
        let events = dec.feed(b"data: line1\ndata: line2\n\n");
        assert_eq!(events[0].data, "line1\nline2");
    }
}
