/// Incremental line reassembly for newline-delimited streams.
///
/// Upstream chunks arrive at arbitrary boundaries, including mid-line and
/// mid-UTF-8-character. The framer buffers raw bytes and only splits at
/// `\n`, which can never occur inside a UTF-8 continuation sequence, so a
/// partial multi-byte character is carried over intact to the next push.
///
/// # Example
/// ```
/// use chatd::LineFramer;
/// let mut framer = LineFramer::new();
/// assert!(framer.push(b"{\"a\":").is_empty());
/// assert_eq!(framer.push(b"1}\n"), vec!["{\"a\":1}".to_string()]);
/// ```
#[derive(Default)]
pub struct LineFramer {
    buf: Vec<u8>,
}

impl LineFramer {
    /// Creates an empty framer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every line completed by it.
    ///
    /// Returned lines do not include the trailing `\n`. A trailing `\r` is
    /// stripped so CRLF upstreams frame identically. Blank lines are
    /// returned as-is; discarding them is the caller's policy.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Drains and returns the buffered partial line, if any.
    ///
    /// Called once at end-of-stream so a final record without a trailing
    /// newline is not silently dropped.
    pub fn take_remainder(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}
