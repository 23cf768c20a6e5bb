//! Shell Adapter: turns a raw byte stream from a transport into argv slices
//! the Command Processor can dispatch.
//!
//! Accumulates a fixed-capacity line buffer. `\n`/`\r` dispatch the
//! accumulated line; backspace (`\b` or DEL) rubs out the last character;
//! other printable bytes append if the buffer isn't full. Dispatch itself
//! only tokenizes — it never calls into [`crate::command`] directly, so
//! this module stays usable from a plain byte-stream test without wiring a
//! whole `Processor`.

const BACKSPACE: u8 = 0x08;
const DEL: u8 = 0x7F;

/// Fixed-capacity line accumulator, `CAP` bytes.
pub struct LineBuffer<const CAP: usize> {
    buf: [u8; CAP],
    len: usize,
}

impl<const CAP: usize> Default for LineBuffer<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAP: usize> LineBuffer<CAP> {
    /// Creates an empty buffer.
    pub const fn new() -> Self {
        LineBuffer { buf: [0; CAP], len: 0 }
    }

    /// Feeds one byte. Returns `Some(line)` when `\n`/`\r` completes a line
    /// (the buffer is cleared for the next line); `None` otherwise.
    ///
    /// Non-UTF-8 accumulated bytes are treated as an empty line rather than
    /// panicking — a noisy UART can deliver garbage before a resync.
    pub fn feed(&mut self, byte: u8) -> Option<&str> {
        match byte {
            b'\n' | b'\r' => {
                let end = self.len;
                self.len = 0;
                Some(core::str::from_utf8(&self.buf[..end]).unwrap_or(""))
            }
            BACKSPACE | DEL => {
                self.len = self.len.saturating_sub(1);
                None
            }
            b if b.is_ascii_graphic() || b == b' ' => {
                if self.len < CAP {
                    self.buf[self.len] = b;
                    self.len += 1;
                }
                None
            }
            _ => None,
        }
    }
}

/// Splits `line` on whitespace, treating a matched pair of `"` as grouping
/// one argument with the quotes stripped. An unmatched trailing `"` is
/// treated as a literal character rather than an error — the source never
/// rejects malformed quoting, it just tokenizes best-effort.
///
/// Writes resulting argument slices into `out`, returning how many were
/// produced (capped at `out.len()`).
pub fn split_argv<'a>(line: &'a str, out: &mut [&'a str]) -> usize {
    let bytes = line.as_bytes();
    let mut i = 0;
    let mut n = 0;
    while i < bytes.len() && n < out.len() {
        while i < bytes.len() && bytes[i] == b' ' {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        let start;
        let end;
        if bytes[i] == b'"' {
            let quote_start = i + 1;
            if let Some(rel) = line[quote_start..].find('"') {
                start = quote_start;
                end = quote_start + rel;
                i = end + 1;
            } else {
                // Unmatched quote: treat the rest of the token literally.
                start = i;
                let rel = line[i..].find(' ').unwrap_or(line.len() - i);
                end = i + rel;
                i = end;
            }
        } else {
            start = i;
            let rel = line[i..].find(' ').unwrap_or(line.len() - i);
            end = i + rel;
            i = end;
        }
        out[n] = &line[start..end];
        n += 1;
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_dispatches_on_newline() {
        let mut lb: LineBuffer<32> = LineBuffer::new();
        assert!(lb.feed(b'p').is_none());
        assert!(lb.feed(b'i').is_none());
        assert_eq!(lb.feed(b'\n'), Some("pi"));
    }

    #[test]
    fn backspace_rubs_out_last_char() {
        let mut lb: LineBuffer<32> = LineBuffer::new();
        lb.feed(b'p');
        lb.feed(b'x');
        lb.feed(BACKSPACE);
        lb.feed(b'i');
        assert_eq!(lb.feed(b'\n'), Some("pi"));
    }

    #[test]
    fn full_buffer_drops_excess_bytes() {
        let mut lb: LineBuffer<4> = LineBuffer::new();
        for b in b"abcdefgh" {
            lb.feed(*b);
        }
        assert_eq!(lb.feed(b'\n'), Some("abcd"));
    }

    #[test]
    fn split_argv_separates_on_whitespace() {
        let mut out = [""; 8];
        let n = split_argv("--cmd ping", &mut out);
        assert_eq!(&out[..n], &["--cmd", "ping"]);
    }

    #[test]
    fn split_argv_strips_matched_quotes() {
        let mut out = [""; 8];
        let n = split_argv(r#"--cmd fopen --path "a file.txt" --mode r"#, &mut out);
        assert_eq!(&out[..n], &["--cmd", "fopen", "--path", "a file.txt", "--mode", "r"]);
    }
}
