//! Output transport abstraction.
//!
//! The Command Processor and the rest of this crate never call a concrete
//! transport (UART, semihosting, USB CDC, ...) directly — every line of
//! output, including the `[FLOK]`/`[FLERR]`/`[FLEND]` framing, goes through
//! a [`Sink`]. Wiring a concrete transport is the device binary's job.

/// A byte-oriented output transport.
///
/// Implementations are expected to be non-blocking best-effort: a full
/// ring buffer or a disconnected terminal should drop bytes rather than
/// block the command processor, since §5 requires that handlers always
/// run to completion.
pub trait Sink {
    /// Writes as much of `bytes` as the transport can currently accept.
    fn write_bytes(&mut self, bytes: &[u8]);

    /// Makes previously written bytes visible to the reader.
    ///
    /// Called once per response line, per the §5 requirement that the
    /// processor flushes its output sink after each line so a host reading
    /// a long-running transfer doesn't stall on transport buffering.
    fn flush(&mut self) {}
}

/// Adapts any [`Sink`] to [`core::fmt::Write`] so response text can be
/// built with `write!`/`writeln!` instead of manual byte concatenation.
pub struct SinkWriter<'a, S: Sink + ?Sized>(pub &'a mut S);

impl<S: Sink + ?Sized> core::fmt::Write for SinkWriter<'_, S> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.0.write_bytes(s.as_bytes());
        Ok(())
    }
}

/// A [`Sink`] that discards everything. Useful as a placeholder before a
/// real transport is wired up, and in tests that don't inspect output.
#[derive(Default)]
pub struct NullSink;

impl Sink for NullSink {
    fn write_bytes(&mut self, _bytes: &[u8]) {}
}

#[cfg(test)]
/// A [`Sink`] backed by a fixed-capacity buffer, for assertions in tests.
pub struct BufSink {
    buf: heapless_buf::FixedBuf,
}

#[cfg(test)]
mod heapless_buf {
    /// A tiny fixed-capacity byte buffer, enough for exercising [`super::Sink`]
    /// in `std`-enabled unit tests without pulling in an external crate.
    pub struct FixedBuf {
        data: [u8; 4096],
        len: usize,
    }

    impl FixedBuf {
        pub const fn new() -> Self {
            FixedBuf { data: [0; 4096], len: 0 }
        }

        pub fn push(&mut self, bytes: &[u8]) {
            for &b in bytes {
                if self.len < self.data.len() {
                    self.data[self.len] = b;
                    self.len += 1;
                }
            }
        }

        pub fn as_str(&self) -> &str {
            core::str::from_utf8(&self.data[..self.len]).unwrap_or("<invalid utf8>")
        }
    }
}

#[cfg(test)]
impl BufSink {
    /// Creates an empty buffer sink.
    pub const fn new() -> Self {
        BufSink { buf: heapless_buf::FixedBuf::new() }
    }

    /// Returns everything written so far as a `&str`.
    pub fn as_str(&self) -> &str {
        self.buf.as_str()
    }
}

#[cfg(test)]
impl Sink for BufSink {
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.push(bytes);
    }
}
