//! Host-side error taxonomy.
//!
//! A small typed enum at the pipeline/serial boundary (no `thiserror` — the
//! rest of this corpus doesn't reach for it on the host side either);
//! `anyhow::Error` wraps this at the CLI boundary via the blanket `From`
//! impl that `std::error::Error` gives us.

use std::fmt;

/// A host-side failure, classified the way §7 of the design splits errors
/// between device-local and host-side concerns.
#[derive(Debug)]
pub enum HostError {
    /// The serial port could not be opened or a read/write failed.
    Io(std::io::Error),
    /// The device did not emit `[FLEND]` before the configured timeout.
    ProtocolTimeout,
    /// The device replied `[FLERR] ...`; the message is the text after the
    /// prefix.
    DeviceError(String),
    /// An upload chunk was rejected `max_retries` times in a row.
    RetryExhausted { chunks_sent: usize },
    /// `target_function` was not present in the ELF symbol table.
    SymbolNotFound(String),
    /// The ELF file could not be parsed.
    ElfParse(String),
    /// The compile database has no entry usable for the inject source.
    NoCompileEntry(std::path::PathBuf),
    /// Invoking the cross-compiler or linker failed or returned nonzero.
    CompileFailed(String),
    /// A device response line could not be parsed as expected
    /// (`Allocated N at 0xADDR`, etc).
    UnexpectedResponse(String),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Io(e) => write!(f, "I/O error: {e}"),
            HostError::ProtocolTimeout => write!(f, "timed out waiting for [FLEND]"),
            HostError::DeviceError(msg) => write!(f, "device error: {msg}"),
            HostError::RetryExhausted { chunks_sent } => write!(f, "retry limit exceeded after {chunks_sent} chunks"),
            HostError::SymbolNotFound(name) => write!(f, "symbol not found: {name}"),
            HostError::ElfParse(msg) => write!(f, "ELF parse error: {msg}"),
            HostError::NoCompileEntry(path) => write!(f, "no compile database entry for {}", path.display()),
            HostError::CompileFailed(msg) => write!(f, "compile failed: {msg}"),
            HostError::UnexpectedResponse(line) => write!(f, "unexpected device response: {line}"),
        }
    }
}

impl std::error::Error for HostError {}

impl From<std::io::Error> for HostError {
    fn from(e: std::io::Error) -> Self {
        HostError::Io(e)
    }
}
