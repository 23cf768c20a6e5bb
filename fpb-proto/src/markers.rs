//! Response framing markers (bit-exact, see spec §4.1 and §6).

/// Prefix for a successful terminal response line.
pub const OK_PREFIX: &str = "[FLOK] ";
/// Prefix for a failed terminal response line.
pub const ERR_PREFIX: &str = "[FLERR] ";
/// Terminates every response, success or failure.
pub const END_MARKER: &str = "[FLEND]";

/// Version string emitted by the `info` command, e.g. `FPBInject v1.0.0`.
pub const VERSION_PREFIX: &str = "FPBInject v";
