//! Host-side half of FPBInject: resolves a target function against an ELF
//! symbol table, drives a cross-compile-and-link against a device-reported
//! RAM address, and ferries the result over a framed serial protocol that
//! shares its wire format with [`fpb_proto`].
//!
//! The CLI (`src/main.rs`) is a thin `clap` wrapper over this library; the
//! library itself has no notion of argv and can be driven from a test or
//! from a future GUI the same way.

pub mod cli;
pub mod compiledb;
pub mod config;
pub mod elf;
pub mod error;
pub mod inject;
pub mod logger;
pub mod serial;

pub use error::HostError;
