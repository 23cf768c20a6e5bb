//! Semihosting for the FPBInject device firmware.
//!
//! Backs the boot/panic logging side of the logging story: `fpb-loader`'s
//! `Sink` implementation writes through [`hio::hstdout`] / [`hio::hstderr`]
//! when a debugger is attached, keeping those messages off the serial link
//! the Command Processor owns.

#![deny(missing_docs)]
#![no_std]

#[doc(hidden)]
pub mod export;
pub mod debug;
pub mod hio;
