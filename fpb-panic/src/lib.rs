//! Panic handler for the FPBInject device firmware.
//!
//! Logs the panic message to the host over semihosting, masks interrupts so
//! nothing else runs afterwards, then either halts at a breakpoint (for a
//! debugger attached to real hardware) or exits the host process (for
//! QEMU-hosted tests, gated behind the `exit` feature).
//!
//! Firmware built on `fpb-loader` should reach this panic handler only on
//! a programming error in the firmware itself: bad user input into the
//! Command Processor is reported through `[FLERR]`, never a Rust panic.
//!
//! # Usage
//!
//! ``` ignore
//! #![no_std]
//!
//! extern crate fpb_panic;
//!
//! fn main() {
//!     panic!("allocator bitmap corrupt")
//! }
//! ```
//!
//! # Optional features
//!
//! ## `exit`
//!
//! When enabled, the panic handler performs a semihosting exit call after
//! logging the panic message instead of looping forever. Useful under QEMU,
//! where it causes the process to exit with a non-zero status. Discouraged
//! on real hardware: the exit call can leave a hardware debugger in an
//! inconsistent state.

#![deny(missing_docs)]
#![no_std]

use core::fmt::Write;
use core::panic::PanicInfo;

#[cfg(not(feature = "exit"))]
use fpb_core::asm;
use fpb_core::interrupt;
#[cfg(feature = "exit")]
use fpb_semihosting::debug::{self, EXIT_FAILURE};
use fpb_semihosting::hio;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    interrupt::disable();

    if let Ok(mut hstderr) = hio::hstderr() {
        writeln!(hstderr, "{}", info).ok();
    }

    match () {
        // Exit the QEMU process.
        #[cfg(feature = "exit")]
        () => debug::exit(EXIT_FAILURE),
        // OK to fire a breakpoint here: the microcontroller is assumed
        // connected to a debugger whenever this build is used on hardware.
        #[cfg(not(feature = "exit"))]
        () => asm::bkpt(),
    }

    loop {}
}
