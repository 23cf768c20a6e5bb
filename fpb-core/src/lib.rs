//! Low-level access to the Cortex-M core peripherals and registers needed
//! to implement runtime function redirection via the Flash Patch and
//! Breakpoint (FPB) unit.
//!
//! This crate provides:
//!
//! - The FPB peripheral: register block, comparator programming, the
//!   Thumb-2 branch encoder REMAP-mode patches are built from.
//! - DCB (`DHCSR`/`DEMCR`) and SCB (`VTOR`, data-cache maintenance) access
//!   needed by the DebugMonitor back-end and the cache-flush-before-patch
//!   requirement.
//! - The exception stack frame layout the DebugMonitor handler reads and
//!   rewrites.
//! - Interrupt masking primitives and the handful of special registers
//!   (`PRIMASK`, `MSP`, `PSP`) the stack-selection contract needs.

#![deny(missing_docs)]
#![cfg_attr(not(test), no_std)]

pub mod asm;
pub mod interrupt;
pub mod peripheral;
pub mod register;

/// Registers an architecturally-defined exception entry pushes onto the
/// active stack, in push order (lowest address first).
///
/// This is exactly the frame the DebugMonitor handler (spec §4.6) reads to
/// find the faulting `pc`, and the frame whose `pc` slot it overwrites with
/// the redirect target before returning.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct StackFrame {
    /// (General purpose) Register 0 — first argument.
    pub r0: u32,
    /// (General purpose) Register 1 — second argument.
    pub r1: u32,
    /// (General purpose) Register 2 — third argument.
    pub r2: u32,
    /// (General purpose) Register 3 — fourth argument.
    pub r3: u32,
    /// (General purpose) Register 12 — intra-procedure-call scratch.
    pub r12: u32,
    /// Link Register at the time of the exception.
    pub lr: u32,
    /// Return Program Counter: the address execution resumes at. This is
    /// the slot the DebugMonitor handler rewrites.
    pub pc: u32,
    /// Program Status Register.
    pub xpsr: u32,
}

/// Exception/Interrupt handler function pointer.
pub type Handler = unsafe extern "C" fn();

/// Bit 2 of `EXC_RETURN`: clear selects the Main Stack Pointer, set selects
/// the Process Stack Pointer. Read from `LR` on exception entry (spec
/// §4.6 step 1).
pub const EXC_RETURN_SPSEL: u32 = 1 << 2;

/// Chooses between the Main and Process stack pointer based on the
/// `EXC_RETURN` value captured in `LR` at exception entry.
#[inline]
pub fn stacked_frame_ptr(exc_return: u32, msp: u32, psp: u32) -> *mut StackFrame {
    let sp = if exc_return & EXC_RETURN_SPSEL != 0 { psp } else { msp };
    sp as *mut StackFrame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exc_return_bit2_selects_psp() {
        let msp = 0x2000_0100;
        let psp = 0x2000_0200;
        assert_eq!(stacked_frame_ptr(0xFFFF_FFFD, msp, psp), psp as *mut StackFrame);
        assert_eq!(stacked_frame_ptr(0xFFFF_FFF9, msp, psp), msp as *mut StackFrame);
    }
}
