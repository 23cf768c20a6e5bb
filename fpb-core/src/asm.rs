//! Miscellaneous assembly instructions used by the FPB driver and the
//! DebugMonitor handler.
//!
//! Kept deliberately small: this port has no need for the full assembly
//! surface `cortex-m` exposes (WFI/WFE/TT/BXNS/...), only the barriers the
//! patch-programming sequences in spec §4.4-§4.6 call for, plus `bkpt` for
//! the panic handler.

#[cfg(target_arch = "arm")]
use core::arch::asm;

/// Instruction Synchronization Barrier.
///
/// Flushes the pipeline, so instructions following the `ISB` are fetched
/// fresh. Required after reprogramming `FP_CTRL`/`FP_COMP`/`FP_REMAP` so the
/// next fetch of the patched address observes the new comparator.
#[inline]
pub fn isb() {
    #[cfg(target_arch = "arm")]
    unsafe {
        asm!("isb", options(nomem, nostack, preserves_flags));
    }
}

/// Data Synchronization Barrier.
///
/// No instruction after this one executes until every memory access and
/// cache/branch-predictor maintenance operation issued before it completes.
/// Required between writing a RAM target (trampoline table entry, injected
/// code) and enabling the comparator that exposes it to execution.
#[inline]
pub fn dsb() {
    #[cfg(target_arch = "arm")]
    unsafe {
        asm!("dsb", options(nomem, nostack, preserves_flags));
    }
}

/// Data Memory Barrier.
#[inline]
pub fn dmb() {
    #[cfg(target_arch = "arm")]
    unsafe {
        asm!("dmb", options(nomem, nostack, preserves_flags));
    }
}

/// No-operation. Useful to keep a loop from being optimized away.
#[inline]
pub fn nop() {
    #[cfg(target_arch = "arm")]
    unsafe {
        asm!("nop", options(nomem, nostack, preserves_flags));
    }
}

/// Puts the processor in Debug state; a debugger observes this as a
/// breakpoint. Used by the panic handler once the message has been
/// reported through the output sink.
#[inline(always)]
pub fn bkpt() {
    #[cfg(target_arch = "arm")]
    unsafe {
        asm!("bkpt #0", options(nomem, nostack, preserves_flags));
    }
}
