//! Interrupts

pub use bare_metal::{CriticalSection, Mutex, Nr};

#[cfg(target_arch = "arm")]
use core::arch::asm;

/// Disables all interrupts.
#[inline]
pub fn disable() {
    #[cfg(target_arch = "arm")]
    unsafe {
        asm!("cpsid i", options(nomem, nostack, preserves_flags));
    }
    #[cfg(not(target_arch = "arm"))]
    {}
}

/// Enables all the interrupts.
///
/// # Safety
///
/// Do not call this function inside an [`free`] critical section.
#[inline]
pub unsafe fn enable() {
    #[cfg(target_arch = "arm")]
    asm!("cpsie i", options(nomem, nostack, preserves_flags));
}

/// Executes closure `f` in an interrupt-free context.
///
/// This is also known as a "critical section". The command processor
/// itself never needs this (it's single-threaded and runs to completion
/// per command, per spec §5) — it exists for the slot table / FPB driver
/// writer discipline when a caller must guarantee the DebugMonitor
/// exception cannot observe a half-written comparator + target pair.
pub fn free<F, R>(f: F) -> R
where
    F: FnOnce(&CriticalSection) -> R,
{
    let primask = crate::register::primask::read();

    disable();

    let r = f(unsafe { &CriticalSection::new() });

    if primask.is_active() {
        unsafe { enable() }
    }

    r
}
