//! Main Stack Pointer

#[cfg(target_arch = "arm")]
use core::arch::asm;

/// Reads the CPU register.
#[cfg(target_arch = "arm")]
#[inline]
pub fn read() -> u32 {
    let r;
    unsafe { asm!("mrs {}, MSP", out(reg) r, options(nomem, nostack, preserves_flags)) };
    r
}

/// Reads the CPU register.
#[cfg(not(target_arch = "arm"))]
#[inline]
pub fn read() -> u32 {
    0
}
