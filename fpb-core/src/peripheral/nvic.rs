//! Nested Vectored Interrupt Controller

use crate::interrupt::Nr;
use volatile_register::{RO, RW};

const PRIORITY_BITS: u8 = 4;

/// Register block
#[repr(C)]
pub struct RegisterBlock {
    /// Interrupt Set-Enable
    iser: [RW<u32>; 8],
    reserved0: [u32; 24],
    /// Interrupt Clear-Enable
    icer: [RW<u32>; 8],
    reserved1: [u32; 24],
    /// Interrupt Set-Pending
    ispr: [RW<u32>; 8],
    reserved2: [u32; 24],
    /// Interrupt Clear-Pending
    icpr: [RW<u32>; 8],
    reserved3: [u32; 24],
    /// Interrupt Active Bit
    iabr: [RO<u32>; 8],
    reserved4: [u32; 56],
    /// Interrupt Priority
    ipr: [RW<u8>; 240],
}

impl RegisterBlock {
    /// Clears `interrupt`'s pending state
    pub fn clear_pending<I: Nr>(&self, interrupt: I) {
        let nr = interrupt.nr();
        unsafe { self.icpr[usize::from(nr / 32)].write(1 << (nr % 32)) };
    }

    /// Disables `interrupt`
    pub fn disable<I: Nr>(&self, interrupt: I) {
        let nr = interrupt.nr();
        unsafe { self.icer[usize::from(nr / 32)].write(1 << (nr % 32)) };
    }

    /// Enables `interrupt`
    pub fn enable<I: Nr>(&self, interrupt: I) {
        let nr = interrupt.nr();
        unsafe { self.iser[usize::from(nr / 32)].write(1 << (nr % 32)) };
    }

    /// Gets the priority of `interrupt`
    pub fn get_priority<I: Nr>(&self, interrupt: I) -> u8 {
        let nr = interrupt.nr();
        self.ipr[usize::from(nr)].read() >> (8 - PRIORITY_BITS)
    }

    /// Is `interrupt` active or pre-empted and stacked
    pub fn is_active<I: Nr>(&self, interrupt: I) -> bool {
        let nr = interrupt.nr();
        let mask = 1 << (nr % 32);
        (self.iabr[usize::from(nr / 32)].read() & mask) == mask
    }

    /// Checks if `interrupt` is enabled
    pub fn is_enabled<I: Nr>(&self, interrupt: I) -> bool {
        let nr = interrupt.nr();
        let mask = 1 << (nr % 32);
        (self.iser[usize::from(nr / 32)].read() & mask) == mask
    }

    /// Checks if `interrupt` is pending
    pub fn is_pending<I: Nr>(&self, interrupt: I) -> bool {
        let nr = interrupt.nr();
        let mask = 1 << (nr % 32);
        (self.ispr[usize::from(nr / 32)].read() & mask) == mask
    }

    /// Forces `interrupt` into pending state
    pub fn set_pending<I: Nr>(&self, interrupt: I) {
        let nr = interrupt.nr();
        unsafe { self.ispr[usize::from(nr / 32)].write(1 << (nr % 32)) };
    }

    /// Sets the priority of `interrupt` to `prio`
    pub fn set_priority<I: Nr>(&self, interrupt: I, prio: u8) {
        let nr = interrupt.nr();
        unsafe {
            self.ipr[usize::from(nr)].write((prio & ((1 << PRIORITY_BITS) - 1)) << (8 - PRIORITY_BITS));
        }
    }
}
