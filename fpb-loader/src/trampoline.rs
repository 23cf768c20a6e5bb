//! Trampoline bank: the Flash-resident indirection FPBv1 REMAP needs to
//! reach RAM payloads outside the Code region.
//!
//! FPBv1's REMAP can only retarget fetches to the Code region
//! (`< 0x2000_0000`). To redirect a Flash function to RAM-resident
//! injected code, the comparator instead REMAPs to a small Flash stub
//! (legal, since Flash is Code region) that indirects through a writable
//! RAM target table to the actual payload.
//!
//! The stubs themselves are architecture-specific hand-written assembly
//! that preserves R0-R3 and LR before loading `targets[k]` and branching;
//! this crate owns only the RAM target table and the programming sequence,
//! addressing the stubs by a caller-supplied base and stride.

use fpb_core::peripheral::fpb::{Fpb, FpbError, RegisterBlock};

/// Thumb bit, set on every live RAM target so a load-and-branch through it
/// lands back in Thumb state.
const THUMB_BIT: u32 = 1;

/// RAM target table for up to `N` trampoline stubs, plus the fixed Flash
/// addresses of the stubs themselves.
pub struct TrampolineBank<const N: usize> {
    targets: [u32; N],
    stub_base: u32,
    stub_stride: u32,
}

impl<const N: usize> TrampolineBank<N> {
    /// Creates a bank addressing stub `k` at `stub_base + k * stub_stride`.
    /// The caller's linker script places the actual stub code at those
    /// addresses; this type only manages the RAM side.
    pub const fn new(stub_base: u32, stub_stride: u32) -> Self {
        TrampolineBank { targets: [0; N], stub_base, stub_stride }
    }

    /// Flash address of trampoline stub `k`.
    pub fn stub_address(&self, k: usize) -> Option<u32> {
        if k >= N {
            return None;
        }
        Some(self.stub_base + k as u32 * self.stub_stride)
    }

    /// Current RAM target for stub `k` (0 if unset).
    pub fn target(&self, k: usize) -> Option<u32> {
        self.targets.get(k).copied()
    }

    /// Programs slot `k`'s redirection: writes the RAM target, barriers,
    /// then REMAPs `original_addr` to this bank's Flash stub for `k`.
    ///
    /// Write ordering matters: the RAM target must be visible before the
    /// comparator that exposes the stub (and hence the target) to
    /// execution is enabled — see §5's writer discipline.
    pub fn program(
        &mut self,
        fpb: &mut Fpb,
        regs: &RegisterBlock,
        k: usize,
        original_addr: u32,
        target_addr: u32,
    ) -> Result<(), FpbError> {
        let stub = self.stub_address(k).ok_or(FpbError::InvalidComparator)?;
        let slot = self.targets.get_mut(k).ok_or(FpbError::InvalidComparator)?;

        *slot = target_addr | THUMB_BIT;
        fpb_core::asm::dmb();

        fpb.program_remap(regs, k, original_addr, stub)
    }

    /// Clears slot `k`: disables the comparator, then zeroes its RAM
    /// target.
    pub fn clear(&mut self, fpb: &mut Fpb, regs: &RegisterBlock, k: usize) {
        fpb.clear(regs, k);
        if let Some(slot) = self.targets.get_mut(k) {
            *slot = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fpb_core::peripheral::fpb::MAX_COMPARATORS;

    fn make_regs() -> alloc_regs::Boxed {
        alloc_regs::alloc_register_block()
    }

    mod alloc_regs {
        use fpb_core::peripheral::fpb::RegisterBlock;
        use std::alloc::{alloc_zeroed, Layout};

        pub struct Boxed(pub *mut RegisterBlock);

        pub fn alloc_register_block() -> Boxed {
            let layout = Layout::new::<RegisterBlock>();
            let ptr = unsafe { alloc_zeroed(layout) } as *mut RegisterBlock;
            assert!(!ptr.is_null());
            Boxed(ptr)
        }

        impl core::ops::Deref for Boxed {
            type Target = RegisterBlock;
            fn deref(&self) -> &RegisterBlock {
                unsafe { &*self.0 }
            }
        }
    }

    #[test]
    fn stub_address_is_base_plus_index_times_stride() {
        let bank: TrampolineBank<MAX_COMPARATORS> = TrampolineBank::new(0x0800_4000, 16);
        assert_eq!(bank.stub_address(0), Some(0x0800_4000));
        assert_eq!(bank.stub_address(3), Some(0x0800_4030));
        assert_eq!(bank.stub_address(MAX_COMPARATORS), None);
    }

    #[test]
    fn program_sets_ram_target_with_thumb_bit() {
        let regs = make_regs();
        let mut fpb = Fpb::new();
        // Fake an initialized driver with one comparator for the test.
        let ctrl_word = 1u32 << 4; // NUM_CODE = 1
        unsafe { regs.ctrl.write(ctrl_word) };
        fpb.init(&regs).unwrap();

        let mut bank: TrampolineBank<MAX_COMPARATORS> = TrampolineBank::new(0x0800_4000, 16);
        bank.program(&mut fpb, &regs, 0, 0x0800_1000, 0x2000_1000).unwrap();
        assert_eq!(bank.target(0), Some(0x2000_1001));
    }
}
