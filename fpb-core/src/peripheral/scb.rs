//! System Control Block

use volatile_register::RW;

/// Register block
#[repr(C)]
pub struct RegisterBlock {
    /// Interrupt Control and State
    pub icsr: RW<u32>,
    /// Vector Table Offset
    pub vtor: RW<u32>,
    /// Application Interrupt and Reset Control
    pub aircr: RW<u32>,
    /// System Control
    pub scr: RW<u32>,
    /// Configuration and Control
    pub ccr: RW<u32>,
    /// System Handler Priority
    pub shpr: [RW<u8>; 12],
    /// System Handler Control and State
    pub shcsr: RW<u32>,
    /// Configurable Fault Status
    pub cfsr: RW<u32>,
    /// HardFault Status
    pub hfsr: RW<u32>,
    reserved0: u32,
    /// Memory Management Fault Address
    pub mmfar: RW<u32>,
    /// BusFault Address
    pub bfar: RW<u32>,
    reserved1: [u32; 26],
    /// Cache Line Size ID (M7 only)
    pub ccsidr: RW<u32>,
    reserved2: [u32; 2],
    /// Instruction Cache Invalidate All to PoU (M7 only)
    pub iciallu: RW<u32>,
    reserved3: u32,
    /// Data Cache Invalidate by MVA to PoC (M7 only)
    pub dcimvac: RW<u32>,
    /// Data Cache Invalidate by Set-Way (M7 only)
    pub dcisw: RW<u32>,
    /// Data Cache Clean by MVA to PoU (M7 only)
    pub dccmvau: RW<u32>,
    /// Data Cache Clean by MVA to PoC (M7 only)
    pub dccmvac: RW<u32>,
    /// Data Cache Clean by Set-Way (M7 only)
    pub dccsw: RW<u32>,
    /// Data Cache Clean and Invalidate by MVA to PoC (M7 only)
    pub dccimvac: RW<u32>,
    /// Data Cache Clean and Invalidate by Set-Way (M7 only)
    pub dccisw: RW<u32>,
}

/// VTOR register bit, bit[0..=6] is reserved and SBZ
const VTOR_TBLOFF_MASK: u32 = 0xFFFF_FF80;

impl RegisterBlock {
    /// Cache line size in bytes on a Cortex-M7. Used to round the
    /// `[addr, addr+len)` range passed to `clean_invalidate_dcache_by_address`
    /// up to full cache lines, matching the real hardware's requirement that
    /// maintenance-by-address operations are issued per line.
    pub const DCACHE_LINE_SIZE: u32 = 32;

    /// Sets the Vector Table Offset Register (VTOR).
    ///
    /// # Safety
    ///
    /// `addr` must point to a valid, 128-byte-aligned vector table that
    /// stays live for as long as exceptions can fire.
    #[inline]
    pub unsafe fn vtor_set(&self, addr: u32) {
        self.vtor.write(addr & VTOR_TBLOFF_MASK);
    }

    /// Cleans and invalidates the data cache over `[addr, addr + len)`,
    /// rounded outward to cache-line boundaries.
    ///
    /// This is what makes newly uploaded RAM code visible to the
    /// instruction/data fetch path on cores with a data cache (ARMv7E-M /
    /// Cortex-M7); it is a no-op stand-in on cores without one, since the
    /// register simply won't exist in hardware and the call is behind a
    /// capability check at the call site (`fpb_loader`'s cache-flush hook
    /// is optional).
    #[inline]
    pub fn clean_invalidate_dcache_by_address(&self, addr: u32, len: u32) {
        if len == 0 {
            return;
        }
        let line = Self::DCACHE_LINE_SIZE;
        let start = addr & !(line - 1);
        let end = addr.wrapping_add(len).wrapping_add(line - 1) & !(line - 1);
        let mut a = start;
        while a != end {
            unsafe { self.dccimvac.write(a) };
            a = a.wrapping_add(line);
        }
        crate::asm::dsb();
    }
}
