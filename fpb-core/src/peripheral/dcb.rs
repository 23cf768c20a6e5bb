//! Debug Control Block

use volatile_register::{RW, WO};

/// Register block
#[repr(C)]
pub struct RegisterBlock {
    /// Debug Halting Control and Status
    pub dhcsr: RW<u32>,
    /// Debug Core Register Selector
    pub dcrsr: WO<u32>,
    /// Debug Core Register Data
    pub dcrdr: RW<u32>,
    /// Debug Exception and Monitor Control
    pub demcr: RW<u32>,
}

/// DHCSR: debugger (not just `MON_EN`) is attached and has enabled halting
/// debug. `MON_EN` alone is not sufficient to trust DebugMonitor delivery —
/// see `RegisterBlock::debug_enabled`.
const DHCSR_C_DEBUGEN: u32 = 1 << 0;
/// DEMCR: enables the DebugMonitor exception.
const DEMCR_MON_EN: u32 = 1 << 16;
/// DEMCR: DWT and ITM unit enable, required for some watchpoint-based debug
/// features; FPB itself does not require it but the spec's setup sequence
/// (§4.6) groups it with `MON_EN`.
const DEMCR_TRCENA: u32 = 1 << 24;

impl RegisterBlock {
    /// Enables the DebugMonitor exception (DEMCR.MON_EN) and the trace
    /// subsystem (DEMCR.TRCENA), per the DebugMonitor setup sequence in
    /// spec §4.6.
    #[inline]
    pub fn enable_debug_monitor(&self) {
        unsafe {
            self.demcr.modify(|r| r | DEMCR_MON_EN | DEMCR_TRCENA);
        }
    }

    /// Disables the DebugMonitor exception.
    #[inline]
    pub fn disable_debug_monitor(&self) {
        unsafe {
            self.demcr.modify(|r| r & !DEMCR_MON_EN);
        }
    }

    /// Whether halting debug is enabled, i.e. a debugger is attached and
    /// `DebugMonitor`-mode breakpoints can actually fire instead of being
    /// silently ignored by the core.
    #[inline]
    pub fn debug_enabled(&self) -> bool {
        self.dhcsr.read() & DHCSR_C_DEBUGEN != 0
    }
}
