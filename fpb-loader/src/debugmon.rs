//! DebugMonitor back-end: PC rewriting via the exception entry stack frame.
//!
//! The stack-pointer selection (MSP vs PSP, from `EXC_RETURN` bit 2) cannot
//! be authored in portable code — it must read `LR` at the instant of
//! exception entry, before any further call can clobber it. That belongs
//! to a small naked entry stub in the device binary (grounded on
//! `fpb_core::stacked_frame_ptr` and `fpb_core::EXC_RETURN_SPSEL`). This
//! module is everything downstream of that stub: given the frame pointer,
//! look up the redirect table and rewrite the stacked PC.
//!
//! Edge case (§4.6, §9): if no redirect matches a breakpointed address,
//! execution resumes at the original address and re-faults. This port
//! guarantees every enabled comparator has a redirect — `dpatch` only
//! enables the comparator after the table entry is written, and `unpatch`
//! always disables the comparator before clearing the entry — instead of
//! a single-step bypass, since it needs no extra architectural support.

use fpb_core::StackFrame;

const THUMB_BIT: u32 = 1;

/// One DebugMonitor redirect record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Redirect {
    /// Breakpointed Flash address, Thumb bit cleared (matched against the
    /// stacked PC, which also has its Thumb bit cleared on ARMv7-M).
    pub original_addr: u32,
    /// Address execution resumes at, Thumb bit set.
    pub redirect_addr: u32,
    /// Whether this entry is live.
    pub enabled: bool,
}

/// Fixed-capacity redirect table, read by the DebugMonitor handler and
/// written by the `dpatch`/`unpatch` command handlers.
///
/// Reader/writer discipline (§5): the handler only ever reads; writes from
/// Thread-mode code are safe without a lock because the command processor
/// is single-threaded and the handler observes each entry atomically (one
/// `u32`-sized field at a time is not required here since the handler
/// only reads, never partially-applies a write — `register` fully
/// populates an entry before flipping `enabled`).
pub struct RedirectTable<const N: usize> {
    entries: [Redirect; N],
}

impl<const N: usize> Default for RedirectTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RedirectTable<N> {
    /// Creates a table with every entry disabled.
    pub const fn new() -> Self {
        RedirectTable { entries: [Redirect { original_addr: 0, redirect_addr: 0, enabled: false }; N] }
    }

    /// Registers slot `k`'s redirect. Thumb bit is cleared on
    /// `original_addr` (so it matches the stacked PC) and set on
    /// `redirect_addr` (so resuming execution lands in Thumb state).
    pub fn register(&mut self, k: usize, original_addr: u32, redirect_addr: u32) -> bool {
        let Some(entry) = self.entries.get_mut(k) else { return false };
        *entry = Redirect { original_addr: original_addr & !THUMB_BIT, redirect_addr: redirect_addr | THUMB_BIT, enabled: true };
        true
    }

    /// Disables slot `k`'s redirect.
    pub fn clear(&mut self, k: usize) -> bool {
        let Some(entry) = self.entries.get_mut(k) else { return false };
        *entry = Redirect::default();
        true
    }

    /// Finds the enabled entry matching `pc` (Thumb bit ignored on both
    /// sides), if any.
    pub fn find(&self, pc: u32) -> Option<&Redirect> {
        let pc = pc & !THUMB_BIT;
        self.entries.iter().find(|e| e.enabled && e.original_addr == pc)
    }
}

/// Rewrites `frame.pc` in place to the redirect target for the faulting
/// address, if a redirect matches.
///
/// Called from the architecture-specific entry stub with the frame pointer
/// selected per `EXC_RETURN` bit 2. Returns whether a redirect was applied;
/// callers in debug builds may assert this is always `true`, per the
/// reentrant-free discipline documented on [`RedirectTable`].
///
/// # Safety
///
/// `frame` must point at a valid, exclusively-owned exception stack frame
/// for the duration of this call — exactly the frame the hardware pushed
/// on DebugMonitor entry.
pub unsafe fn handle<const N: usize>(table: &RedirectTable<N>, frame: *mut StackFrame) -> bool {
    let pc = unsafe { (*frame).pc };
    if let Some(redirect) = table.find(pc) {
        unsafe { (*frame).pc = redirect.redirect_addr };
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_clears_thumb_bit_on_original_and_sets_it_on_redirect() {
        let mut t: RedirectTable<6> = RedirectTable::new();
        assert!(t.register(0, 0x0800_1234 | 1, 0x2000_1000));
        let e = t.find(0x0800_1234).unwrap();
        assert_eq!(e.original_addr, 0x0800_1234);
        assert_eq!(e.redirect_addr, 0x2000_1001);
    }

    #[test]
    fn find_ignores_thumb_bit_on_query() {
        let mut t: RedirectTable<6> = RedirectTable::new();
        t.register(0, 0x0800_1234, 0x2000_1000);
        assert!(t.find(0x0800_1234 | 1).is_some());
    }

    #[test]
    fn handle_rewrites_stacked_pc() {
        let mut t: RedirectTable<6> = RedirectTable::new();
        t.register(0, 0x0800_1234, 0x2000_1000);

        let mut frame = StackFrame { r0: 0, r1: 0, r2: 0, r3: 0, r12: 0, lr: 0, pc: 0x0800_1234, xpsr: 0 };
        let applied = unsafe { handle(&t, &mut frame as *mut StackFrame) };
        assert!(applied);
        assert_eq!(frame.pc, 0x2000_1001);
    }

    #[test]
    fn handle_leaves_pc_unchanged_when_no_redirect_matches() {
        let t: RedirectTable<6> = RedirectTable::new();
        let mut frame = StackFrame { r0: 0, r1: 0, r2: 0, r3: 0, r12: 0, lr: 0, pc: 0x0800_1234, xpsr: 0 };
        let applied = unsafe { handle(&t, &mut frame as *mut StackFrame) };
        assert!(!applied);
        assert_eq!(frame.pc, 0x0800_1234);
    }
}
