//! Slot table: the device's record of active redirections.
//!
//! One slot per FPB code comparator. A slot pins the lifetime of exactly
//! one allocation (the injected code's backing memory) to the comparator
//! it drives; clearing the slot is the only path that frees that
//! allocation.

/// Which hardware path a slot's redirection was programmed through.
///
/// `unpatch` needs this to know which back-end to tear down; the slot
/// table itself never touches hardware, so it just carries the tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Backend {
    /// Direct FPB REMAP (`patch`).
    #[default]
    Direct,
    /// FPB REMAP through a Flash trampoline stub (`tpatch`).
    Trampoline,
    /// FPB breakpoint plus DebugMonitor PC rewrite (`dpatch`).
    DebugMonitor,
}

/// A single redirection record, 1:1 with an FPB code comparator index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Slot {
    /// Whether this slot currently drives an enabled comparator.
    pub active: bool,
    /// Flash address of the replaced function, Thumb bit cleared.
    pub original_addr: u32,
    /// RAM entry point of the injection, Thumb bit set.
    pub target_addr: u32,
    /// Bytes of code currently owned by this slot.
    pub code_size: u32,
    /// Base of the allocation whose lifetime is pinned to this slot; zero
    /// if the slot owns no allocation (should not occur while `active`).
    pub alloc_addr: u32,
    /// Hardware path driving this slot's redirection.
    pub backend: Backend,
}

/// Fixed-capacity table of up to `N` slots.
///
/// `N` is set to the driver's maximum tracked comparator count
/// ([`fpb_core::peripheral::fpb::MAX_COMPARATORS`]); a given device only
/// uses the first `Fpb::num_code_comparators()` of them.
pub struct SlotTable<const N: usize> {
    slots: [Slot; N],
}

impl<const N: usize> Default for SlotTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SlotTable<N> {
    /// Creates a table with every slot inactive.
    pub const fn new() -> Self {
        SlotTable {
            slots: [Slot { active: false, original_addr: 0, target_addr: 0, code_size: 0, alloc_addr: 0, backend: Backend::Direct }; N],
        }
    }

    /// Read-only view of slot `k`.
    pub fn get(&self, k: usize) -> Option<&Slot> {
        self.slots.get(k)
    }

    /// Assigns slot `k`, marking it active.
    ///
    /// Overwrites any previous assignment without freeing its allocation —
    /// the caller (a `patch*` command handler) is responsible for clearing
    /// the hardware back-end and freeing the prior allocation first, which
    /// it always does because it only ever calls `assign` with a freshly
    /// allocated pending block.
    pub fn assign(&mut self, k: usize, original_addr: u32, target_addr: u32, code_size: u32, alloc_addr: u32, backend: Backend) -> bool {
        let Some(slot) = self.slots.get_mut(k) else { return false };
        *slot = Slot { active: true, original_addr, target_addr, code_size, alloc_addr, backend };
        true
    }

    /// Clears slot `k` (sets `active = false`, zeroes the rest) and returns
    /// the allocation it owned, if any, for the caller to free.
    pub fn clear(&mut self, k: usize) -> Option<u32> {
        let slot = self.slots.get_mut(k)?;
        let alloc_addr = slot.alloc_addr;
        *slot = Slot::default();
        if alloc_addr != 0 {
            Some(alloc_addr)
        } else {
            None
        }
    }

    /// Clears every slot `0..N`, including inactive ones (to guarantee the
    /// caller disables their hardware back-end unconditionally), returning
    /// the allocations that were owned by slots that had one.
    ///
    /// Capacity-bounded: returns at most `N` addresses, matching the number
    /// of slots this table can ever hold.
    pub fn clear_all(&mut self) -> ([u32; N], usize) {
        let mut freed = [0u32; N];
        let mut count = 0;
        for slot in self.slots.iter_mut() {
            if slot.alloc_addr != 0 {
                freed[count] = slot.alloc_addr;
                count += 1;
            }
            *slot = Slot::default();
        }
        (freed, count)
    }

    /// Iterates over every slot with its index.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Slot)> {
        self.slots.iter().enumerate()
    }

    /// Number of slots currently active.
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.active).count()
    }

    /// Total capacity of this table.
    pub fn capacity(&self) -> usize {
        N
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_then_clear_returns_owned_allocation() {
        let mut t: SlotTable<6> = SlotTable::new();
        assert!(t.assign(0, 0x0800_1000, 0x2000_1001, 128, 0x2000_2000, Backend::Direct));
        assert!(t.get(0).unwrap().active);
        assert_eq!(t.clear(0), Some(0x2000_2000));
        assert!(!t.get(0).unwrap().active);
    }

    #[test]
    fn clear_all_sweeps_inactive_slots_too() {
        let mut t: SlotTable<6> = SlotTable::new();
        t.assign(0, 1, 2, 3, 0x1000, Backend::Direct);
        t.assign(2, 4, 5, 6, 0x2000, Backend::Trampoline);
        // slot 1 stays inactive/unowned: not returned by clear_all.
        let (freed, count) = t.clear_all();
        assert_eq!(count, 2);
        assert!(freed[..count].contains(&0x1000));
        assert!(freed[..count].contains(&0x2000));
        assert_eq!(t.active_count(), 0);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut t: SlotTable<6> = SlotTable::new();
        assert!(!t.assign(6, 0, 0, 0, 0, Backend::Direct));
        assert!(t.clear(6).is_none());
    }
}
