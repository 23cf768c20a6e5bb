//! Core peripherals
//!
//! # API
//!
//! All the core peripherals are modeled as singletons (there can only ever
//! be, at most, one instance of any one of them at any given point in time)
//! and the only way to get an instance is through [`Peripherals::take`].
//!
//! ```no_run
//! use fpb_core::peripheral::Peripherals;
//!
//! let peripherals = Peripherals::take().unwrap();
//! let vtor = peripherals.SCB.vtor.read();
//! ```
//!
//! `Peripherals::take` can only succeed once; later calls return `None`.
//! The singleton property can be unsafely bypassed with `steal`, a useful
//! building block for higher level abstractions that need to hand a
//! peripheral handle to, say, a DebugMonitor exception handler that cannot
//! itself call `take`.
//!
//! # References
//!
//! - ARMv7-M Architecture Reference Manual (Issue E.b) - Chapter B3

use core::marker::PhantomData;
use core::ops;
use core::sync::atomic::{AtomicBool, Ordering};

pub mod dcb;
pub mod fpb;
pub mod nvic;
pub mod scb;

static TAKEN: AtomicBool = AtomicBool::new(false);

/// Core peripherals relevant to FPB-based hot patching.
#[allow(non_snake_case)]
pub struct Peripherals {
    /// Debug Control Block (DHCSR / DEMCR)
    pub DCB: DCB,
    /// Flash Patch and Breakpoint unit
    pub FPB: FPB,
    /// Nested Vectored Interrupt Controller
    pub NVIC: NVIC,
    /// System Control Block (VTOR, cache maintenance)
    pub SCB: SCB,
}

impl Peripherals {
    /// Returns the core peripherals exactly once.
    #[inline]
    pub fn take() -> Option<Self> {
        if TAKEN.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(unsafe { Peripherals::steal() })
        }
    }

    /// Unchecked version of [`Peripherals::take`] that bypasses the
    /// singleton check.
    ///
    /// # Safety
    ///
    /// Must not be used to create aliased `&mut` access to the same
    /// register block from two call sites that can run concurrently (e.g.
    /// Thread-mode code and the DebugMonitor exception, which instead reads
    /// through a plain pointer — see `fpb_loader::debugmon`).
    #[inline]
    pub unsafe fn steal() -> Self {
        Peripherals {
            DCB: DCB { _marker: PhantomData },
            FPB: FPB { _marker: PhantomData },
            NVIC: NVIC { _marker: PhantomData },
            SCB: SCB { _marker: PhantomData },
        }
    }
}

/// Debug Control Block
pub struct DCB {
    _marker: PhantomData<*const ()>,
}

unsafe impl Send for DCB {}

impl DCB {
    /// Returns a pointer to the register block.
    #[inline(always)]
    pub fn ptr() -> *const dcb::RegisterBlock {
        0xE000_EDF0 as *const _
    }
}

impl ops::Deref for DCB {
    type Target = dcb::RegisterBlock;

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        unsafe { &*Self::ptr() }
    }
}

/// Flash Patch and Breakpoint unit
pub struct FPB {
    _marker: PhantomData<*const ()>,
}

unsafe impl Send for FPB {}

impl FPB {
    /// Returns a pointer to the register block.
    #[inline(always)]
    pub fn ptr() -> *const fpb::RegisterBlock {
        0xE000_2000 as *const _
    }
}

impl ops::Deref for FPB {
    type Target = fpb::RegisterBlock;

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        unsafe { &*Self::ptr() }
    }
}

/// Nested Vectored Interrupt Controller
pub struct NVIC {
    _marker: PhantomData<*const ()>,
}

unsafe impl Send for NVIC {}

impl NVIC {
    /// Returns a pointer to the register block.
    #[inline(always)]
    pub fn ptr() -> *const nvic::RegisterBlock {
        0xE000_E100 as *const _
    }
}

impl ops::Deref for NVIC {
    type Target = nvic::RegisterBlock;

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        unsafe { &*Self::ptr() }
    }
}

/// System Control Block
pub struct SCB {
    _marker: PhantomData<*const ()>,
}

unsafe impl Send for SCB {}

impl SCB {
    /// Returns a pointer to the register block.
    #[inline(always)]
    pub fn ptr() -> *const scb::RegisterBlock {
        0xE000_ED04 as *const _
    }
}

impl ops::Deref for SCB {
    type Target = scb::RegisterBlock;

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        unsafe { &*Self::ptr() }
    }
}
