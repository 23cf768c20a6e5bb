//! Processor core special registers used by the FPB patch path.
//!
//! Trimmed to the registers the DebugMonitor stack-selection contract and
//! the interrupt-masking critical section actually need: `PRIMASK`, `MSP`,
//! `PSP`. The full Cortex-M special-register file (`APSR`, `BASEPRI`,
//! `CONTROL`, ...) is out of scope for this system.
//!
//! # References
//!
//! - Cortex-M Devices Generic User Guide - Section 2.1.3 Core registers

pub mod msp;
pub mod primask;
pub mod psp;
