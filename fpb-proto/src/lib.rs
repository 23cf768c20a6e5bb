//! Wire-level constants and codecs shared by the device firmware and the
//! host tool.
//!
//! Nothing here touches hardware or I/O; it is pulled in by both
//! `fpb-loader` (device, `no_std`) and `fpb-host` (host, `std`) so the two
//! sides can never disagree on the checksum polynomial or the response
//! markers.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]

pub mod codec;
pub mod crc16;
pub mod markers;

pub use crc16::crc16_ccitt;
