//! Deterministic test harness for the droidlink protocol.
//!
//! Scripted implementations of the byte stream and timestamp provider,
//! plus invariant checks over a live [`droidlink_core::Link`]. No real
//! I/O and no real clock anywhere: tests inject bytes and milliseconds and
//! observe every frame the engine writes.
//!
//! # Invariant Testing
//!
//! [`check_invariants`] verifies WHAT must always hold (outstanding
//! messages retransmittable, retry counts capped, windows bounded) rather
//! than specific scenarios; sprinkle it after every step of a scenario
//! test.

#![forbid(unsafe_code)]

pub mod invariants;
pub mod sim;

pub use invariants::{Violation, check_invariants};
pub use sim::{SimClock, SimStream};
