//! Injected time.
//!
//! The engine reads wall time exclusively through a caller-supplied
//! provider so retry behaviour is deterministic under test. Providers
//! return milliseconds and must be monotonic non-decreasing within one
//! link.

use std::time::Instant;

/// Millisecond timestamp source injected into a link.
///
/// `FnMut` so test clocks can keep internal state (e.g. auto-increment to
/// hand out distinct command ids within one millisecond).
pub type TimestampProvider = Box<dyn FnMut() -> u64>;

/// Default provider: milliseconds elapsed since the provider was created,
/// from the process monotonic clock.
#[must_use]
pub fn monotonic_provider() -> TimestampProvider {
    let origin = Instant::now();
    Box::new(move || origin.elapsed().as_millis() as u64)
}
