//! Reliability engine and dispatch surface for the droidlink protocol.
//!
//! [`Link`] is the single entry point: it owns the frame parser, the sent
//! and received message windows and the outstanding-acknowledgement table,
//! and drives them from a borrowed non-blocking byte stream. Commands go
//! out with [`Link::send`]; [`Link::process_queue`] drains inbound bytes,
//! acknowledges and dispatches decoded commands to injected handlers, and
//! retransmits anything the peer has not acknowledged within the message
//! timeout.
//!
//! Everything is single-threaded and synchronous: no internal tasks, no
//! async points, no global clock. Time enters exclusively through the
//! injected timestamp provider, which is what makes the retry behaviour
//! deterministic under test.

pub mod clock;
pub mod error;
pub mod link;
pub mod stream;
pub mod window;

pub use clock::{TimestampProvider, monotonic_provider};
pub use error::SendError;
pub use link::{
    DEFAULT_MAX_RETRIES, DEFAULT_MESSAGE_TIMEOUT_MS, Link, LinkConfig, OutstandingEntry,
};
pub use stream::ByteStream;
pub use window::{HasId, RecentWindow, WINDOW_CAPACITY};
