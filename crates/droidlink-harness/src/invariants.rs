//! Invariant checks over a live link.
//!
//! These capture behavioural properties that must hold after ANY sequence
//! of operations, not specific scenarios: run [`check_invariants`] between
//! steps of a scenario test and after every chaos round.

use std::fmt;

use droidlink_core::{ByteStream, Link, WINDOW_CAPACITY};

/// A broken invariant, with enough context to point at the culprit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Human-readable description of what failed.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Verify the link's structural invariants.
///
/// - Every outstanding id has its payload live in the sent window, so a
///   retransmission always has a source.
/// - No outstanding entry has exceeded the retry cap.
/// - Neither window holds more than its fixed capacity.
///
/// # Errors
///
/// Returns the first [`Violation`] found.
pub fn check_invariants<S: ByteStream>(link: &Link<S>) -> Result<(), Violation> {
    for id in link.outstanding_ids() {
        if !link.sent_window().contains(id) {
            return Err(Violation {
                message: format!("outstanding id {id} has no payload in the sent window"),
            });
        }

        if let Some(entry) = link.outstanding(id) {
            if entry.retries > link.max_retries() {
                return Err(Violation {
                    message: format!(
                        "outstanding id {id} at {} retries, cap is {}",
                        entry.retries,
                        link.max_retries()
                    ),
                });
            }
        }
    }

    if link.sent_window().len() > WINDOW_CAPACITY {
        return Err(Violation {
            message: format!("sent window holds {} records", link.sent_window().len()),
        });
    }
    if link.received_window().len() > WINDOW_CAPACITY {
        return Err(Violation {
            message: format!("received window holds {} records", link.received_window().len()),
        });
    }

    Ok(())
}
