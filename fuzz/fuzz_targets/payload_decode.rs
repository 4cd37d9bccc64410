//! Fuzz target for Command::decode
//!
//! This fuzzer tests payload decoding with arbitrary byte sequences to find:
//! - Parser crashes or panics
//! - Integer overflows in varint handling
//! - Buffer over-reads on truncated sub-messages
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use droidlink_proto::Command;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Attempt to decode arbitrary bytes as a command payload
    // This should never panic, only return Err for invalid data
    if let Ok(cmd) = Command::decode(data) {
        // Anything that decodes must re-encode within the payload bound
        // and round-trip to the same command.
        let mut buf = [0u8; droidlink_proto::MAX_PAYLOAD];
        if let Ok(len) = cmd.encode(&mut buf) {
            let reparsed = Command::decode(&buf[..len]).expect("re-encoded command decodes");
            assert_eq!(reparsed, cmd, "round-trip must be identity");
        }
    }
});
