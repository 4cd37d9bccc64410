//! Chaos tests: hostile wire conditions with a seeded RNG.
//!
//! Two phases with different guarantees:
//!
//! - Duplication-only chaos is lossless, so every command must be
//!   dispatched exactly once and every outstanding entry must clear.
//! - Byte-corruption chaos may lose messages past the retry cap, so only
//!   the universal properties are asserted: at-most-once dispatch, bounded
//!   windows, retransmittable outstanding entries, and eventual drain of
//!   the outstanding table.

use std::{cell::RefCell, collections::HashSet, rc::Rc};

use droidlink_core::{Link, LinkConfig};
use droidlink_harness::{SimClock, SimStream, check_invariants};
use droidlink_proto::Region;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const COMMANDS: u32 = 10;

struct Net {
    dome: Link<SimStream>,
    body: Link<SimStream>,
    dome_stream: SimStream,
    body_stream: SimStream,
    clock: SimClock,
    delivered: Rc<RefCell<Vec<u32>>>,
}

fn net() -> Net {
    let dome_stream = SimStream::new();
    let body_stream = SimStream::new();
    let clock = SimClock::new(1);

    let mut dome = Link::with_config(
        dome_stream.clone(),
        LinkConfig { region: Region::Dome, ..LinkConfig::default() },
    );
    dome.set_timestamp_provider(clock.provider());

    let mut body = Link::with_config(
        body_stream.clone(),
        LinkConfig { region: Region::Body, ..LinkConfig::default() },
    );
    body.set_timestamp_provider(clock.provider());

    // The LED start field carries the command's sequence number, so the
    // handler log identifies which commands arrived.
    let delivered: Rc<RefCell<Vec<u32>>> = Rc::default();
    let sink = Rc::clone(&delivered);
    body.set_led_handler(move |led| sink.borrow_mut().push(led.start));

    Net { dome, body, dome_stream, body_stream, clock, delivered }
}

fn send_numbered_commands(net: &mut Net) {
    for sequence in 0..COMMANDS {
        net.clock.advance(1);
        let cmd = net.dome.led_command(Region::Body, sequence, sequence + 1, 50);
        net.dome.send(&cmd).expect("send succeeds");
    }
}

fn drain(link: &mut Link<SimStream>, stream: &SimStream) {
    while stream.pending() > 0 {
        link.process_queue();
    }
}

#[test]
fn duplicated_frames_deliver_exactly_once() {
    let mut net = net();
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    send_numbered_commands(&mut net);

    for _round in 0..3 {
        // Dome -> body, each frame possibly duplicated on the wire.
        for payload in net.dome_stream.take_written_frames() {
            let copies = if rng.gen_bool(0.5) { 2 } else { 1 };
            for _ in 0..copies {
                net.body_stream.feed_frame(&payload).expect("frame fits");
            }
        }
        drain(&mut net.body, &net.body_stream);

        // Body -> dome: ACKs duplicated too.
        for payload in net.body_stream.take_written_frames() {
            let copies = if rng.gen_bool(0.5) { 2 } else { 1 };
            for _ in 0..copies {
                net.dome_stream.feed_frame(&payload).expect("frame fits");
            }
        }
        drain(&mut net.dome, &net.dome_stream);

        check_invariants(&net.dome).expect("dome invariants hold");
        check_invariants(&net.body).expect("body invariants hold");
    }

    // Lossless chaos: every command exactly once, in order, and nothing
    // left outstanding.
    let delivered = net.delivered.borrow();
    let expected: Vec<u32> = (0..COMMANDS).collect();
    assert_eq!(*delivered, expected);
    assert_eq!(net.dome.outstanding_len(), 0);
}

#[test]
fn corrupted_wire_never_double_dispatches_and_eventually_drains() {
    let mut net = net();
    let mut rng = ChaCha8Rng::seed_from_u64(1337);

    send_numbered_commands(&mut net);

    for _round in 0..8 {
        // Dome -> body, flipping at most one bit per frame inside the
        // CRC-covered span. CRC-8 catches every single-bit error, so a
        // mangled frame is always rejected and recovered by retry; the
        // START/LEN damage paths have their own deframer tests.
        for payload in net.dome_stream.take_written_frames() {
            let mut wire = Vec::new();
            droidlink_proto::encode_frame(&payload, &mut wire).expect("frame fits");
            if rng.gen_bool(0.3) {
                let index = rng.gen_range(2..wire.len());
                wire[index] ^= 1 << rng.gen_range(0..8);
            }
            net.body_stream.feed(&wire);
        }
        drain(&mut net.body, &net.body_stream);

        // ACK channel stays clean.
        net.dome_stream.feed(&net.body_stream.take_written());
        drain(&mut net.dome, &net.dome_stream);

        check_invariants(&net.dome).expect("dome invariants hold");
        check_invariants(&net.body).expect("body invariants hold");

        // Let the retry sweep fire for whatever got mangled.
        net.clock.advance(1001);
        net.dome.process_queue();
    }

    // Give the sweep enough clean passes to retire anything past the cap.
    for _ in 0..6 {
        net.clock.advance(1001);
        net.dome.process_queue();
        net.dome_stream.take_written();
    }

    // At-most-once dispatch per command, and nothing the dome never sent.
    let delivered = net.delivered.borrow();
    let unique: HashSet<u32> = delivered.iter().copied().collect();
    assert_eq!(unique.len(), delivered.len(), "a command was dispatched twice");
    assert!(delivered.iter().all(|sequence| *sequence < COMMANDS));

    // Every tracked message was either acknowledged or abandoned.
    assert_eq!(net.dome.outstanding_len(), 0);
    check_invariants(&net.dome).expect("dome invariants hold");
    check_invariants(&net.body).expect("body invariants hold");
}
