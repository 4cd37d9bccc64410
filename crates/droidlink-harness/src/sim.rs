//! Scripted byte stream and clock.
//!
//! [`SimStream`] is a shared-handle, non-blocking byte stream: tests feed
//! inbound bytes through one handle while the link under test drains and
//! writes through a clone of it. Written bytes are captured verbatim and
//! can be split back into frames or decoded commands.
//!
//! [`SimClock`] is a shared millisecond counter; cloned handles observe
//! every `set`/`advance`, so one clock can drive several links and the
//! test script at once.

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
};

use droidlink_core::ByteStream;
use droidlink_proto::{Command, Deframer, FrameError, encode_frame};

#[derive(Default)]
struct Inner {
    rx: VecDeque<u8>,
    written: Vec<u8>,
    fail_writes: bool,
}

/// Scripted non-blocking byte stream.
///
/// Clones share state: hand one clone to the link and keep another for the
/// test script.
#[derive(Clone, Default)]
pub struct SimStream {
    inner: Rc<RefCell<Inner>>,
}

impl SimStream {
    /// Create an empty stream.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw bytes for the link to read.
    pub fn feed(&self, bytes: &[u8]) {
        self.inner.borrow_mut().rx.extend(bytes);
    }

    /// Frame a payload and queue the whole wire frame for the link.
    ///
    /// # Errors
    ///
    /// - [`FrameError::LengthTooLarge`] when the payload exceeds the frame
    ///   capacity
    pub fn feed_frame(&self, payload: &[u8]) -> Result<(), FrameError> {
        let mut wire = Vec::new();
        encode_frame(payload, &mut wire)?;
        self.feed(&wire);
        Ok(())
    }

    /// Make every subsequent write fail (return 0) until cleared.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.borrow_mut().fail_writes = fail;
    }

    /// Bytes queued for the link but not yet read.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.borrow().rx.len()
    }

    /// Drain and return everything the link has written. Draining and
    /// discarding is fine when a test only wants a quiet wire.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.inner.borrow_mut().written)
    }

    /// Bytes written by the link so far, without draining.
    #[must_use]
    pub fn written_len(&self) -> usize {
        self.inner.borrow().written.len()
    }

    /// Drain written bytes and split them back into frame payloads.
    /// Malformed stretches (there should be none for an engine-written
    /// stream) are discarded by the frame parser.
    pub fn take_written_frames(&self) -> Vec<Vec<u8>> {
        let bytes = self.take_written();
        let mut deframer = Deframer::new();
        let mut payloads = Vec::new();
        for byte in bytes {
            if let Ok(Some(payload)) = deframer.push(byte) {
                payloads.push(payload.to_vec());
            }
        }
        payloads
    }

    /// Drain written bytes and decode every framed payload that parses as
    /// a command.
    pub fn take_written_commands(&self) -> Vec<Command> {
        self.take_written_frames()
            .iter()
            .filter_map(|payload| Command::decode(payload).ok())
            .collect()
    }
}

impl ByteStream for SimStream {
    fn available(&self) -> usize {
        self.inner.borrow().rx.len()
    }

    fn read(&mut self) -> Option<u8> {
        self.inner.borrow_mut().rx.pop_front()
    }

    fn write(&mut self, bytes: &[u8]) -> usize {
        let mut inner = self.inner.borrow_mut();
        if inner.fail_writes {
            return 0;
        }
        inner.written.extend_from_slice(bytes);
        bytes.len()
    }
}

/// Shared settable millisecond clock.
#[derive(Clone, Default)]
pub struct SimClock {
    now_ms: Rc<Cell<u64>>,
}

impl SimClock {
    /// Create a clock starting at `start_ms`.
    #[must_use]
    pub fn new(start_ms: u64) -> Self {
        let clock = Self::default();
        clock.set(start_ms);
        clock
    }

    /// Current time in milliseconds.
    #[must_use]
    pub fn now(&self) -> u64 {
        self.now_ms.get()
    }

    /// Jump to an absolute time. Never move a clock backwards mid-test;
    /// links require non-decreasing timestamps.
    pub fn set(&self, ms: u64) {
        self.now_ms.set(ms);
    }

    /// Advance by a delta.
    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.set(self.now_ms.get() + delta_ms);
    }

    /// A timestamp provider backed by this clock, for
    /// `Link::set_timestamp_provider`.
    pub fn provider(&self) -> impl FnMut() -> u64 + 'static {
        let clock = self.clone();
        move || clock.now()
    }
}
