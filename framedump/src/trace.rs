//! Fixed-capacity storage for captured frame addresses
//!
//! A [`CapturedTrace`] is allocated once, sized for the requested frame
//! count, and filled exactly once by [`TraceWriter`] during capture. After
//! that its length never changes; only the display prefix may be set.

use std::borrow::Cow;
use std::fmt;

use crate::domain::FrameAddress;

/// Captured call stack, innermost call first
#[derive(Clone, PartialEq, Eq)]
pub struct CapturedTrace {
    slots: Box<[FrameAddress]>,
    len: usize,
    prefix: Option<Cow<'static, str>>,
}

impl CapturedTrace {
    /// Build a trace from addresses obtained elsewhere, e.g. a fault context
    #[must_use]
    pub fn from_addresses(addresses: &[usize]) -> Self {
        let mut writer = TraceWriter::with_capacity(addresses.len());
        for &addr in addresses {
            writer.push(FrameAddress(addr));
        }
        writer.finish()
    }

    /// Maximum number of frames this trace can hold (always >= 1)
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of captured frames
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Captured frames; index 0 is the most recent call
    #[must_use]
    pub fn frames(&self) -> &[FrameAddress] {
        &self.slots[..self.len]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FrameAddress> {
        self.frames().iter()
    }

    /// Text written in front of every dumped line
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn set_prefix(&mut self, prefix: impl Into<Cow<'static, str>>) {
        self.prefix = Some(prefix.into());
    }

    pub fn clear_prefix(&mut self) {
        self.prefix = None;
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<Cow<'static, str>>) -> Self {
        self.set_prefix(prefix);
        self
    }
}

impl<'a> IntoIterator for &'a CapturedTrace {
    type Item = &'a FrameAddress;
    type IntoIter = std::slice::Iter<'a, FrameAddress>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for CapturedTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedTrace")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .field("prefix", &self.prefix)
            .field("frames", &self.frames())
            .finish()
    }
}

/// One-shot filler for a [`CapturedTrace`]
///
/// Holds the only allocation made during capture. Frames pushed past
/// capacity are dropped.
pub(crate) struct TraceWriter {
    slots: Box<[FrameAddress]>,
    len: usize,
}

impl TraceWriter {
    /// `capacity` is coerced to at least 1
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self { slots: vec![FrameAddress::NULL; capacity.max(1)].into_boxed_slice(), len: 0 }
    }

    pub(crate) fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    /// Append a frame; returns false once the trace is full
    pub(crate) fn push(&mut self, addr: FrameAddress) -> bool {
        debug_assert!(!self.is_full(), "trace writer overflow: capacity {}", self.slots.len());
        if self.is_full() {
            return false;
        }
        self.slots[self.len] = addr;
        self.len += 1;
        !self.is_full()
    }

    /// Drop everything written so far, keeping the allocation
    pub(crate) fn reset(&mut self) {
        self.slots.fill(FrameAddress::NULL);
        self.len = 0;
    }

    pub(crate) fn finish(self) -> CapturedTrace {
        CapturedTrace { slots: self.slots, len: self.len, prefix: None }
    }
}
