//! # Stack Capture
//!
//! Walks the current thread's stack with the platform's raw frame walker and
//! records return addresses into a [`CapturedTrace`]. No symbols are
//! resolved here; that happens later, when the trace is dumped.
//!
//! ## Hiding our own frames
//!
//! The walker reports its own internal frames first, then [`capture`], then
//! the caller. How many internal frames there are depends on the platform
//! and the optimization level, so the walk looks for the frame whose
//! enclosing symbol is [`capture`] itself and starts counting after it:
//!
//! ```text
//! walker internals ...   hidden
//! capture               hidden (anchor)
//! caller                skipped while frames_to_skip > 0, else frame 0
//! caller's caller       ...
//! ```
//!
//! Some walkers only know raw instruction pointers and cannot name the
//! enclosing symbol. When the anchor is never seen, the walk is redone
//! hiding a fixed [`INTERNAL_FRAMES`] frames instead.
//!
//! ## Resource use
//!
//! The trace storage is the only allocation. On platforms without a frame
//! walker the result is simply empty.

use crate::domain::FrameAddress;
use crate::trace::{CapturedTrace, TraceWriter};

/// Frames hidden when the capture routine cannot be located by address:
/// the routine itself and the walker trampoline
pub const INTERNAL_FRAMES: usize = 2;

/// Give up looking for the anchor after this many walker frames
const MAX_ANCHOR_SEARCH: usize = 32;

/// Capture up to `max_frames` frames of the caller's stack
///
/// `max_frames` is coerced to at least 1. `frames_to_skip` hides that many
/// frames at the caller end, e.g. a logging helper's own frame. Skipping
/// more frames than the stack holds yields an empty trace.
#[inline(never)]
#[must_use]
pub fn capture(max_frames: usize, frames_to_skip: usize) -> CapturedTrace {
    let max_frames = max_frames.max(1);
    let requested = max_frames.saturating_add(frames_to_skip).saturating_add(INTERNAL_FRAMES);
    let anchor = capture as usize;

    let mut writer = TraceWriter::with_capacity(max_frames);
    let mut walk = FrameWalk::anchored(anchor, requested, frames_to_skip);
    walk_frames(|ip, symbol| walk.visit(&mut writer, ip, symbol));

    if !walk.found_anchor() {
        log::trace!("capture: anchor frame not reported, hiding {INTERNAL_FRAMES} frames");
        writer.reset();
        let mut walk = FrameWalk::fixed(requested, frames_to_skip);
        walk_frames(|ip, symbol| walk.visit(&mut writer, ip, symbol));
    }

    let trace = writer.finish();
    debug_assert!(trace.len() <= max_frames);
    trace
}

/// Per-walk bookkeeping: how many frames are still hidden, skipped, or
/// wanted from the walker
struct FrameWalk {
    anchor: Option<usize>,
    found_anchor: bool,
    hidden: usize,
    remaining_skip: usize,
    remaining: usize,
    internal_seen: usize,
}

impl FrameWalk {
    fn anchored(anchor: usize, requested: usize, frames_to_skip: usize) -> Self {
        Self {
            anchor: Some(anchor),
            found_anchor: false,
            hidden: 0,
            remaining_skip: frames_to_skip,
            remaining: requested,
            internal_seen: 0,
        }
    }

    fn fixed(requested: usize, frames_to_skip: usize) -> Self {
        Self {
            anchor: None,
            found_anchor: false,
            hidden: INTERNAL_FRAMES,
            remaining_skip: frames_to_skip,
            remaining: requested,
            internal_seen: 0,
        }
    }

    fn found_anchor(&self) -> bool {
        self.found_anchor
    }

    /// Handle one walker frame; returns whether the walk should continue
    fn visit(&mut self, writer: &mut TraceWriter, ip: usize, symbol: usize) -> bool {
        if let Some(anchor) = self.anchor {
            if !self.found_anchor {
                self.internal_seen += 1;
                if symbol == anchor {
                    // Count the walker's frames as the two fixed internal
                    // ones, whatever their real number.
                    self.found_anchor = true;
                    self.remaining = self.remaining.saturating_sub(INTERNAL_FRAMES);
                    return self.remaining > 0;
                }
                return self.internal_seen < MAX_ANCHOR_SEARCH;
            }
        } else if self.hidden > 0 {
            self.hidden -= 1;
            self.remaining = self.remaining.saturating_sub(1);
            return self.remaining > 0;
        }

        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;

        if self.remaining_skip > 0 {
            self.remaining_skip -= 1;
            return self.remaining > 0;
        }

        if ip == 0 || writer.is_full() {
            return false;
        }
        writer.push(FrameAddress(ip)) && self.remaining > 0
    }
}

/// Feed `(ip, enclosing symbol address)` for each frame to `visit` until it
/// returns false
#[inline(never)]
#[allow(unsafe_code)]
fn walk_frames<F: FnMut(usize, usize) -> bool>(mut visit: F) {
    let mut callback = |frame: &backtrace::Frame| {
        let ip = frame.ip() as usize;
        let symbol = frame.symbol_address() as usize;
        visit(ip, symbol)
    };

    #[cfg(windows)]
    backtrace::trace(&mut callback);

    // SAFETY: the unwinder used on non-Windows targets is thread-safe, and
    // the callback neither panics across the walker nor re-enters it.
    #[cfg(not(windows))]
    unsafe {
        backtrace::trace_unsynchronized(&mut callback);
    }
}
