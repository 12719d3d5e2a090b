//! Stack trace rendering
//!
//! Resolves every frame of a [`CapturedTrace`] through a [`SymbolBackend`]
//! and writes one line per frame:
//!
//! ```text
//! {prefix}{indent}{frame:<3} {address} {name}
//! [leak]   1   0x000055d0c0a3f1a2 my_app::cache::insert
//! [leak]   2   0x000055d0c0a3e004 my_app::main
//! [leak]   3   0x00007f1c2a029d90 ???
//! ```
//!
//! Names are looked up again on every dump and never stored on the trace.

use log::Level;
use std::fmt;
use std::io::Write as _;

use crate::capture::capture;
use crate::symbolization::{backend, SymbolBackend};
use crate::trace::CapturedTrace;

/// Shown in place of a name when the backend has none
pub const UNKNOWN_SYMBOL: &str = "???";

/// Frames shown by [`report_backtrace`] and [`log_backtrace`]
pub const REPORT_MAX_FRAMES: usize = 31;

/// Trace renderer bound to one symbol backend
pub struct TraceFormatter<'a> {
    backend: &'a dyn SymbolBackend,
}

impl<'a> TraceFormatter<'a> {
    /// Create a formatter that resolves names through `backend`
    pub fn new(backend: &'a dyn SymbolBackend) -> Self {
        Self { backend }
    }

    /// Write one line per frame of `trace`, each starting with the trace's
    /// prefix and then `indent`
    ///
    /// An empty trace writes nothing.
    ///
    /// # Errors
    /// Only errors returned by `out` itself
    pub fn dump<W: fmt::Write + ?Sized>(
        &self,
        trace: &CapturedTrace,
        out: &mut W,
        indent: &str,
    ) -> fmt::Result {
        if trace.is_empty() {
            return Ok(());
        }

        let names = self.backend.resolve_all(trace.frames());
        let prefix = trace.prefix().unwrap_or("");

        for (i, addr) in trace.iter().enumerate() {
            let name = names.get(i).unwrap_or(UNKNOWN_SYMBOL);
            writeln!(out, "{prefix}{indent}{:<3} {addr} {name}", i + 1)?;
        }

        Ok(())
    }
}

impl TraceFormatter<'static> {
    /// Formatter for the process-wide backend
    #[must_use]
    pub fn active() -> Self {
        Self::new(backend())
    }
}

impl CapturedTrace {
    /// Render this trace with the process-wide backend
    ///
    /// # Errors
    /// Only errors returned by `out` itself
    pub fn dump<W: fmt::Write + ?Sized>(&self, out: &mut W, indent: &str) -> fmt::Result {
        TraceFormatter::active().dump(self, out, indent)
    }
}

impl fmt::Display for CapturedTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.dump(f, "")
    }
}

/// Print the caller's stack to stderr
///
/// For assertion failures and crash paths; write failures are ignored.
#[inline(never)]
pub fn report_backtrace() {
    let trace = capture(REPORT_MAX_FRAMES, 1);
    let mut text = String::new();
    if trace.dump(&mut text, "").is_ok() {
        let _ = std::io::stderr().lock().write_all(text.as_bytes());
    }
}

/// Send the caller's stack through the `log` facade, one record per frame
#[inline(never)]
pub fn log_backtrace(level: Level) {
    if !log::log_enabled!(level) {
        return;
    }

    let trace = capture(REPORT_MAX_FRAMES, 1);
    let mut text = String::new();
    if trace.dump(&mut text, "").is_ok() {
        for line in text.lines() {
            log::log!(level, "{line}");
        }
    }
}
