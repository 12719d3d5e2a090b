//! # framedump - In-Process Stack Capture and Symbolication
//!
//! framedump records the current thread's call stack as a bounded list of
//! instruction addresses and later renders those addresses as readable
//! lines, resolving each one to a function name with whatever symbol
//! facility the platform offers. It is meant for assertion failures, crash
//! logging and leak diagnostics, so it keeps working without debug info and
//! never fails on its own.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐  capture()   ┌──────────────┐   dump()   ┌──────────────┐
//! │ Frame walker │────────────▶│CapturedTrace │──────────▶│TraceFormatter│──▶ lines
//! │ (backtrace)  │             │ (addresses)  │           └──────┬───────┘
//! └──────────────┘             └──────────────┘                  │ resolve_all()
//!                                                                ▼
//!                                       ┌────────────────────────────────────┐
//!                                       │  SymbolBackend (one per target)    │
//!                                       │  debuginfo │ dladdr │ dbghelp      │
//!                                       └─────────────────┬──────────────────┘
//!                                                         │ linkage names
//!                                                         ▼
//!                                                  ┌──────────────┐
//!                                                  │  Demangler   │
//!                                                  └──────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`capture`]: walk the stack, hide our own frames, apply skip/limit
//! - [`trace`]: fixed-capacity storage for captured addresses
//! - [`symbolization`]: address to name backends, selected at build time
//!   - `symbolizer` + `memory_maps`: DWARF of the running executable (Linux)
//!   - `dladdr`: dynamic loader lookup (other Unix)
//!   - `dbghelp`: Windows debug helper
//! - [`demangle`]: Rust and Itanium C++ demangling
//! - [`format`]: line rendering, stderr and `log` reporting helpers
//! - [`domain`]: address newtype, demangled-name pair, errors
//! - [`cli`]: arguments of the `framedump` demo binary
//!
//! ## Typical Usage
//!
//! ```rust,no_run
//! let trace = framedump::capture(32, 0).with_prefix("[leak] ");
//! let mut out = String::new();
//! trace.dump(&mut out, "  ").ok();
//! eprint!("{out}");
//! ```
//!
//! ## Degraded conditions
//!
//! - No frame walker on this target: the trace is empty, and dumping it
//!   prints nothing.
//! - No symbol for an address: the line shows `???`.
//! - The backend cannot initialize: logged once, then every frame shows `???`.

pub mod capture;
pub mod cli;
pub mod demangle;
pub mod domain;
pub mod format;
pub mod symbolization;
pub mod trace;

pub use capture::capture;
pub use domain::{DemangleEntry, FrameAddress, SymbolizationError};
pub use format::{log_backtrace, report_backtrace, TraceFormatter, UNKNOWN_SYMBOL};
pub use symbolization::{backend, ResolvedNames, SymbolBackend};
pub use trace::CapturedTrace;
