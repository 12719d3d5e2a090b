//! Structured error types for framedump
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! None of these reach callers of `capture` or `dump`: a backend that fails
//! to initialize logs the error once and then resolves nothing.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SymbolizationError {
    #[error("Failed to locate the running executable: {0}")]
    ExecutableNotFound(#[source] std::io::Error),

    #[error("Failed to read {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse object file {path}: {reason}")]
    ParseFailed { path: String, reason: String },

    #[error("Failed to load DWARF debug information: {0}")]
    DwarfLoadFailed(String),

    #[error("Executable {0} is not mapped into this process")]
    ExecutableNotMapped(String),

    #[error("Failed to read /proc/self/maps: {0}")]
    MemoryMapsUnavailable(#[source] std::io::Error),

    #[error("Debug helper initialization failed: {0}")]
    DebugHelperUnavailable(String),
}
