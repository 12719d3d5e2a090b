//! Domain model for framedump
//!
//! Core value types and errors shared by capture, symbolization and
//! formatting:
//! - [`FrameAddress`] newtype for captured instruction addresses
//! - [`DemangleEntry`] pairing a raw linkage name with its readable form
//! - [`SymbolizationError`] for backend initialization failures

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{DemangleEntry, FrameAddress};

pub use errors::SymbolizationError;
