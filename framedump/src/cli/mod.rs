//! Command-line interface of the `framedump` binary

mod args;

pub use args::Args;
