//! CLI argument definitions

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "framedump",
    about = "Capture this process's call stack and print it with symbol names",
    after_help = "\
EXAMPLES:
    framedump                                Dump the stack of a shallow call chain
    framedump --depth 20 --max-frames 8      Show the 8 innermost of 20+ frames
    framedump --prefix '[leak] ' --indent '  '
    RUST_LOG=debug framedump --backend       Show which symbol backend is active"
)]
pub struct Args {
    /// Maximum number of frames to capture (coerced to at least 1)
    #[arg(short, long, default_value = "32")]
    pub max_frames: usize,

    /// Frames to hide at the caller end
    #[arg(short, long, default_value = "0")]
    pub skip: usize,

    /// Extra nested calls made before capturing
    #[arg(short, long, default_value = "4")]
    pub depth: usize,

    /// Text written in front of every line
    #[arg(long)]
    pub prefix: Option<String>,

    /// Text written after the prefix on every line
    #[arg(long, default_value = "")]
    pub indent: String,

    /// Print the active symbol backend before the trace
    #[arg(long)]
    pub backend: bool,

    /// Log filter used when RUST_LOG is unset (e.g. "debug")
    #[arg(long, value_name = "FILTER")]
    pub log: Option<String>,
}
