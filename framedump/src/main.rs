//! # framedump - Demo Entry Point
//!
//! Recurses a few levels, captures the stack, and prints it the way a crash
//! or leak report would. Handy for checking that a build has usable symbols.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::io::Write;

use framedump::cli::Args;
use framedump::{capture, symbolization, CapturedTrace};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let filter = args.log.clone().unwrap_or_else(|| "warn".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    std::process::exit(match run(&args) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    });
}

fn run(args: &Args) -> Result<()> {
    if args.backend {
        println!("backend: {}", symbolization::backend_name());
    }

    let mut trace = descend(args.depth, args);
    if let Some(ref prefix) = args.prefix {
        trace.set_prefix(prefix.clone());
    }
    info!("Captured {} of at most {} frames", trace.len(), trace.capacity());

    let mut text = String::new();
    trace.dump(&mut text, &args.indent).context("Failed to format stack trace")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    out.write_all(text.as_bytes()).context("Failed to write stack trace")?;
    out.flush().context("Failed to flush stdout")?;
    Ok(())
}

/// Nest `depth` calls, then capture from the innermost one
#[inline(never)]
fn descend(depth: usize, args: &Args) -> CapturedTrace {
    let trace = if depth == 0 {
        capture(args.max_frames, args.skip)
    } else {
        descend(depth - 1, args)
    };
    // Keeps the recursive call from becoming a tail call
    std::hint::black_box(&trace);
    trace
}
