//! fibctl: replays a JSON scenario against a FIB and shows the result.

use anyhow::Context;
use clap::Parser;
use fib_dpo::RecordingQueue;
use log::info;
use std::path::PathBuf;
use vnet_fib::{Fib, FormatLevel, Scenario};

/// Replay FIB operations and show the resulting entries
#[derive(Parser, Debug)]
#[command(name = "fibctl")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scenario file (JSON)
    scenario: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Show every entry in detail
    #[arg(short = 'd', long)]
    detail: bool,

    /// Show memory usage
    #[arg(short = 'm', long)]
    memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    let scenario = Scenario::from_file(&args.scenario)
        .with_context(|| format!("loading {}", args.scenario.display()))?;
    let queue = RecordingQueue::new();
    let mut fib = Fib::new(scenario.config.clone(), Box::new(queue.clone()));

    scenario.apply(&mut fib).context("applying scenario")?;
    let pending = fib.hw_pending();
    let status = fib.flush_hw().await.context("flushing hardware commands")?;
    info!(
        "fibctl: {} hardware commands applied ({})",
        pending, status
    );

    if args.detail {
        for (entry, _) in fib.entries() {
            println!("{}", fib.format(entry, FormatLevel::Detail)?);
        }
    } else {
        print!("{}", fib.show_entries());
    }
    if args.memory {
        print!("{}", fib.show_memory());
    }
    Ok(())
}
