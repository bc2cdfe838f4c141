// Entry point: reads perception/commands from stdin and streams pupil targets to stdout.
use std::io::BufReader;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gaze_control::cli::Args;
use gaze_control::config::AppConfig;
use gaze_control::runner::{self, RunOptions};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("invalid log filter")?;
    // Rendered targets own stdout; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = AppConfig::load_or_default(&args.config);
    args.apply_overrides(&mut config);

    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_for_ctrlc = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_for_ctrlc.store(true, Ordering::SeqCst);
    })
    .context("error setting Ctrl-C handler")?;

    let options = RunOptions {
        start_dynamic: args.dynamic,
    };
    let summary = runner::run(
        &config,
        options,
        BufReader::new(std::io::stdin()),
        std::io::stdout(),
        stop_flag,
    )
    .context("gaze loop failed")?;

    if let Some(malformed) = summary.malformed_lines.filter(|&n| n > 0) {
        info!("{malformed} input lines were ignored");
    }
    Ok(())
}
