//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `readiness_check` library that handles:
//! - Command-line argument parsing
//! - Environment variable loading (.env file)
//! - Logger initialization
//! - User-facing output formatting
//!
//! All diagnostics are implemented in the library crate.

use anyhow::{Context, Result};
use clap::Parser;
use std::process;

use readiness_check::initialization::init_logger_with;
use readiness_check::speed::format_speed;
use readiness_check::{
    reset_session, run_network_diagnostics, run_speed_test, submit_results, Command, Opt,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (if it exists)
    // This allows setting READINESS_API_KEY in .env without exporting it manually
    // Try loading from current directory first, then from the executable's directory
    if dotenvy::dotenv().is_err() {
        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                let env_path = exe_dir.join(".env");
                if env_path.exists() {
                    let _ = dotenvy::from_path(&env_path);
                }
            }
        }
    }

    let opt = Opt::parse();
    let config = opt.to_config();

    init_logger_with(config.log_level.clone().into(), config.log_format.clone())
        .context("Failed to initialize logger")?;

    let outcome = match opt.command {
        Command::Network { .. } => run_network_diagnostics(config).await.map(|report| {
            println!(
                "✅ {} of {} region{} reachable over UDP in {:.1}s - results saved in {}",
                report.reachable_regions(),
                report.connectivity.len(),
                if report.connectivity.len() == 1 { "" } else { "s" },
                report.elapsed_seconds,
                report.session_path.display()
            );
        }),
        Command::Speed { .. } => run_speed_test(config).await.map(|report| {
            println!(
                "✅ Download {} Mb/s, upload {} Mb/s, latency {} ms",
                format_speed(report.download_mbps),
                format_speed(report.upload_mbps),
                report.latency_ms
            );
        }),
        Command::Submit => submit_results(config).await.map(|fields| {
            println!("✅ Submitted {} result fields", fields);
        }),
        Command::Reset => reset_session(config).await.map(|()| {
            println!("Session cleared");
        }),
    };

    if let Err(e) = outcome {
        eprintln!("readiness_check error: {:#}", e);
        process::exit(1);
    }
    Ok(())
}
