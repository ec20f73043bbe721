mod diagnostics;

use std::path::PathBuf;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;

use ocd_flash::logging::setup_logging;
use ocd_flash::{
    resolve_artifact, Configs, FlashPlan, Orchestrator, SystemRunner, ToolchainPrefix,
};

use crate::diagnostics::{exit_code, render_diagnostics};

/// Converts a firmware ELF to a flat binary and flashes it with OpenOCD.
#[derive(Debug, clap::Parser)]
#[clap(
    name = "ocd-flash",
    version = env!("OCD_FLASH_VERSION"),
    long_version = env!("OCD_FLASH_LONG_VERSION")
)]
struct Cli {
    /// The ELF file to flash.
    ///
    /// Defaults to `flashing.default_artifact` from the configuration, which is the
    /// power_dist firmware build output unless changed.
    #[arg(value_name = "artifact-path")]
    artifact: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    if let Err(error) = main_try(cli) {
        render_diagnostics(&error);
        process::exit(exit_code(&error));
    }
}

fn main_try(cli: Cli) -> anyhow::Result<()> {
    let config = Configs::from_default_locations()?.config()?;

    let _log_guard = setup_logging(config.general.log_file.as_deref(), config.general.log_level)
        .context("Failed to set up logging.")?;

    // Tools started from a terminal get the same SIGINT as we do. Keep running until
    // they exit so the workspace can be removed. A second signal terminates at once.
    let interrupted = Arc::new(AtomicBool::new(false));
    for signal in signal_hook::consts::TERM_SIGNALS {
        signal_hook::flag::register_conditional_default(*signal, interrupted.clone())
            .context("Failed to install the signal handler.")?;
        signal_hook::flag::register(*signal, interrupted.clone())
            .context("Failed to install the signal handler.")?;
    }

    let prefix = ToolchainPrefix::resolve(config.toolchain.prefix.as_deref());
    tracing::debug!("Using toolchain prefix {:?}", prefix.as_str());

    let plan = FlashPlan::new(&config, &prefix);
    let artifact = resolve_artifact(cli.artifact, &config);

    println!("    {} {}", "Flashing".green().bold(), artifact.display());
    let instant = Instant::now();

    Orchestrator::new(plan, SystemRunner)
        .with_interrupt_flag(interrupted)
        .flash(&artifact)?;

    let elapsed = instant.elapsed();
    println!(
        "    {} in {}s",
        "Finished".green().bold(),
        elapsed.as_millis() as f32 / 1000.0
    );

    Ok(())
}
