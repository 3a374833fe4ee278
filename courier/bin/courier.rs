#[cfg(not(any(target_os = "macos", unix)))]
compile_error!("Only macos and unix are currently supported");

use std::path::PathBuf;

use clap::Parser;
use courier::{Controller, controller::listen_for_shutdown};
use courier_common::tracing;

/// Dispatch the configured messages through the primary and fallback backends
#[derive(Parser, Debug)]
#[command(name = "courier")]
#[command(version)]
struct Cli {
    /// Path to the configuration file, overriding `COURIER_CONFIG`
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = courier::find_config_file(cli.config.as_deref())?;
    let config = courier::load_config(&config_path)?;

    let controller = Controller::new(config);
    let signals = controller.signals();
    tokio::spawn(async move {
        if let Err(e) = listen_for_shutdown(signals).await {
            tracing::error!("Unable to listen for shutdown signals: {e}");
        }
    });

    let report = controller.run().await?;
    println!("{report}");

    Ok(())
}
