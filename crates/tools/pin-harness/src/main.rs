//! CLI harness for the transaction PIN gate
//!
//! Drives the gate against an on-disk settings file so the enable, verify,
//! change and disable flows (and startup reconciliation) can be exercised
//! outside the app. The desktop has no secure store, so the PIN falls back
//! to the plain settings file.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::sync::Arc;
use topup_pin::{PinGateConfig, PinStores, TransactionPinGate};
use topup_storage::{FileStore, KeyValueStore};
use tracing::info;

#[derive(Parser)]
#[command(name = "pin-harness")]
#[command(about = "Topup transaction PIN testing harness", long_about = None)]
struct Cli {
    /// Directory holding settings.json (defaults to the platform data dir)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Gate configuration JSON file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the gate state
    Status,

    /// Turn PIN gating on
    Enable {
        /// New PIN
        pin: String,
    },

    /// Turn PIN gating off
    Disable,

    /// Check a PIN
    Verify {
        /// Candidate PIN
        pin: String,
    },

    /// Replace the PIN
    Change {
        /// Current PIN
        old_pin: String,
        /// New PIN
        new_pin: String,
    },

    /// Simulate a sensitive action
    Authorize {
        /// PIN, if the user supplied one
        pin: Option<String>,
    },
}

fn default_data_dir() -> anyhow::Result<PathBuf> {
    ProjectDirs::from("com", "Topup", "topup")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .context("cannot determine a data directory; pass --data-dir")
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<PinGateConfig> {
    match path {
        Some(path) => PinGateConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(PinGateConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    let config = load_config(cli.config.as_ref())?;

    let plain: Arc<dyn KeyValueStore> = Arc::new(FileStore::in_dir(&data_dir));
    let gate = TransactionPinGate::new(PinStores::new(plain, None), config)?;
    info!("Using settings in {}", data_dir.display());

    gate.initialize().await;

    let ok = match cli.command {
        Commands::Status => {
            println!("{}", serde_json::to_string_pretty(&gate.state())?);
            println!("phase: {:?}", gate.state().phase());
            true
        }
        Commands::Enable { pin } => report("enable", gate.enable(&pin).await),
        Commands::Disable => report("disable", gate.disable().await),
        Commands::Verify { pin } => report("verify", gate.verify(&pin).await),
        Commands::Change { old_pin, new_pin } => {
            report("change", gate.change_pin(&old_pin, &new_pin).await)
        }
        Commands::Authorize { pin } => {
            let required = gate.check_transaction_pin_required();
            println!("pin required: {}", required);
            report("authorize", gate.authorize(pin.as_deref()).await)
        }
    };

    if !ok {
        bail!("operation returned false");
    }
    Ok(())
}

fn report(operation: &str, ok: bool) -> bool {
    println!("{}: {}", operation, if ok { "ok" } else { "refused" });
    ok
}
