/// Sui package ABI exporter
/// Pulls the normalized module layout of each package from a full node and writes
/// its functions and events as flat ABI records, one JSON file per package.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use fetcher::{AbiExporter, ExportKind, Overrides, PackageReport, Settings, SuiRpcClient};
use move_abi::Translator;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "sui-abi")]
#[command(about = "Export function and event ABIs of Sui Move packages", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Full node JSON-RPC endpoint (overrides --network)
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Network whose public full node to use (mainnet, testnet, devnet)
    #[arg(long, global = true)]
    network: Option<String>,

    /// Directory the ABI files are written to
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Total attempts per RPC request
    #[arg(long, global = true)]
    max_attempts: Option<u32>,

    /// How type renames are matched (token, substring)
    #[arg(long, global = true)]
    rename_mode: Option<String>,

    /// Path to config file (defaults to ~/.sui-abi.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Fetch all packages in a single JSON-RPC batch request
    #[arg(long, global = true)]
    batch: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Export events and all exposed functions
    Abi {
        /// Package addresses
        #[arg(required = true)]
        packages: Vec<String>,
    },

    /// Export entry functions only
    Functions {
        /// Package addresses
        #[arg(required = true)]
        packages: Vec<String>,
    },

    /// Export events only, with package-qualified names
    Events {
        /// Package addresses
        #[arg(required = true)]
        packages: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sui_abi=info,fetcher=info,move_abi=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .init();

    let cli = Cli::parse();

    let overrides = Overrides {
        network: cli.global.network,
        rpc_url: cli.global.rpc_url,
        max_attempts: cli.global.max_attempts,
        output_dir: cli.global.output_dir,
        rename_mode: cli.global.rename_mode,
    };
    let settings = Settings::load(cli.global.config.as_deref(), &overrides)
        .context("Failed to load configuration")?;

    let renames = settings
        .rename_table()
        .context("Failed to build rename table")?;
    info!(renames = renames.len(), mode = %renames.mode(), "Rename table ready");

    let client = SuiRpcClient::from_settings(&settings).context("Failed to create RPC client")?;
    info!(endpoint = client.endpoint(), "Using Sui full node");

    let exporter = AbiExporter::new(
        client,
        Translator::new(renames),
        settings.output_dir.clone(),
    );

    let (kind, packages) = match cli.command {
        Commands::Abi { packages } => (ExportKind::Full, packages),
        Commands::Functions { packages } => (ExportKind::EntryFunctions, packages),
        Commands::Events { packages } => (ExportKind::Events, packages),
    };

    let reports = exporter
        .export_packages(&packages, kind, cli.global.batch)
        .await;
    print_summary(kind, &reports);

    Ok(())
}

fn print_summary(kind: ExportKind, reports: &[PackageReport]) {
    println!("\n{}", format!("ABI export ({})", kind).bold().cyan());
    println!("{}", "=".repeat(80).cyan());

    for report in reports {
        match report.summary {
            Some(summary) if summary.total() > 0 => {
                println!(
                    "{} {}  {} event(s), {} function(s) -> {}",
                    "●".green(),
                    report.package.bold(),
                    summary.events,
                    summary.functions,
                    report.path.display().to_string().bright_black()
                );
                if report.written < summary.total() {
                    println!(
                        "  {}",
                        format!("{} entr(y/ies) could not be written", summary.total() - report.written)
                            .yellow()
                    );
                }
            }
            Some(_) => {
                println!("{} {}  {}", "○".yellow(), report.package.bold(), "nothing to export".yellow());
            }
            None => {
                println!("{} {}  {}", "✗".red(), report.package.bold(), "skipped (invalid RPC response)".red());
            }
        }
    }

    println!("{}", "=".repeat(80).cyan());
    let ok = reports.iter().filter(|r| r.is_ok()).count();
    println!("Processed {}/{} package(s)\n", ok, reports.len());
}
