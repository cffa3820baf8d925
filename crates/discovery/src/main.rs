//! PaperScout scan CLI
//!
//! Runs one scan (or reads the catalog) against the configured store and
//! prints the result as JSON on stdout. Logs go to stderr.

use anyhow::Context;
use clap::{Parser, Subcommand};
use paperscout_common::store::create_store;
use paperscout_common::telemetry::init_cli_tracing;
use paperscout_common::{AppConfig, DateRange, VERSION};
use paperscout_discovery::{get_discoveries, PrimaryScanRequest, Scanner};
use serde::Serialize;
use tracing::info;

#[derive(Parser)]
#[command(name = "paperscout-scan")]
#[command(about = "Scan paper providers for new discoveries", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML config file; defaults to the config/ directory layering
    #[arg(long, env = "PAPERSCOUT_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Keyword scan of arXiv over a submission window
    Primary {
        /// Window start, YYYYMMDD (requires --to)
        #[arg(long, requires = "to")]
        from: Option<String>,

        /// Window end, YYYYMMDD (requires --from)
        #[arg(long, requires = "from")]
        to: Option<String>,

        /// Results requested per keyword
        #[arg(long)]
        max_results: Option<u32>,
    },
    /// Google Scholar scan through the external script
    Secondary {
        /// Earliest publication year
        #[arg(long)]
        year_from: Option<i32>,
    },
    /// Print stored discoveries and scan timestamps
    List,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::load(),
    }
    .context("Failed to load configuration")?;

    init_cli_tracing(&config.observability);
    info!("paperscout-scan v{}", VERSION);

    let store = create_store(&config.store).await?;

    match cli.command {
        Commands::Primary { from, to, max_results } => {
            let date_range = match (from, to) {
                (Some(from), Some(to)) => Some(DateRange::parse(&from, &to)?),
                _ => None,
            };
            let scanner = Scanner::from_config(&config, store)?;
            let summary = scanner
                .scan_primary(PrimaryScanRequest {
                    date_range,
                    max_results_per_keyword: max_results,
                })
                .await?;
            print_json(&summary)?;
        }
        Commands::Secondary { year_from } => {
            let scanner = Scanner::from_config(&config, store)?;
            let summary = scanner.scan_secondary(year_from).await?;
            print_json(&summary)?;
        }
        Commands::List => {
            let view = get_discoveries(store.as_ref()).await?;
            print_json(&view)?;
        }
    }

    Ok(())
}
