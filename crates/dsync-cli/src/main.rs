use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

mod commands;
mod report;
mod source_csv;

#[derive(Parser)]
#[command(name = "dsync")]
#[command(about = "Keep a remote DID registry in step with a source list", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

/// Registry connection flags shared by every networked command.
#[derive(Args, Debug, Clone, Default)]
pub struct RegistryArgs {
    /// Layered config paths in merge order (base -> env -> local)
    #[arg(long = "config")]
    pub config_paths: Vec<String>,

    /// Overrides registry.account_id
    #[arg(long)]
    pub account_id: Option<String>,

    /// Overrides registry.org_id
    #[arg(long)]
    pub org_id: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Diff the source list against the registry; with --apply, fix the registry
    Sync {
        #[command(flatten)]
        registry: RegistryArgs,

        /// Source CSV. Defaults to the newest CSV in data/input, then the sample file.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Mutate the registry after the dry run (still requires --yes)
        #[arg(long, default_value_t = false)]
        apply: bool,

        /// Confirm the apply. Without it an --apply run is refused.
        #[arg(long, default_value_t = false)]
        yes: bool,

        /// Refuse the apply if more than this many numbers would be added
        #[arg(long)]
        max_add: Option<usize>,

        /// Refuse the apply if more than this many numbers would be deleted
        #[arg(long)]
        max_delete: Option<usize>,

        /// Trust the list endpoint; skip per-number lookups
        #[arg(long, default_value_t = false)]
        skip_verify: bool,

        /// Directory for diff.<stage>.json reports (overrides report.json_dir)
        #[arg(long)]
        json_dir: Option<PathBuf>,

        /// Do not write JSON reports
        #[arg(long, default_value_t = false)]
        no_json: bool,
    },

    /// Look numbers up one by one; exit code 2 if any is not confirmed present
    Verify {
        #[command(flatten)]
        registry: RegistryArgs,

        /// Comma-separated numbers, any formatting
        #[arg(long, value_delimiter = ',', conflicts_with = "csv")]
        numbers: Vec<String>,

        /// CSV with a number column
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Write the registry's current numbers to CSV
    Export {
        #[command(flatten)]
        registry: RegistryArgs,

        /// Output path. Defaults to reports/csv/dids_<account>_<org>_<unix_ms>.csv
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Offline diff of two CSV files (source vs. an export)
    CompareCsv {
        #[arg(long)]
        src: PathBuf,

        #[arg(long)]
        dst: PathBuf,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Local overrides first; neither file is required.
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Sync {
            registry,
            csv,
            apply,
            yes,
            max_add,
            max_delete,
            skip_verify,
            json_dir,
            no_json,
        } => {
            commands::sync::run_sync(commands::sync::SyncArgs {
                registry,
                csv,
                apply,
                yes,
                max_add,
                max_delete,
                skip_verify,
                json_dir,
                no_json,
            })
            .await?;
        }

        Commands::Verify {
            registry,
            numbers,
            csv,
        } => {
            let all_present = commands::verify::run_verify(registry, numbers, csv).await?;
            if !all_present {
                std::process::exit(2);
            }
        }

        Commands::Export { registry, out } => {
            commands::export::run_export(registry, out).await?;
        }

        Commands::CompareCsv { src, dst } => {
            commands::compare::run_compare(&src, &dst)?;
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = dsync_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }
    }

    Ok(())
}

/// Logs go to stderr; stdout carries reports only.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
