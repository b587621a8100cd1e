mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "qe")]
#[command(about = "Automated intraday equities trading engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a layered config hash and print the canonical JSON.
    ConfigHash {
        /// Paths in merge order (base -> env -> overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Audit log inspection.
    Audit {
        #[command(subcommand)]
        cmd: AuditCmd,
    },

    /// Run lifecycle commands.
    Run {
        #[command(subcommand)]
        cmd: RunCmd,
    },
}

#[derive(Subcommand)]
enum AuditCmd {
    /// Verify the hash chain of a jsonl audit log.
    Verify {
        #[arg(long)]
        path: String,
    },
}

#[derive(Subcommand)]
enum RunCmd {
    /// Run exactly one trading session against a fresh paper broker and
    /// print the resulting end-of-day report as JSON.
    Once {
        /// Layered config paths in merge order. Falls back to a small
        /// built-in watchlist when omitted.
        #[arg(long = "config")]
        config: Option<String>,

        /// Directory for position snapshots, trade log, and audit log.
        #[arg(long = "data-dir", default_value = "./data")]
        data_dir: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = qe_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Audit { cmd } => match cmd {
            AuditCmd::Verify { path } => match qe_audit::verify_hash_chain(&path)? {
                qe_audit::VerifyResult::Valid { lines } => {
                    println!("ok=true lines={lines}");
                }
                qe_audit::VerifyResult::Broken { line, reason } => {
                    println!("ok=false line={line} reason={reason}");
                    anyhow::bail!("audit log failed hash-chain verification at line {line}: {reason}");
                }
            },
        },

        Commands::Run { cmd } => match cmd {
            RunCmd::Once { config, data_dir } => {
                let data_dir = std::path::PathBuf::from(data_dir);
                let inputs = commands::run::run_once(config, &data_dir).await?;
                let report = qe_reporting::build_eod_report(&inputs.session_date, &inputs.trades);
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        },
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
