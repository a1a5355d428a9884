mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::estimate::EstimateArgs;
use commands::fees::FeesArgs;
use commands::indicators::IndicatorsArgs;
use commands::interest::InterestArgs;
use commands::repayment::RepaymentArgs;

/// Project investment estimation
#[derive(Parser)]
#[command(
    name = "iest",
    version,
    about = "Project investment estimation with decimal precision",
    long_about = "Builds a staged investment estimate (primary works, ancillary fees, \
                  reserves, construction interest) that converges on a target total, \
                  and computes NPV, IRR and payback for project cash flows."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log filter used when IEST_LOG is unset (e.g. "debug")
    #[arg(long, global = true)]
    log: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Full seven-part investment estimate converged on a target
    Estimate(EstimateArgs),
    /// Interest accrued on a loan drawn during construction
    ConstructionInterest(InterestArgs),
    /// Operating-period repayment schedule
    Repayment(RepaymentArgs),
    /// Ancillary fees (Part B) for given primary works and funding
    AncillaryFees(FeesArgs),
    /// NPV, IRR and static/dynamic payback
    Indicators(IndicatorsArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
    Table,
    Csv,
    Minimal,
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(fallback: Option<&str>) {
    let filter = EnvFilter::try_from_env("IEST_LOG")
        .unwrap_or_else(|_| EnvFilter::new(fallback.unwrap_or("warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log.as_deref());

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Estimate(args) => commands::estimate::run_estimate(args),
        Commands::ConstructionInterest(args) => commands::interest::run_interest(args),
        Commands::Repayment(args) => commands::repayment::run_repayment(args),
        Commands::AncillaryFees(args) => commands::fees::run_fees(args),
        Commands::Indicators(args) => commands::indicators::run_indicators(args),
        Commands::Version => {
            println!("iest {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
