mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::models::ModelsArgs;
use commands::monte_carlo::MonteCarloArgs;
use commands::sensitivity::SensitivityArgs;

/// Monte Carlo and sensitivity analysis for investment scenarios
#[derive(Parser)]
#[command(
    name = "scen",
    version,
    about = "Monte Carlo and sensitivity analysis for investment scenarios",
    long_about = "A CLI for stress-testing investment models. Samples uncertain inputs from \
                  normal, uniform or triangular distributions, runs the model thousands of \
                  times and summarises the outcome distribution, or sweeps each input \
                  one at a time to rank sensitivities."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Engine configuration file (JSON or YAML)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Log engine decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a Monte Carlo simulation of a built-in model
    MonteCarlo(MonteCarloArgs),
    /// One-at-a-time sensitivity sweep of a built-in model
    Sensitivity(SensitivityArgs),
    /// List built-in models and their parameters
    Models(ModelsArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "scen=debug,scenario_engine_core=debug"
    } else {
        "scen=info,scenario_engine_core=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match input::file::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    };

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::MonteCarlo(args) => commands::monte_carlo::run_monte_carlo(args, &config),
        Commands::Sensitivity(args) => commands::sensitivity::run_sensitivity(args, &config),
        Commands::Models(args) => commands::models::run_models(args),
        Commands::Version => {
            println!("scen {}", env!("CARGO_PKG_VERSION"));
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
