use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use sable::{analyze, dependencies, AnalysisArgs};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sable")]
#[command(about = "Incremental static analysis for Dart", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report errors, warnings and hints
    Analyze {
        #[command(flatten)]
        args: AnalysisArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Show imports, exports, parts and library cycles
    Deps {
        #[command(flatten)]
        args: AnalysisArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.debug {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.debug)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Analyze { args, format } => {
            let report = analyze(&args).await?;
            match format {
                Format::Text => print!("{}", report.render_text()),
                Format::Json => println!("{}", report.render_json()?),
            }
            if report.has_errors() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Deps { args, format } => {
            let report = dependencies(&args).await?;
            match format {
                Format::Text => print!("{}", report.render_text()),
                Format::Json => println!("{}", report.render_json()?),
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
