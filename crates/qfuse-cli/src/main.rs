//! qfuse Command-Line Interface
//!
//! Loads a circuit description, fuses it, generates kernels and runs them on
//! the reference interpreter.
//!
//! ```text
//! qfuse compile -i circuits/ghz.yaml --max-fused-arity 4
//! qfuse run -i circuits/variational.json -p theta=0.3 -p phi=1.2 --shots 1000
//! ```

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::{Args, Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{compile, run, version};

/// qfuse - gate fusion and kernel generation for statevector simulation
#[derive(Parser)]
#[command(name = "qfuse")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Fusion options shared by all commands; flags override the config file.
#[derive(Args, Debug, Clone)]
pub struct FusionArgs {
    /// Fusion config file (YAML or JSON)
    #[arg(short, long)]
    config: Option<String>,

    /// Maximum number of qubits of a fused gate
    #[arg(long)]
    max_fused_arity: Option<usize>,

    /// Largest nonzero-entry count a fused gate may have
    #[arg(long)]
    operation_count_ceiling: Option<usize>,

    /// Entries at or below this magnitude are ignored when estimating cost
    #[arg(long)]
    zero_skip_threshold: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fuse a circuit and report the generated kernels
    Compile {
        /// Input circuit (JSON or YAML)
        #[arg(short, long)]
        input: String,

        #[command(flatten)]
        fusion: FusionArgs,

        /// Write the kernel report as JSON to this file
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Compile a circuit and run it on the reference interpreter
    Run {
        /// Input circuit (JSON or YAML)
        #[arg(short, long)]
        input: String,

        #[command(flatten)]
        fusion: FusionArgs,

        /// Parameter binding NAME=VALUE (repeatable)
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Number of measurement shots
        #[arg(short, long, default_value = "1024")]
        shots: usize,

        /// Also simulate the unfused circuit and compare the states
        #[arg(long)]
        verify: bool,
    },

    /// Show version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    // Execute command
    let result = match cli.command {
        Commands::Compile {
            input,
            fusion,
            output,
        } => compile::execute(&input, &fusion, output.as_deref()),

        Commands::Run {
            input,
            fusion,
            params,
            shots,
            verify,
        } => run::execute(&input, &fusion, &params, shots, verify),

        Commands::Version => {
            version::execute();
            Ok(())
        }
    };

    // Handle errors
    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
