//! strata - devnet topology generator.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod logging;
mod progress;

use config::{ModeKind, Overrides, CONFIG_FILE};
use logging::LogFormat;

/// strata - generate two-layer devnets
#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Provision a devnet
    Devnet(DevnetArgs),

    /// Generate a network identity and a signing account
    Keygen {
        /// Directory to write `nodekey` and `privatekey.txt` into
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

#[derive(Args, Debug)]
struct DevnetArgs {
    /// Configuration file (default: ./strata.toml, if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of validator nodes
    #[arg(long)]
    validators: Option<usize>,

    /// Number of non-validator nodes
    #[arg(long)]
    non_validators: Option<usize>,

    /// Deployment mode
    #[arg(long, value_enum)]
    mode: Option<ModeKind>,

    /// Remote hosts, comma separated, one per node
    #[arg(long, value_delimiter = ',')]
    hosts: Option<Vec<String>>,

    /// Execution-layer chain id
    #[arg(long)]
    execution_chain_id: Option<String>,

    /// Consensus-layer chain id
    #[arg(long)]
    consensus_chain_id: Option<String>,

    /// Root-chain RPC URL watched by consensus nodes
    #[arg(long)]
    root_rpc_url: Option<String>,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Use a prebuilt consensus binary instead of building one
    #[arg(long)]
    consensus_binary: Option<PathBuf>,

    /// Signer dump (JSON array of {address, priv_key}) to take accounts from
    #[arg(long)]
    signer_dump: Option<PathBuf>,

    /// Execution genesis template
    #[arg(long)]
    execution_genesis: Option<PathBuf>,
}

impl DevnetArgs {
    fn into_parts(self) -> (Option<PathBuf>, Overrides) {
        let overrides = Overrides {
            validators: self.validators,
            non_validators: self.non_validators,
            mode: self.mode,
            hosts: self.hosts,
            execution_chain_id: self.execution_chain_id,
            consensus_chain_id: self.consensus_chain_id,
            root_rpc_url: self.root_rpc_url,
            output_dir: self.output_dir,
            consensus_binary: self.consensus_binary,
            signer_dump: self.signer_dump,
            execution_genesis: self.execution_genesis,
        };
        (self.config, overrides)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.log_format);

    let result = match cli.command {
        Commands::Devnet(args) => {
            let (config, overrides) = args.into_parts();
            let required = config.is_some();
            let path = config.unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
            commands::devnet(&path, required, overrides, cli.log_format).await
        }
        Commands::Keygen { output } => commands::keygen(output.as_deref()),
        Commands::Version => {
            println!("strata {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
