// Copyright (c) 2024 Gridstake Developers

use anyhow::Result;
use clap::{Parser, Subcommand};

use gridstake::address::Network;
use gridstake::{commands, config, telemetry};

#[derive(Parser)]
#[command(name = "gridstake")]
#[command(about = "Proof-of-stake block assembly and staking engine", long_about = None)]
struct Cli {
    /// Use testnet (default)
    #[arg(long, global = true, conflicts_with = "mainnet")]
    testnet: bool,

    /// Use mainnet
    #[arg(long, global = true, conflicts_with = "testnet")]
    mainnet: bool,

    /// Path to config file (default: ~/.gridstake/{network}/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Determine the network from CLI flags (defaults to testnet)
    fn network(&self) -> Network {
        if self.mainnet {
            Network::Mainnet
        } else {
            Network::Testnet
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the staking configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Show the effective staking policy
    Show,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing(cli.verbose)?;

    let network = cli.network();
    if network.is_production() {
        eprintln!("[MAINNET] Using production network");
    } else {
        eprintln!("[TESTNET] Using test network");
    }

    let config_path = match cli.config {
        Some(path) => std::path::PathBuf::from(path),
        None => config::config_path(network)?,
    };

    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Init { force } => commands::config_init::run(&config_path, network, force),
            ConfigAction::Show => commands::config_show::run(&config_path),
        },
    }
}
