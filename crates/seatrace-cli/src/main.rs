//! # seatrace CLI Entry Point
//!
//! Assembles subcommands and dispatches to handler modules. Gateway
//! settings come from the same `CHAIN_*` environment variables as the
//! API service.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use url::Url;

use seatrace_chain_client::{ChainClient, ChainConfig};
use seatrace_cli::address::{check_address, CheckAddressArgs};
use seatrace_cli::chain::{self, GoodArgs, TxArgs};

/// seatrace operator CLI.
///
/// Queries the chain gateway for what the traceability contract holds,
/// and checks company chain addresses.
#[derive(Parser, Debug)]
#[command(name = "seatrace", version, about)]
struct Cli {
    /// Override `CHAIN_GATEWAY_URL`.
    #[arg(long, global = true)]
    gateway_url: Option<Url>,

    /// Pretty-print the JSON output.
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Current block height.
    BlockNumber,
    /// The contract's full record of a good.
    Trace(GoodArgs),
    /// The status the contract holds for a good.
    Status(GoodArgs),
    /// A transaction as the node reports it.
    Tx(TxArgs),
    /// Check that a company chain address is well formed. Needs no gateway.
    CheckAddress(CheckAddressArgs),
}

fn gateway(url: Option<Url>) -> anyhow::Result<ChainClient> {
    let mut config = ChainConfig::from_env().context("loading chain gateway configuration")?;
    if let Some(url) = url {
        config.base_url = url;
    }
    tracing::debug!(?config, "chain gateway configuration");
    Ok(ChainClient::new(config)?)
}

fn print(value: &serde_json::Value, pretty: bool) -> anyhow::Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{rendered}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let output = match &cli.command {
        Commands::CheckAddress(args) => {
            let report = check_address(&args.address);
            print(&serde_json::to_value(&report)?, cli.pretty)?;
            return Ok(if report.valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            });
        }
        Commands::BlockNumber => chain::block_number(&gateway(cli.gateway_url.clone())?).await?,
        Commands::Trace(args) => chain::trace(&gateway(cli.gateway_url.clone())?, args).await?,
        Commands::Status(args) => chain::status(&gateway(cli.gateway_url.clone())?, args).await?,
        Commands::Tx(args) => chain::transaction(&gateway(cli.gateway_url.clone())?, args).await?,
    };

    print(&output, cli.pretty)?;
    Ok(ExitCode::SUCCESS)
}
