//! Uniswap V3 liquidity + swap flow against a local mainnet fork
//!
//! Usage:
//!   anvil --fork-url $MAINNET_RPC &
//!   lp-swap-flow --env-file .env --params flow.toml --report report.json
//!
//! Steps: resolve pool → fund (wrap ETH, USDC from an impersonated holder)
//! → approve → mint → approve router → swap → inspect → withdraw → collect.
//! Any failed step stops the run and exits non-zero.

use anyhow::{Context, Result};
use clap::Parser;
use lp_swap_flow::config::{load_config, load_config_from_file, FlowConfig, FlowParams};
use lp_swap_flow::{RpcChainClient, SwapFlow};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Liquidity provision + swap workflow on a forked chain
#[derive(Parser)]
#[command(name = "lp-swap-flow")]
struct Args {
    /// Environment file (RPC_URL, contract addresses, funding)
    #[arg(long, env = "ENV_FILE")]
    env_file: Option<PathBuf>,

    /// TOML workflow parameters (ticks, amounts, swap size, deadline)
    #[arg(long, env = "FLOW_PARAMS")]
    params: Option<PathBuf>,

    /// Write the run report as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// Override RPC_URL
    #[arg(long)]
    rpc_url: Option<String>,

    /// JSON log lines instead of human-readable output
    #[arg(long, default_value_t = false)]
    log_json: bool,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }
}

fn load(args: &Args) -> Result<FlowConfig> {
    let mut config = match &args.env_file {
        Some(path) => load_config_from_file(path, args.params.as_deref())?,
        None => {
            let mut config = load_config()?;
            if let Some(path) = &args.params {
                config.params = FlowParams::load(path)?;
                config.validate()?;
            }
            config
        }
    };
    if let Some(url) = &args.rpc_url {
        config.rpc_url = url.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_json);

    let config = Arc::new(load(&args)?);
    info!("Configuration loaded");
    info!("RPC URL: {}", config.rpc_url);
    info!(
        "Pool: {} | ticks [{}, {}]",
        config.pool(),
        config.params.position.tick_lower,
        config.params.position.tick_upper
    );
    if config.params.swap.usdc_min_out.is_zero() {
        warn!("Swap minimum output is 0: the swap accepts any price");
    }

    let client = Arc::new(
        RpcChainClient::connect(&config.rpc_url)
            .await
            .context("Failed to connect to chain")?,
    );

    let flow = SwapFlow::new(config.clone(), client)?;
    let (report, failure) = match flow.run().await {
        Ok(report) => (report, None),
        Err(e) => {
            error!("{}", e);
            if e.source.is_connection() {
                error!("Lost the node at {}; is the fork still running?", config.rpc_url);
            }
            if let Some(id) = e.position_id {
                error!("Position {} may still hold funds; recover it manually", id);
            }
            (*e.report.clone(), Some(e))
        }
    };

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    match failure {
        Some(e) => Err(e.into()),
        None => {
            info!("Flow complete: {} steps", report.steps.len());
            Ok(())
        }
    }
}
