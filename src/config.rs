//! Configuration management
//!
//! Environment (contracts, RPC, funding) from a .env file via `dotenv`,
//! workflow parameters (ticks, amounts, swap size, deadline) from an
//! optional TOML scenario file. Defaults reproduce the mainnet-fork flow:
//! WETH/USDC 0.30%, full range ±60000, 1 WETH + 3000 USDC, swap 0.1 WETH.

use crate::types::{tick_spacing, Minimums, PoolKey};
use crate::units::{parse_units, USDC_DECIMALS, WETH_DECIMALS};
use alloy::primitives::{address, Address, U256};
use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Ethereum mainnet deployments
pub const MAINNET_WETH: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
pub const MAINNET_USDC: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eb48");
pub const MAINNET_V3_FACTORY: Address = address!("1F98431c8aD98523631AE4a59f267346ea31F984");
pub const MAINNET_POSITION_MANAGER: Address = address!("C36442b4a4522E871399CD717aBDD847Ab11FE88");
pub const MAINNET_SWAP_ROUTER: Address = address!("E592427A0AEce92De3Edee1F18E0157C05861564");
/// Large USDC holder impersonated on the fork
pub const MAINNET_USDC_DONOR: Address = address!("55FE002aefF02F77364de339a1292923A15844B8");

pub const MIN_TICK: i32 = -887272;
pub const MAX_TICK: i32 = 887272;

/// Contract addresses the workflow talks to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolAddresses {
    pub weth: Address,
    pub usdc: Address,
    pub factory: Address,
    pub position_manager: Address,
    pub swap_router: Address,
}

impl Default for ProtocolAddresses {
    fn default() -> Self {
        Self {
            weth: MAINNET_WETH,
            usdc: MAINNET_USDC,
            factory: MAINNET_V3_FACTORY,
            position_manager: MAINNET_POSITION_MANAGER,
            swap_router: MAINNET_SWAP_ROUTER,
        }
    }
}

/// Test-account funding amounts (human units)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingConfig {
    /// Native ETH to wrap into WETH
    pub wrap_weth: Decimal,
    pub usdc_donor: Address,
    pub donor_usdc: Decimal,
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            wrap_weth: Decimal::from(5),
            usdc_donor: MAINNET_USDC_DONOR,
            donor_usdc: Decimal::from(5000),
        }
    }
}

/// Workflow scenario, read from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowParams {
    #[serde(default)]
    pub position: PositionParams,
    #[serde(default)]
    pub swap: SwapParams,
    #[serde(default = "default_deadline_ttl")]
    pub deadline_ttl_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionParams {
    #[serde(default = "default_tick_lower")]
    pub tick_lower: i32,
    #[serde(default = "default_tick_upper")]
    pub tick_upper: i32,
    #[serde(default = "default_weth_desired")]
    pub weth_desired: Decimal,
    #[serde(default = "default_usdc_desired")]
    pub usdc_desired: Decimal,
    #[serde(default)]
    pub weth_min: Decimal,
    #[serde(default)]
    pub usdc_min: Decimal,
    /// Position manager allowances
    #[serde(default = "default_weth_approval")]
    pub weth_approval: Decimal,
    #[serde(default = "default_usdc_approval")]
    pub usdc_approval: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapParams {
    #[serde(default = "default_swap_amount")]
    pub weth_in: Decimal,
    /// 0 = accept any price
    #[serde(default)]
    pub usdc_min_out: Decimal,
    #[serde(default = "default_swap_gas_limit")]
    pub gas_limit: Option<u64>,
}

fn default_deadline_ttl() -> u64 { 600 }
fn default_tick_lower() -> i32 { -60000 }
fn default_tick_upper() -> i32 { 60000 }
fn default_weth_desired() -> Decimal { Decimal::ONE }
fn default_usdc_desired() -> Decimal { Decimal::from(3000) }
fn default_weth_approval() -> Decimal { Decimal::from(10) }
fn default_usdc_approval() -> Decimal { Decimal::from(50000) }
fn default_swap_amount() -> Decimal { Decimal::new(1, 1) }
fn default_swap_gas_limit() -> Option<u64> { Some(500_000) }

impl Default for PositionParams {
    fn default() -> Self {
        Self {
            tick_lower: default_tick_lower(),
            tick_upper: default_tick_upper(),
            weth_desired: default_weth_desired(),
            usdc_desired: default_usdc_desired(),
            weth_min: Decimal::ZERO,
            usdc_min: Decimal::ZERO,
            weth_approval: default_weth_approval(),
            usdc_approval: default_usdc_approval(),
        }
    }
}

impl Default for SwapParams {
    fn default() -> Self {
        Self {
            weth_in: default_swap_amount(),
            usdc_min_out: Decimal::ZERO,
            gas_limit: default_swap_gas_limit(),
        }
    }
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            position: PositionParams::default(),
            swap: SwapParams::default(),
            deadline_ttl_secs: default_deadline_ttl(),
        }
    }
}

impl FlowParams {
    /// Load a scenario from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read params file: {}", path.as_ref().display()))?;

        let params: Self = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML workflow parameters")?;

        Ok(params)
    }
}

/// Everything the workflow needs, in raw units. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowConfig {
    pub rpc_url: String,
    /// None = first unlocked account of the node
    pub operator: Option<Address>,
    pub contracts: ProtocolAddresses,
    pub fee_tier: u32,
    pub funding: FundingConfig,
    pub params: FlowParams,
}

/// Raw-unit amounts derived from a `FlowConfig`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowAmounts {
    pub wrap_weth: U256,
    pub donor_usdc: U256,
    pub weth_desired: U256,
    pub usdc_desired: U256,
    pub weth_min: U256,
    pub usdc_min: U256,
    pub weth_approval: U256,
    pub usdc_approval: U256,
    pub swap_weth_in: U256,
    pub swap_usdc_min_out: U256,
}

fn raw(value: Decimal, decimals: u32, name: &str) -> Result<U256> {
    parse_units(value, decimals)
        .with_context(|| format!("{} = {} is not a valid token amount", name, value))
}

impl FlowConfig {
    pub fn pool(&self) -> PoolKey {
        PoolKey::new(self.contracts.weth, self.contracts.usdc, self.fee_tier)
    }

    pub fn amounts(&self) -> Result<FlowAmounts> {
        let p = &self.params;
        Ok(FlowAmounts {
            wrap_weth: raw(self.funding.wrap_weth, WETH_DECIMALS, "WRAP_WETH")?,
            donor_usdc: raw(self.funding.donor_usdc, USDC_DECIMALS, "DONOR_USDC")?,
            weth_desired: raw(p.position.weth_desired, WETH_DECIMALS, "position.weth_desired")?,
            usdc_desired: raw(p.position.usdc_desired, USDC_DECIMALS, "position.usdc_desired")?,
            weth_min: raw(p.position.weth_min, WETH_DECIMALS, "position.weth_min")?,
            usdc_min: raw(p.position.usdc_min, USDC_DECIMALS, "position.usdc_min")?,
            weth_approval: raw(p.position.weth_approval, WETH_DECIMALS, "position.weth_approval")?,
            usdc_approval: raw(p.position.usdc_approval, USDC_DECIMALS, "position.usdc_approval")?,
            swap_weth_in: raw(p.swap.weth_in, WETH_DECIMALS, "swap.weth_in")?,
            swap_usdc_min_out: raw(p.swap.usdc_min_out, USDC_DECIMALS, "swap.usdc_min_out")?,
        })
    }

    /// Mint slippage floors in pool (token0, token1) order
    pub fn minimums(&self) -> Result<Minimums> {
        let amounts = self.amounts()?;
        let (amount0, amount1) = self
            .pool()
            .orient(self.contracts.weth, amounts.weth_min, amounts.usdc_min);
        Ok(Minimums { amount0, amount1 })
    }

    /// Reject configurations the position manager would revert on
    pub fn validate(&self) -> Result<()> {
        let position = &self.params.position;
        let spacing = match tick_spacing(self.fee_tier) {
            Some(s) => s,
            None => bail!("Unsupported fee tier: {}", self.fee_tier),
        };
        if position.tick_lower >= position.tick_upper {
            bail!(
                "tick_lower ({}) must be below tick_upper ({})",
                position.tick_lower,
                position.tick_upper
            );
        }
        for tick in [position.tick_lower, position.tick_upper] {
            if !(MIN_TICK..=MAX_TICK).contains(&tick) {
                bail!("Tick {} outside [{}, {}]", tick, MIN_TICK, MAX_TICK);
            }
            if tick % spacing != 0 {
                bail!(
                    "Tick {} is not a multiple of spacing {} (fee {})",
                    tick,
                    spacing,
                    self.fee_tier
                );
            }
        }
        if self.contracts.weth == self.contracts.usdc {
            bail!("WETH and USDC addresses must differ");
        }
        if self.params.deadline_ttl_secs == 0 {
            bail!("deadline_ttl_secs must be positive");
        }
        self.amounts()?;
        Ok(())
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {}='{}': {}", key, value, e)),
        _ => Ok(default),
    }
}

fn env_opt<T: FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid {}='{}': {}", key, value, e)),
        _ => Ok(None),
    }
}

fn from_env(params: FlowParams) -> Result<FlowConfig> {
    let defaults = ProtocolAddresses::default();
    let funding = FundingConfig::default();

    let config = FlowConfig {
        rpc_url: env_or("RPC_URL", "http://localhost:8545".to_string())?,
        operator: env_opt("OPERATOR")?,
        contracts: ProtocolAddresses {
            weth: env_or("WETH_ADDRESS", defaults.weth)?,
            usdc: env_or("USDC_ADDRESS", defaults.usdc)?,
            factory: env_or("UNISWAP_V3_FACTORY", defaults.factory)?,
            position_manager: env_or("POSITION_MANAGER", defaults.position_manager)?,
            swap_router: env_or("SWAP_ROUTER", defaults.swap_router)?,
        },
        fee_tier: env_or("FEE_TIER", 3000)?,
        funding: FundingConfig {
            wrap_weth: env_or("WRAP_WETH", funding.wrap_weth)?,
            usdc_donor: env_or("USDC_DONOR", funding.usdc_donor)?,
            donor_usdc: env_or("DONOR_USDC", funding.donor_usdc)?,
        },
        params,
    };
    config.validate()?;
    Ok(config)
}

/// Load from `.env` in the working directory (if present) and the process
/// environment, with default workflow parameters
pub fn load_config() -> Result<FlowConfig> {
    dotenv::dotenv().ok();
    from_env(FlowParams::default())
}

/// Load from a specific env file plus an optional TOML parameters file
pub fn load_config_from_file<P: AsRef<Path>>(
    env_file: P,
    params_file: Option<&Path>,
) -> Result<FlowConfig> {
    let env_file = env_file.as_ref();
    dotenv::from_path(env_file)
        .with_context(|| format!("Failed to load env file: {}", env_file.display()))?;
    let params = match params_file {
        Some(path) => FlowParams::load(path)?,
        None => FlowParams::default(),
    };
    from_env(params)
}
