//! Core data structures for the liquidity/swap workflow
//!
//! Pool references, positions, swap orders and the transaction records
//! produced by every submitted call.

use alloy::primitives::aliases::U160;
use alloy::primitives::{Address, Log, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of state-changing call submitted to the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallKind {
    Approve,
    Transfer,
    Wrap,
    Mint,
    DecreaseLiquidity,
    Collect,
    Swap,
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CallKind::Approve => write!(f, "approve"),
            CallKind::Transfer => write!(f, "transfer"),
            CallKind::Wrap => write!(f, "wrap"),
            CallKind::Mint => write!(f, "mint"),
            CallKind::DecreaseLiquidity => write!(f, "decreaseLiquidity"),
            CallKind::Collect => write!(f, "collect"),
            CallKind::Swap => write!(f, "exactInputSingle"),
        }
    }
}

/// Tick spacing enforced by the factory for each enabled fee tier
pub fn tick_spacing(fee: u32) -> Option<i32> {
    match fee {
        100 => Some(1),
        500 => Some(10),
        3000 => Some(60),
        10000 => Some(200),
        _ => None,
    }
}

/// Pool reference: token pair ordered by address plus fee tier.
///
/// V3 pools always have token0 < token1 by address; `new` sorts the pair
/// so callers can pass the assets in any order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolKey {
    pub token0: Address,
    pub token1: Address,
    /// Fee tier (500 = 0.05%, 3000 = 0.30%, 10000 = 1.00%)
    pub fee: u32,
}

impl PoolKey {
    pub fn new(asset_a: Address, asset_b: Address, fee: u32) -> Self {
        let (token0, token1) = if asset_a < asset_b {
            (asset_a, asset_b)
        } else {
            (asset_b, asset_a)
        };
        Self { token0, token1, fee }
    }

    /// Order an (asset_a, asset_b) amount pair into (token0, token1) order
    pub fn orient<T>(&self, asset_a: Address, amount_a: T, amount_b: T) -> (T, T) {
        if asset_a == self.token0 {
            (amount_a, amount_b)
        } else {
            (amount_b, amount_a)
        }
    }

    pub fn tick_spacing(&self) -> Option<i32> {
        tick_spacing(self.fee)
    }

    /// Get the fee as a percentage
    pub fn fee_percent(&self) -> f64 {
        self.fee as f64 / 10000.0
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{} @ {}%", self.token0, self.token1, self.fee_percent())
    }
}

/// Expiry timestamp (unix seconds) for time-bounded calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Deadline(pub u64);

impl Deadline {
    pub fn after(now: u64, ttl_secs: u64) -> Self {
        Self(now.saturating_add(ttl_secs))
    }

    pub fn is_after(&self, now: u64) -> bool {
        self.0 > now
    }

    pub fn as_u256(&self) -> U256 {
        U256::from(self.0)
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Output floors for a liquidity call. Zero on both sides disables the guard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Minimums {
    pub amount0: U256,
    pub amount1: U256,
}

impl Minimums {
    pub fn is_unguarded(&self) -> bool {
        self.amount0.is_zero() && self.amount1.is_zero()
    }
}

/// Pair of token amounts in pool order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAmounts {
    pub amount0: U256,
    pub amount1: U256,
}

impl TokenAmounts {
    pub fn new(amount0: U256, amount1: U256) -> Self {
        Self { amount0, amount1 }
    }

    pub fn is_zero(&self) -> bool {
        self.amount0.is_zero() && self.amount1.is_zero()
    }
}

/// Controller state machine for one liquidity position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    Unfunded,
    Approved,
    Provisioned,
    WithdrawRequested,
    Settled,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LifecycleState::Unfunded => write!(f, "Unfunded"),
            LifecycleState::Approved => write!(f, "Approved"),
            LifecycleState::Provisioned => write!(f, "Provisioned"),
            LifecycleState::WithdrawRequested => write!(f, "WithdrawRequested"),
            LifecycleState::Settled => write!(f, "Settled"),
        }
    }
}

/// Position status. A position only exists once the protocol assigned it an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Active,
    LiquidityZero,
    Settled,
}

/// Liquidity position created by a confirmed mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// NFT token id assigned by the position manager
    pub id: U256,
    pub pool: PoolKey,
    pub tick_lower: i32,
    pub tick_upper: i32,
    /// Last liquidity value observed (event or live read)
    pub liquidity: u128,
    pub tokens_owed0: u128,
    pub tokens_owed1: u128,
    pub status: PositionStatus,
}

/// Live `positions(tokenId)` record as read from the position manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionInfo {
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
    pub tokens_owed0: u128,
    pub tokens_owed1: u128,
}

impl PositionInfo {
    pub fn is_empty(&self) -> bool {
        self.liquidity == 0 && self.tokens_owed0 == 0 && self.tokens_owed1 == 0
    }
}

/// One-shot exact-input swap request. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapOrder {
    pub asset_in: Address,
    pub asset_out: Address,
    pub fee: u32,
    pub recipient: Address,
    pub amount_in: U256,
    /// Zero accepts any execution price
    pub minimum_amount_out: U256,
    pub deadline: Deadline,
    /// None = no price limit
    pub sqrt_price_limit_x96: Option<U160>,
    pub gas_limit: Option<u64>,
}

/// Before/after balance of one asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub asset: Address,
    pub before: U256,
    pub after: U256,
}

impl AssetBalance {
    pub fn gained(&self) -> U256 {
        self.after.saturating_sub(self.before)
    }

    pub fn spent(&self) -> U256 {
        self.before.saturating_sub(self.after)
    }
}

/// Balance snapshots taken around an asset-moving call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDelta {
    pub account: Address,
    pub assets: Vec<AssetBalance>,
}

impl BalanceDelta {
    pub fn get(&self, asset: Address) -> Option<&AssetBalance> {
        self.assets.iter().find(|b| b.asset == asset)
    }
}

/// Result of submitting any call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub kind: CallKind,
    pub from: Address,
    pub to: Address,
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    /// Emitted event data
    #[serde(skip)]
    pub logs: Vec<Log>,
    pub balances: Option<BalanceDelta>,
}
