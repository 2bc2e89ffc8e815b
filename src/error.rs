//! Error taxonomy for the workflow
//!
//! Every failure is fatal for the step that raised it. Nothing here is
//! retried; the workflow surfaces the error together with the step that
//! failed and the progress reached (see `workflow::WorkflowError`).

use crate::types::{CallKind, LifecycleState};
use alloy::primitives::{Address, B256, U256};
use thiserror::Error;

pub type FlowResult<T> = std::result::Result<T, FlowError>;

#[derive(Debug, Error)]
pub enum FlowError {
    /// Chain endpoint unreachable or transport dropped
    #[error("chain endpoint unreachable: {0}")]
    Connection(String),

    /// Node answered with an error that is not a call rejection
    #[error("rpc request failed: {0}")]
    Rpc(String),

    #[error("allowance of {owner} for spender {spender} on {asset} is {approved}, need {required}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        asset: Address,
        approved: U256,
        required: U256,
    },

    #[error("balance of {account} on {asset} is {available}, need {required}")]
    InsufficientBalance {
        account: Address,
        asset: Address,
        available: U256,
        required: U256,
    },

    /// Protocol-level rejection of a submitted call
    #[error(
        "{kind} reverted{}: {}",
        .tx_hash.map(|h| format!(" in {h}")).unwrap_or_default(),
        .reason.as_deref().unwrap_or("no reason given")
    )]
    TransactionReverted {
        kind: CallKind,
        tx_hash: Option<B256>,
        reason: Option<String>,
    },

    /// Mint confirmation carried no IncreaseLiquidity event
    #[error("mint {tx_hash} confirmed without an IncreaseLiquidity event; funds moved but no position id")]
    MissingIdentifier { tx_hash: B256 },

    #[error("deadline {deadline} is not after chain time {now}")]
    DeadlineExpired { deadline: u64, now: u64 },

    #[error("no pool for {token0}/{token1} at fee tier {fee}")]
    PoolNotFound {
        token0: Address,
        token1: Address,
        fee: u32,
    },

    #[error("tick {0} is out of int24 range")]
    InvalidTick(i32),

    #[error("controller is {actual}, operation requires {expected}")]
    InvalidState {
        expected: LifecycleState,
        actual: LifecycleState,
    },

    #[error("failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: alloy::sol_types::Error,
    },
}

impl FlowError {
    pub fn reverted(kind: CallKind, tx_hash: Option<B256>, reason: impl Into<String>) -> Self {
        FlowError::TransactionReverted {
            kind,
            tx_hash,
            reason: Some(reason.into()),
        }
    }

    /// True for errors that mean the chain itself could not be reached
    pub fn is_connection(&self) -> bool {
        matches!(self, FlowError::Connection(_))
    }
}
