//! Chain access
//!
//! `ChainClient` is the seam between the workflow and the simulated chain:
//! it submits calls, waits for inclusion and hands back a `Confirmation`
//! with status and emitted logs. The workflow never talks to a provider
//! directly.
//!
//! - `rpc`: alloy provider over HTTP or WebSocket (anvil fork)
//! - `mock`: in-memory chain for tests

pub mod rpc;

#[cfg(test)]
pub(crate) mod mock;

pub use rpc::RpcChainClient;

use crate::error::FlowResult;
use crate::types::CallKind;
use alloy::primitives::{Address, Bytes, Log, B256, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;

/// A state-changing call ready for submission
#[derive(Debug, Clone)]
pub struct ContractCall {
    pub kind: CallKind,
    pub from: Address,
    pub to: Address,
    pub input: Bytes,
    /// Native value attached (WETH deposit)
    pub value: U256,
    pub gas_limit: Option<u64>,
}

impl ContractCall {
    /// ABI-encode `call` into a submission from `from` to `to`
    pub fn new<C: SolCall>(kind: CallKind, from: Address, to: Address, call: &C) -> Self {
        Self {
            kind,
            from,
            to,
            input: Bytes::from(call.abi_encode()),
            value: U256::ZERO,
            gas_limit: None,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: Option<u64>) -> Self {
        self.gas_limit = gas_limit;
        self
    }
}

/// Inclusion result for a submitted call
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    /// true = success, false = reverted
    pub status: bool,
    pub logs: Vec<Log>,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Unlocked accounts exposed by the node
    async fn accounts(&self) -> FlowResult<Vec<Address>>;

    /// Submit a call and block until it is included
    async fn send(&self, call: &ContractCall) -> FlowResult<Confirmation>;

    /// eth_call against latest state
    async fn read(&self, to: Address, input: Bytes) -> FlowResult<Bytes>;

    /// Timestamp of the latest block
    async fn latest_timestamp(&self) -> FlowResult<u64>;

    async fn impersonate(&self, account: Address) -> FlowResult<()>;

    async fn stop_impersonating(&self, account: Address) -> FlowResult<()>;
}
