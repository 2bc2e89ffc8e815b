//! Alloy-backed ChainClient
//!
//! Talks to a local fork (anvil) over HTTP or WebSocket. Calls are sent as
//! unsigned requests through `eth_sendTransaction`; the node signs for its
//! unlocked and impersonated accounts. Gas estimation runs before
//! broadcast, so most protocol rejections arrive as JSON-RPC error
//! responses rather than status-0 receipts. Both map to
//! `FlowError::TransactionReverted`.

use super::{ChainClient, Confirmation, ContractCall};
use crate::error::{FlowError, FlowResult};
use crate::types::CallKind;
use alloy::eips::BlockNumberOrTag;
use alloy::network::{ReceiptResponse, TransactionBuilder};
use alloy::primitives::{Address, Bytes};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::transports::{RpcError, TransportErrorKind};
use async_trait::async_trait;
use tracing::{debug, info};

pub struct RpcChainClient<P> {
    provider: P,
}

impl RpcChainClient<DynProvider> {
    /// Connect to `url` (http://, ws://) and verify the node answers
    pub async fn connect(url: &str) -> FlowResult<Self> {
        let provider = ProviderBuilder::new()
            .connect(url)
            .await
            .map_err(|e| FlowError::Connection(format!("{}: {}", url, e)))?;

        let chain_id = provider
            .get_chain_id()
            .await
            .map_err(|e| FlowError::Connection(format!("{}: {}", url, e)))?;
        let block = provider
            .get_block_number()
            .await
            .map_err(|e| FlowError::Connection(format!("{}: {}", url, e)))?;
        info!("Connected to {} (chain_id: {}, block: {})", url, chain_id, block);

        Ok(Self::new(provider.erased()))
    }
}

impl<P: Provider> RpcChainClient<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    async fn anvil_request(&self, method: &'static str, account: Address) -> FlowResult<()> {
        self.provider
            .raw_request::<_, serde_json::Value>(method.into(), (account,))
            .await
            .map_err(|e| classify_error(None, e))?;
        debug!("{} {}", method, account);
        Ok(())
    }
}

/// Map a provider error onto the workflow taxonomy.
/// `kind` is set when the error came back from a submission.
fn classify_error(kind: Option<CallKind>, err: RpcError<TransportErrorKind>) -> FlowError {
    if let Some(payload) = err.as_error_resp() {
        let message = payload.message.to_string();
        return match kind {
            Some(kind) if message.to_lowercase().contains("revert") => {
                FlowError::reverted(kind, None, message)
            }
            _ => FlowError::Rpc(message),
        };
    }
    if err.is_transport_error() {
        return FlowError::Connection(err.to_string());
    }
    FlowError::Rpc(err.to_string())
}

#[async_trait]
impl<P: Provider> ChainClient for RpcChainClient<P> {
    async fn accounts(&self) -> FlowResult<Vec<Address>> {
        self.provider
            .get_accounts()
            .await
            .map_err(|e| classify_error(None, e))
    }

    async fn send(&self, call: &ContractCall) -> FlowResult<Confirmation> {
        let mut tx = TransactionRequest::default()
            .with_from(call.from)
            .with_to(call.to)
            .with_input(call.input.clone())
            .with_value(call.value);
        if let Some(gas) = call.gas_limit {
            tx = tx.with_gas_limit(gas);
        }

        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| classify_error(Some(call.kind), e))?;
        let tx_hash = *pending.tx_hash();
        debug!("{} tx submitted: {:?}", call.kind, tx_hash);

        // Wait for inclusion
        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| FlowError::Rpc(format!("receipt for {:?}: {}", tx_hash, e)))?;

        let logs = receipt
            .inner
            .logs()
            .iter()
            .map(|log| log.inner.clone())
            .collect();

        Ok(Confirmation {
            tx_hash: receipt.transaction_hash(),
            block_number: receipt.block_number(),
            gas_used: receipt.gas_used(),
            status: receipt.status(),
            logs,
        })
    }

    async fn read(&self, to: Address, input: Bytes) -> FlowResult<Bytes> {
        let tx = TransactionRequest::default().with_to(to).with_input(input);
        self.provider
            .call(tx)
            .await
            .map_err(|e| classify_error(None, e))
    }

    async fn latest_timestamp(&self) -> FlowResult<u64> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .map_err(|e| classify_error(None, e))?
            .ok_or_else(|| FlowError::Rpc("latest block not available".to_string()))?;
        Ok(block.header.timestamp)
    }

    async fn impersonate(&self, account: Address) -> FlowResult<()> {
        self.anvil_request("anvil_impersonateAccount", account).await
    }

    async fn stop_impersonating(&self, account: Address) -> FlowResult<()> {
        self.anvil_request("anvil_stopImpersonatingAccount", account).await
    }
}
