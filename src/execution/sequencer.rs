//! Transaction Sequencer
//!
//! Shared submission/confirmation primitive. Every state-changing call in
//! the workflow goes through `submit`, which holds an async lock for the
//! whole submit → confirm window, so only one call is ever in flight for
//! the operating account and dependent calls land in program order.
//!
//! Also provides:
//! - typed reads (`read`, `balance_of`, `allowance`) that always hit the
//!   chain; nothing is cached
//! - deadline construction and the submission-time expiry check
//! - `extract_event`: linear scan of a confirmation's logs

use crate::chain::{ChainClient, ContractCall};
use crate::contracts::IERC20;
use crate::error::{FlowError, FlowResult};
use crate::types::{AssetBalance, BalanceDelta, Deadline, TransactionRecord};
use alloy::primitives::{Address, Bytes, Log, U256};
use alloy::sol_types::{SolCall, SolEvent};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Account + assets whose balances are snapshotted around a call
#[derive(Debug, Clone)]
pub struct BalanceWatch {
    pub account: Address,
    pub assets: Vec<Address>,
}

impl BalanceWatch {
    pub fn new(account: Address, assets: &[Address]) -> Self {
        Self {
            account,
            assets: assets.to_vec(),
        }
    }
}

pub struct TransactionSequencer<C> {
    client: Arc<C>,
    /// Number of calls submitted so far; the lock is the in-flight slot
    submitted: Mutex<u64>,
}

impl<C: ChainClient> TransactionSequencer<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            submitted: Mutex::new(0),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Total calls submitted through this sequencer
    pub async fn submitted(&self) -> u64 {
        *self.submitted.lock().await
    }

    /// Submit a call and block until it is confirmed or rejected
    pub async fn submit(&self, call: ContractCall) -> FlowResult<TransactionRecord> {
        let mut count = self.submitted.lock().await;
        self.submit_locked(&mut count, call).await
    }

    /// Submit a call, snapshotting the watched balances before and after.
    /// The snapshots happen inside the same in-flight window as the call.
    pub async fn submit_tracked(
        &self,
        call: ContractCall,
        watch: &BalanceWatch,
    ) -> FlowResult<TransactionRecord> {
        let mut count = self.submitted.lock().await;

        let mut before = Vec::with_capacity(watch.assets.len());
        for asset in &watch.assets {
            before.push(self.balance_of(*asset, watch.account).await?);
        }

        let mut record = self.submit_locked(&mut count, call).await?;

        let mut assets = Vec::with_capacity(watch.assets.len());
        for (asset, before) in watch.assets.iter().zip(before) {
            let after = self.balance_of(*asset, watch.account).await?;
            debug!("  {:?}: {} -> {}", asset, before, after);
            assets.push(AssetBalance {
                asset: *asset,
                before,
                after,
            });
        }
        record.balances = Some(BalanceDelta {
            account: watch.account,
            assets,
        });

        Ok(record)
    }

    async fn submit_locked(
        &self,
        count: &mut u64,
        call: ContractCall,
    ) -> FlowResult<TransactionRecord> {
        *count += 1;
        debug!(
            "#{} submitting {} from {:?} to {:?}",
            count, call.kind, call.from, call.to
        );

        let confirmation = self.client.send(&call).await?;

        if !confirmation.status {
            warn!("{} reverted: {:?}", call.kind, confirmation.tx_hash);
            return Err(FlowError::TransactionReverted {
                kind: call.kind,
                tx_hash: Some(confirmation.tx_hash),
                reason: None,
            });
        }

        info!(
            "{} confirmed: {:?} (block {:?}, gas {})",
            call.kind, confirmation.tx_hash, confirmation.block_number, confirmation.gas_used
        );

        Ok(TransactionRecord {
            kind: call.kind,
            from: call.from,
            to: call.to,
            tx_hash: confirmation.tx_hash,
            block_number: confirmation.block_number,
            gas_used: confirmation.gas_used,
            logs: confirmation.logs,
            balances: None,
        })
    }

    /// eth_call a view function and decode its return value
    pub async fn read<R: SolCall>(&self, to: Address, call: R) -> FlowResult<R::Return> {
        let output = self
            .client
            .read(to, Bytes::from(call.abi_encode()))
            .await?;
        R::abi_decode_returns(&output).map_err(|source| FlowError::Decode {
            what: R::SIGNATURE,
            source,
        })
    }

    pub async fn balance_of(&self, asset: Address, account: Address) -> FlowResult<U256> {
        self.read(asset, IERC20::balanceOfCall { account }).await
    }

    pub async fn allowance(
        &self,
        asset: Address,
        owner: Address,
        spender: Address,
    ) -> FlowResult<U256> {
        self.read(asset, IERC20::allowanceCall { owner, spender }).await
    }

    /// Deadline `ttl_secs` after the latest block's timestamp
    pub async fn deadline(&self, ttl_secs: u64) -> FlowResult<Deadline> {
        let now = self.client.latest_timestamp().await?;
        Ok(Deadline::after(now, ttl_secs))
    }

    /// Fail with `DeadlineExpired` unless `deadline` is strictly after chain time.
    /// The caller must build a fresh deadline; this never extends one.
    pub async fn ensure_not_expired(&self, deadline: Deadline) -> FlowResult<()> {
        let now = self.client.latest_timestamp().await?;
        if !deadline.is_after(now) {
            return Err(FlowError::DeadlineExpired {
                deadline: deadline.0,
                now,
            });
        }
        Ok(())
    }
}

/// All logs in `logs` that decode as `E`, in emission order, optionally
/// restricted to logs emitted by `emitter`
pub fn decode_events<'a, E: SolEvent + 'a>(
    logs: &'a [Log],
    emitter: Option<Address>,
) -> impl Iterator<Item = E> + 'a {
    logs.iter()
        .filter(move |log| emitter.map_or(true, |addr| log.address == addr))
        .filter(|log| log.data.topics().first() == Some(&E::SIGNATURE_HASH))
        .filter_map(|log| E::decode_log_data(&log.data).ok())
}

/// First log in `record` that decodes as `E`. Absence is returned, not raised.
pub fn extract_event<E: SolEvent>(
    record: &TransactionRecord,
    emitter: Option<Address>,
) -> Option<E> {
    decode_events(&record.logs, emitter).next()
}
