//! Approval Manager
//!
//! Grants spenders allowance on ERC20 assets and gates every spending call
//! on a fresh allowance read.
//!
//! Unlike the usual "check then approve max" pattern, `ensure_allowance`
//! always submits an approval for exactly the requested amount. Approvals
//! are idempotent and cheap on the fork, and an exact approve leaves the
//! allowance equal to the intended spend instead of an unbounded grant.

use super::sequencer::TransactionSequencer;
use crate::chain::{ChainClient, ContractCall};
use crate::contracts::IERC20;
use crate::error::{FlowError, FlowResult};
use crate::types::{CallKind, TransactionRecord};
use alloy::primitives::{Address, U256};
use std::sync::Arc;
use tracing::{debug, info};

pub struct ApprovalManager<C> {
    sequencer: Arc<TransactionSequencer<C>>,
}

impl<C> Clone for ApprovalManager<C> {
    fn clone(&self) -> Self {
        Self {
            sequencer: Arc::clone(&self.sequencer),
        }
    }
}

impl<C: ChainClient> ApprovalManager<C> {
    pub fn new(sequencer: Arc<TransactionSequencer<C>>) -> Self {
        Self { sequencer }
    }

    /// Approve `spender` for `amount` of `asset` and wait for confirmation
    pub async fn ensure_allowance(
        &self,
        owner: Address,
        spender: Address,
        asset: Address,
        amount: U256,
    ) -> FlowResult<TransactionRecord> {
        info!("Approving {} of {:?} for {:?}", amount, asset, spender);
        let call = ContractCall::new(
            CallKind::Approve,
            owner,
            asset,
            &IERC20::approveCall { spender, amount },
        );
        self.sequencer.submit(call).await
    }

    /// Re-read the live allowance and fail before submission when it is
    /// below `required`. Returns the allowance read.
    pub async fn verify_allowance(
        &self,
        owner: Address,
        spender: Address,
        asset: Address,
        required: U256,
    ) -> FlowResult<U256> {
        let approved = self.sequencer.allowance(asset, owner, spender).await?;
        if approved < required {
            return Err(FlowError::InsufficientAllowance {
                owner,
                spender,
                asset,
                approved,
                required,
            });
        }
        debug!("Sufficient allowance: {} >= {}", approved, required);
        Ok(approved)
    }
}
