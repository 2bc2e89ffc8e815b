//! Test Account Funding
//!
//! Moves test funds onto the operating account before the workflow starts:
//! - wraps native currency into the wrapped-native asset (WETH `deposit`)
//! - transfers an ERC20 amount from an impersonated donor account
//!
//! The donor is always released (`stop_impersonating`) once the transfer
//! has been attempted, whether it confirmed or not.

use super::sequencer::{BalanceWatch, TransactionSequencer};
use crate::chain::{ChainClient, ContractCall};
use crate::contracts::{IWETH9, IERC20};
use crate::error::{FlowError, FlowResult};
use crate::types::{CallKind, TransactionRecord};
use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// What to move onto the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingPlan {
    pub recipient: Address,
    /// Wrapped-native asset contract (WETH)
    pub wrapped_native: Address,
    /// Native amount to wrap; zero skips the deposit
    pub wrap_amount: U256,
    /// Pre-funded account the transfer comes from
    pub donor: Address,
    pub donor_asset: Address,
    /// Zero skips the donor transfer
    pub donor_amount: U256,
}

/// Confirmations produced by a funding run
#[derive(Debug, Clone, Default)]
pub struct FundingReceipts {
    pub wrap: Option<TransactionRecord>,
    pub transfer: Option<TransactionRecord>,
}

pub struct Funder<C> {
    sequencer: Arc<TransactionSequencer<C>>,
}

impl<C: ChainClient> Funder<C> {
    pub fn new(sequencer: Arc<TransactionSequencer<C>>) -> Self {
        Self { sequencer }
    }

    pub async fn fund(&self, plan: &FundingPlan) -> FlowResult<FundingReceipts> {
        let mut receipts = FundingReceipts::default();

        if !plan.wrap_amount.is_zero() {
            receipts.wrap = Some(self.wrap(plan).await?);
        }
        if !plan.donor_amount.is_zero() {
            receipts.transfer = Some(self.transfer_from_donor(plan).await?);
        }

        Ok(receipts)
    }

    async fn wrap(&self, plan: &FundingPlan) -> FlowResult<TransactionRecord> {
        info!("Wrapping {} native into {:?}", plan.wrap_amount, plan.wrapped_native);
        let call = ContractCall::new(
            CallKind::Wrap,
            plan.recipient,
            plan.wrapped_native,
            &IWETH9::depositCall {},
        )
        .with_value(plan.wrap_amount);
        let watch = BalanceWatch::new(plan.recipient, &[plan.wrapped_native]);
        self.sequencer.submit_tracked(call, &watch).await
    }

    async fn transfer_from_donor(&self, plan: &FundingPlan) -> FlowResult<TransactionRecord> {
        let available = self
            .sequencer
            .balance_of(plan.donor_asset, plan.donor)
            .await?;
        if available < plan.donor_amount {
            return Err(FlowError::InsufficientBalance {
                account: plan.donor,
                asset: plan.donor_asset,
                available,
                required: plan.donor_amount,
            });
        }

        info!(
            "Transferring {} of {:?} from donor {:?}",
            plan.donor_amount, plan.donor_asset, plan.donor
        );
        self.sequencer.client().impersonate(plan.donor).await?;

        let call = ContractCall::new(
            CallKind::Transfer,
            plan.donor,
            plan.donor_asset,
            &IERC20::transferCall {
                to: plan.recipient,
                amount: plan.donor_amount,
            },
        );
        let watch = BalanceWatch::new(plan.recipient, &[plan.donor_asset]);
        let result = self.sequencer.submit_tracked(call, &watch).await;

        if let Err(e) = self.sequencer.client().stop_impersonating(plan.donor).await {
            warn!("Failed to release donor {:?}: {}", plan.donor, e);
        }

        result
    }
}
