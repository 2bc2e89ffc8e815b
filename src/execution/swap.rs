//! Swap Executor
//!
//! Single-hop exact-input swaps through the V3 SwapRouter (`exactInputSingle`).
//!
//! Notes:
//!     - amountOutMinimum = 0 accepts any execution price. It is passed through
//!       as given and only logged; no implicit floor is applied.
//!     - sqrtPriceLimitX96 = 0 means no price limit.
//!     - amountOut is read from the asset-out Transfer to the recipient,
//!       falling back to the recipient's balance delta.

use super::approval::ApprovalManager;
use super::sequencer::{decode_events, BalanceWatch, TransactionSequencer};
use crate::chain::{ChainClient, ContractCall};
use crate::contracts::{fee_to_u24, ISwapRouter, IERC20};
use crate::error::{FlowError, FlowResult};
use crate::types::{CallKind, SwapOrder, TransactionRecord};
use alloy::primitives::aliases::U160;
use alloy::primitives::{Address, U256};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Confirmed swap with the decoded output amount
#[derive(Debug, Clone)]
pub struct SwapOutcome {
    pub amount_out: U256,
    pub record: TransactionRecord,
}

pub struct SwapExecutor<C> {
    sequencer: Arc<TransactionSequencer<C>>,
    approvals: ApprovalManager<C>,
    router: Address,
    /// Account that signs the swap
    sender: Address,
}

impl<C: ChainClient> SwapExecutor<C> {
    pub fn new(
        sequencer: Arc<TransactionSequencer<C>>,
        approvals: ApprovalManager<C>,
        router: Address,
        sender: Address,
    ) -> Self {
        Self {
            sequencer,
            approvals,
            router,
            sender,
        }
    }

    /// Execute `order` via exactInputSingle.
    ///
    /// Allowance for `amount_in` on the asset-in must already be granted to
    /// the router; it is re-read here and the call is not submitted if short.
    pub async fn swap_exact_input_single(&self, order: &SwapOrder) -> FlowResult<SwapOutcome> {
        self.sequencer.ensure_not_expired(order.deadline).await?;

        self.approvals
            .verify_allowance(self.sender, self.router, order.asset_in, order.amount_in)
            .await?;

        let available = self.sequencer.balance_of(order.asset_in, self.sender).await?;
        if available < order.amount_in {
            return Err(FlowError::InsufficientBalance {
                account: self.sender,
                asset: order.asset_in,
                available,
                required: order.amount_in,
            });
        }

        if order.minimum_amount_out.is_zero() {
            warn!(
                "Swap has no output floor (amountOutMinimum = 0): any execution price is accepted"
            );
        }

        info!(
            "Swap: {} {:?} -> {:?} (fee tier: {})",
            order.amount_in, order.asset_in, order.asset_out, order.fee
        );
        debug!(
            "  Min out: {}, Deadline: {}",
            order.minimum_amount_out, order.deadline
        );

        let params = ISwapRouter::ExactInputSingleParams {
            tokenIn: order.asset_in,
            tokenOut: order.asset_out,
            fee: fee_to_u24(order.fee),
            recipient: order.recipient,
            deadline: order.deadline.as_u256(),
            amountIn: order.amount_in,
            amountOutMinimum: order.minimum_amount_out,
            sqrtPriceLimitX96: order.sqrt_price_limit_x96.unwrap_or(U160::ZERO),
        };
        let call = ContractCall::new(
            CallKind::Swap,
            self.sender,
            self.router,
            &ISwapRouter::exactInputSingleCall { params },
        )
        .with_gas_limit(order.gas_limit);

        let watch = BalanceWatch::new(order.recipient, &[order.asset_in, order.asset_out]);
        let record = self.sequencer.submit_tracked(call, &watch).await?;

        let amount_out = output_amount(&record, order);
        info!("✅ Swap complete: {:?} | Received: {}", record.tx_hash, amount_out);

        Ok(SwapOutcome { amount_out, record })
    }
}

/// Asset-out received by the recipient in this confirmation
fn output_amount(record: &TransactionRecord, order: &SwapOrder) -> U256 {
    decode_events::<IERC20::Transfer>(&record.logs, Some(order.asset_out))
        .find(|transfer| transfer.to == order.recipient)
        .map(|transfer| transfer.value)
        .unwrap_or_else(|| {
            record
                .balances
                .as_ref()
                .and_then(|delta| delta.get(order.asset_out))
                .map(|b| b.gained())
                .unwrap_or(U256::ZERO)
        })
}
