//! Position Lifecycle Controller
//!
//! Drives one NonfungiblePositionManager position through
//! Unfunded → Approved → Provisioned → WithdrawRequested → Settled.
//!
//! - provision: mint, then recover the token id from the IncreaseLiquidity
//!   event. No event = no position (`MissingIdentifier`), and the controller
//!   stays `Approved`.
//! - current_liquidity / inspect: always a live `positions(id)` read
//! - withdraw: decreaseLiquidity. Amounts above the live liquidity are
//!   submitted as requested and left to the protocol to reject.
//! - collect: pull principal + fees; valid (zero amounts) on an empty position

use crate::chain::{ChainClient, ContractCall};
use crate::contracts::{fee_to_u24, tick_from_i24, tick_to_i24, INonfungiblePositionManager};
use crate::error::{FlowError, FlowResult};
use crate::execution::{extract_event, ApprovalManager, BalanceWatch, TransactionSequencer};
use crate::types::{
    CallKind, Deadline, LifecycleState, Minimums, PoolKey, Position, PositionInfo,
    PositionStatus, TokenAmounts, TransactionRecord,
};
use alloy::primitives::aliases::I24;
use alloy::primitives::{Address, U256};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Parameters for minting a new position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionRequest {
    pub pool: PoolKey,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub amount0_desired: U256,
    pub amount1_desired: U256,
    pub minimums: Minimums,
    pub deadline: Deadline,
    pub recipient: Address,
}

pub struct PositionLifecycleController<C> {
    sequencer: Arc<TransactionSequencer<C>>,
    approvals: ApprovalManager<C>,
    position_manager: Address,
    /// Account that holds the assets and the position NFT
    owner: Address,
    state: LifecycleState,
}

impl<C: ChainClient> PositionLifecycleController<C> {
    pub fn new(
        sequencer: Arc<TransactionSequencer<C>>,
        approvals: ApprovalManager<C>,
        position_manager: Address,
        owner: Address,
    ) -> Self {
        Self {
            sequencer,
            approvals,
            position_manager,
            owner,
            state: LifecycleState::Unfunded,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    fn require(&self, allowed: &[LifecycleState], expected: LifecycleState) -> FlowResult<()> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        Err(FlowError::InvalidState {
            expected,
            actual: self.state,
        })
    }

    /// Approve the position manager for both pool assets
    pub async fn approve(
        &mut self,
        pool: &PoolKey,
        amount0: U256,
        amount1: U256,
    ) -> FlowResult<Vec<TransactionRecord>> {
        self.require(
            &[LifecycleState::Unfunded, LifecycleState::Approved],
            LifecycleState::Unfunded,
        )?;

        let mut records = Vec::with_capacity(2);
        for (asset, amount) in [(pool.token0, amount0), (pool.token1, amount1)] {
            records.push(
                self.approvals
                    .ensure_allowance(self.owner, self.position_manager, asset, amount)
                    .await?,
            );
        }

        self.state = LifecycleState::Approved;
        Ok(records)
    }

    /// Mint a position and recover its id from the confirmation
    pub async fn provision(
        &mut self,
        request: &ProvisionRequest,
    ) -> FlowResult<(Position, TransactionRecord)> {
        self.require(&[LifecycleState::Approved], LifecycleState::Approved)?;

        let pool = &request.pool;
        let tick_lower =
            tick_to_i24(request.tick_lower).ok_or(FlowError::InvalidTick(request.tick_lower))?;
        let tick_upper =
            tick_to_i24(request.tick_upper).ok_or(FlowError::InvalidTick(request.tick_upper))?;

        self.sequencer.ensure_not_expired(request.deadline).await?;
        for (asset, desired) in [
            (pool.token0, request.amount0_desired),
            (pool.token1, request.amount1_desired),
        ] {
            self.approvals
                .verify_allowance(self.owner, self.position_manager, asset, desired)
                .await?;
        }

        info!(
            "Minting position on {} [{}, {}] desired=({}, {})",
            pool,
            request.tick_lower,
            request.tick_upper,
            request.amount0_desired,
            request.amount1_desired
        );
        if request.minimums.is_unguarded() {
            debug!("  Mint minimums are zero (no slippage guard)");
        }

        let params = INonfungiblePositionManager::MintParams {
            token0: pool.token0,
            token1: pool.token1,
            fee: fee_to_u24(pool.fee),
            tickLower: tick_lower,
            tickUpper: tick_upper,
            amount0Desired: request.amount0_desired,
            amount1Desired: request.amount1_desired,
            amount0Min: request.minimums.amount0,
            amount1Min: request.minimums.amount1,
            recipient: request.recipient,
            deadline: request.deadline.as_u256(),
        };
        let call = ContractCall::new(
            CallKind::Mint,
            self.owner,
            self.position_manager,
            &INonfungiblePositionManager::mintCall { params },
        );
        let watch = BalanceWatch::new(self.owner, &[pool.token0, pool.token1]);
        let record = self.sequencer.submit_tracked(call, &watch).await?;

        let increase = extract_event::<INonfungiblePositionManager::IncreaseLiquidity>(
            &record,
            Some(self.position_manager),
        )
        .filter(|event| !event.tokenId.is_zero())
        .ok_or(FlowError::MissingIdentifier {
            tx_hash: record.tx_hash,
        })?;

        let position = Position {
            id: increase.tokenId,
            pool: *pool,
            tick_lower: request.tick_lower,
            tick_upper: request.tick_upper,
            liquidity: increase.liquidity,
            tokens_owed0: 0,
            tokens_owed1: 0,
            status: PositionStatus::Active,
        };
        self.state = LifecycleState::Provisioned;

        info!(
            "✅ Position {} minted | liquidity={} | amounts=({}, {})",
            position.id, position.liquidity, increase.amount0, increase.amount1
        );
        Ok((position, record))
    }

    /// Live `positions(id)` record
    pub async fn inspect(&self, position: &Position) -> FlowResult<PositionInfo> {
        let live = self
            .sequencer
            .read(
                self.position_manager,
                INonfungiblePositionManager::positionsCall { tokenId: position.id },
            )
            .await?;

        let tick = |value: I24| {
            tick_from_i24(value).ok_or_else(|| {
                FlowError::Rpc(format!("position {} has out-of-range tick {}", position.id, value))
            })
        };
        Ok(PositionInfo {
            tick_lower: tick(live.tickLower)?,
            tick_upper: tick(live.tickUpper)?,
            liquidity: live.liquidity,
            tokens_owed0: live.tokensOwed0,
            tokens_owed1: live.tokensOwed1,
        })
    }

    /// Liquidity currently recorded by the protocol for this position
    pub async fn current_liquidity(&self, position: &Position) -> FlowResult<u128> {
        Ok(self.inspect(position).await?.liquidity)
    }

    /// Refresh the cached view of `position` from a live read
    async fn refresh(&self, position: &mut Position) -> FlowResult<PositionInfo> {
        let live = self.inspect(position).await?;
        position.liquidity = live.liquidity;
        position.tokens_owed0 = live.tokens_owed0;
        position.tokens_owed1 = live.tokens_owed1;
        Ok(live)
    }

    /// decreaseLiquidity by `liquidity`. Returns the amounts moved to owed.
    pub async fn withdraw(
        &mut self,
        position: &mut Position,
        liquidity: u128,
        minimums: Minimums,
        deadline: Deadline,
    ) -> FlowResult<(TokenAmounts, TransactionRecord)> {
        self.require(
            &[LifecycleState::Provisioned, LifecycleState::WithdrawRequested],
            LifecycleState::Provisioned,
        )?;

        self.sequencer.ensure_not_expired(deadline).await?;

        let live = self.current_liquidity(position).await?;
        if liquidity > live {
            warn!(
                "Withdrawing {} from position {} which holds {}; expecting protocol rejection",
                liquidity, position.id, live
            );
        }

        info!("Decreasing liquidity of position {} by {}", position.id, liquidity);
        let params = INonfungiblePositionManager::DecreaseLiquidityParams {
            tokenId: position.id,
            liquidity,
            amount0Min: minimums.amount0,
            amount1Min: minimums.amount1,
            deadline: deadline.as_u256(),
        };
        let call = ContractCall::new(
            CallKind::DecreaseLiquidity,
            self.owner,
            self.position_manager,
            &INonfungiblePositionManager::decreaseLiquidityCall { params },
        );
        let record = self.sequencer.submit(call).await?;
        self.state = LifecycleState::WithdrawRequested;

        let amounts = extract_event::<INonfungiblePositionManager::DecreaseLiquidity>(
            &record,
            Some(self.position_manager),
        )
        .map(|event| TokenAmounts::new(event.amount0, event.amount1))
        .unwrap_or_default();

        let live = self.refresh(position).await?;
        if live.liquidity == 0 {
            position.status = PositionStatus::LiquidityZero;
        }

        info!(
            "✅ Liquidity decreased | owed=({}, {}) | remaining={}",
            amounts.amount0, amounts.amount1, live.liquidity
        );
        Ok((amounts, record))
    }

    /// Full withdrawal: pass exactly the live liquidity so no dust is left
    pub async fn withdraw_all(
        &mut self,
        position: &mut Position,
        minimums: Minimums,
        deadline: Deadline,
    ) -> FlowResult<(TokenAmounts, TransactionRecord)> {
        let live = self.current_liquidity(position).await?;
        self.withdraw(position, live, minimums, deadline).await
    }

    /// Collect up to the caps of both owed balances to `recipient`
    pub async fn collect(
        &mut self,
        position: &mut Position,
        recipient: Address,
        amount0_max: u128,
        amount1_max: u128,
    ) -> FlowResult<(TokenAmounts, TransactionRecord)> {
        self.require(
            &[
                LifecycleState::Provisioned,
                LifecycleState::WithdrawRequested,
                LifecycleState::Settled,
            ],
            LifecycleState::WithdrawRequested,
        )?;

        info!("Collecting from position {} to {:?}", position.id, recipient);
        let params = INonfungiblePositionManager::CollectParams {
            tokenId: position.id,
            recipient,
            amount0Max: amount0_max,
            amount1Max: amount1_max,
        };
        let call = ContractCall::new(
            CallKind::Collect,
            self.owner,
            self.position_manager,
            &INonfungiblePositionManager::collectCall { params },
        );
        let watch = BalanceWatch::new(recipient, &[position.pool.token0, position.pool.token1]);
        let record = self.sequencer.submit_tracked(call, &watch).await?;

        let amounts = extract_event::<INonfungiblePositionManager::Collect>(
            &record,
            Some(self.position_manager),
        )
        .map(|event| TokenAmounts::new(event.amount0, event.amount1))
        .unwrap_or_default();

        let live = self.refresh(position).await?;
        if live.is_empty() {
            position.status = PositionStatus::Settled;
            self.state = LifecycleState::Settled;
        }

        info!(
            "✅ Collected ({}, {}) from position {}",
            amounts.amount0, amounts.amount1, position.id
        );
        Ok((amounts, record))
    }
}
