//! End-to-end liquidity + swap workflow
//!
//! ResolvePool → Fund → ApprovePositionManager → Provision → ApproveRouter
//! → Swap → InspectPosition → Withdraw → Collect
//!
//! Every step waits for its confirmations before the next one starts (all
//! calls go through one `TransactionSequencer`). The first failing step
//! aborts the run; the error carries the steps that completed and the
//! position id if one was minted, so stranded funds can be recovered.

use crate::chain::ChainClient;
use crate::config::{FlowAmounts, FlowConfig};
use crate::error::FlowError;
use crate::execution::{ApprovalManager, Funder, FundingPlan, SwapExecutor, TransactionSequencer};
use crate::position::{resolve_pool, PositionLifecycleController, ProvisionRequest, ResolvedPool};
use crate::types::{
    LifecycleState, Minimums, PoolKey, Position, PositionInfo, SwapOrder, TokenAmounts,
    TransactionRecord,
};
use crate::units::{display_units, USDC_DECIMALS, WETH_DECIMALS};
use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Step {
    /// Failure-only: picking the signing account submits nothing and is not recorded
    ResolveOperator,
    ResolvePool,
    Fund,
    ApprovePositionManager,
    Provision,
    ApproveRouter,
    Swap,
    InspectPosition,
    Withdraw,
    Collect,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Step::ResolveOperator => "resolve operator",
            Step::ResolvePool => "resolve pool",
            Step::Fund => "fund",
            Step::ApprovePositionManager => "approve position manager",
            Step::Provision => "provision",
            Step::ApproveRouter => "approve router",
            Step::Swap => "swap",
            Step::InspectPosition => "inspect position",
            Step::Withdraw => "withdraw",
            Step::Collect => "collect",
        };
        write!(f, "{}", name)
    }
}

/// Transactions confirmed by one completed step
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: Step,
    pub transactions: Vec<TransactionRecord>,
}

/// Outcome of a run, complete or partial
#[derive(Debug, Clone, Serialize)]
pub struct FlowReport {
    pub operator: Address,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub pool: Option<ResolvedPool>,
    pub steps: Vec<StepRecord>,
    pub position: Option<Position>,
    pub live_position: Option<PositionInfo>,
    pub swap_amount_out: Option<U256>,
    pub withdrawn: Option<TokenAmounts>,
    pub collected: Option<TokenAmounts>,
}

impl FlowReport {
    fn new(operator: Address) -> Self {
        Self {
            operator,
            started_at: Utc::now(),
            finished_at: None,
            pool: None,
            steps: Vec::new(),
            position: None,
            live_position: None,
            swap_amount_out: None,
            withdrawn: None,
            collected: None,
        }
    }

    pub fn completed_steps(&self) -> Vec<Step> {
        self.steps.iter().map(|s| s.step).collect()
    }

    fn complete(&mut self, step: Step, transactions: Vec<TransactionRecord>) {
        info!("Step '{}' complete ({} tx)", step, transactions.len());
        self.steps.push(StepRecord { step, transactions });
    }

    fn fail(&self, step: Step, source: FlowError) -> WorkflowError {
        WorkflowError {
            step,
            completed: self.completed_steps(),
            position_id: self.position.as_ref().map(|p| p.id),
            source,
            report: Box::new(self.clone()),
        }
    }
}

#[derive(Debug, Error)]
#[error("workflow aborted at step '{step}' after {} completed step(s): {source}", .completed.len())]
pub struct WorkflowError {
    pub step: Step,
    pub completed: Vec<Step>,
    /// Minted position, if the run got that far
    pub position_id: Option<U256>,
    #[source]
    pub source: FlowError,
    /// Everything recorded before the failure
    pub report: Box<FlowReport>,
}

pub struct SwapFlow<C> {
    config: Arc<FlowConfig>,
    amounts: FlowAmounts,
    minimums: Minimums,
    client: Arc<C>,
}

impl<C: ChainClient> SwapFlow<C> {
    pub fn new(config: Arc<FlowConfig>, client: Arc<C>) -> anyhow::Result<Self> {
        config.validate()?;
        let amounts = config.amounts()?;
        let minimums = config.minimums()?;
        Ok(Self {
            config,
            amounts,
            minimums,
            client,
        })
    }

    async fn operator(&self) -> Result<Address, WorkflowError> {
        if let Some(operator) = self.config.operator {
            return Ok(operator);
        }
        let accounts = self
            .client
            .accounts()
            .await
            .map_err(|e| FlowReport::new(Address::ZERO).fail(Step::ResolveOperator, e))?;
        accounts.first().copied().ok_or_else(|| {
            FlowReport::new(Address::ZERO).fail(
                Step::ResolveOperator,
                FlowError::Rpc("node exposes no unlocked accounts".to_string()),
            )
        })
    }

    pub async fn run(&self) -> Result<FlowReport, WorkflowError> {
        let operator = self.operator().await?;
        let contracts = &self.config.contracts;
        let amounts = &self.amounts;
        let ttl = self.config.params.deadline_ttl_secs;

        let sequencer = Arc::new(TransactionSequencer::new(self.client.clone()));
        let approvals = ApprovalManager::new(sequencer.clone());
        let funder = Funder::new(sequencer.clone());
        let swaps = SwapExecutor::new(
            sequencer.clone(),
            approvals.clone(),
            contracts.swap_router,
            operator,
        );
        let mut controller = PositionLifecycleController::new(
            sequencer.clone(),
            approvals.clone(),
            contracts.position_manager,
            operator,
        );

        let mut report = FlowReport::new(operator);
        info!("Running liquidity/swap flow as {:?}", operator);

        // ResolvePool
        let key: PoolKey = self.config.pool();
        let pool = resolve_pool(&sequencer, contracts.factory, &key)
            .await
            .map_err(|e| report.fail(Step::ResolvePool, e))?;
        report.pool = Some(pool);
        report.complete(Step::ResolvePool, Vec::new());

        // Fund
        let plan = FundingPlan {
            recipient: operator,
            wrapped_native: contracts.weth,
            wrap_amount: amounts.wrap_weth,
            donor: self.config.funding.usdc_donor,
            donor_asset: contracts.usdc,
            donor_amount: amounts.donor_usdc,
        };
        let receipts = funder.fund(&plan).await.map_err(|e| report.fail(Step::Fund, e))?;
        report.complete(
            Step::Fund,
            receipts.wrap.into_iter().chain(receipts.transfer).collect(),
        );

        // ApprovePositionManager
        let (approve0, approve1) =
            key.orient(contracts.weth, amounts.weth_approval, amounts.usdc_approval);
        let records = controller
            .approve(&key, approve0, approve1)
            .await
            .map_err(|e| report.fail(Step::ApprovePositionManager, e))?;
        report.complete(Step::ApprovePositionManager, records);

        // Provision
        let (desired0, desired1) =
            key.orient(contracts.weth, amounts.weth_desired, amounts.usdc_desired);
        let params = &self.config.params.position;
        let provisioned = async {
            let request = ProvisionRequest {
                pool: key,
                tick_lower: params.tick_lower,
                tick_upper: params.tick_upper,
                amount0_desired: desired0,
                amount1_desired: desired1,
                minimums: self.minimums,
                deadline: sequencer.deadline(ttl).await?,
                recipient: operator,
            };
            controller.provision(&request).await
        }
        .await;
        let (mut position, record) = provisioned.map_err(|e| report.fail(Step::Provision, e))?;
        info!("Position {} minted | liquidity={}", position.id, position.liquidity);
        report.position = Some(position.clone());
        report.complete(Step::Provision, vec![record]);

        // ApproveRouter
        let record = approvals
            .ensure_allowance(operator, contracts.swap_router, contracts.weth, amounts.swap_weth_in)
            .await
            .map_err(|e| report.fail(Step::ApproveRouter, e))?;
        report.complete(Step::ApproveRouter, vec![record]);

        // Swap
        let swap = &self.config.params.swap;
        let outcome = async {
            let order = SwapOrder {
                asset_in: contracts.weth,
                asset_out: contracts.usdc,
                fee: key.fee,
                recipient: operator,
                amount_in: amounts.swap_weth_in,
                minimum_amount_out: amounts.swap_usdc_min_out,
                deadline: sequencer.deadline(ttl).await?,
                sqrt_price_limit_x96: None,
                gas_limit: swap.gas_limit,
            };
            swaps.swap_exact_input_single(&order).await
        }
        .await
        .map_err(|e| report.fail(Step::Swap, e))?;
        info!(
            "Swapped {} WETH for {} USDC",
            display_units(amounts.swap_weth_in, WETH_DECIMALS),
            display_units(outcome.amount_out, USDC_DECIMALS)
        );
        report.swap_amount_out = Some(outcome.amount_out);
        report.complete(Step::Swap, vec![outcome.record]);

        // InspectPosition
        let live = controller
            .inspect(&position)
            .await
            .map_err(|e| report.fail(Step::InspectPosition, e))?;
        info!(
            "Position {} | liquidity={} | owed=({}, {})",
            position.id, live.liquidity, live.tokens_owed0, live.tokens_owed1
        );
        report.live_position = Some(live);
        report.complete(Step::InspectPosition, Vec::new());

        // Withdraw
        let withdrawn = async {
            let deadline = sequencer.deadline(ttl).await?;
            controller
                .withdraw_all(&mut position, Minimums::default(), deadline)
                .await
        }
        .await
        .map_err(|e| report.fail(Step::Withdraw, e))?;
        report.withdrawn = Some(withdrawn.0);
        report.position = Some(position.clone());
        report.complete(Step::Withdraw, vec![withdrawn.1]);

        // Collect
        let (collected, record) = controller
            .collect(&mut position, operator, u128::MAX, u128::MAX)
            .await
            .map_err(|e| report.fail(Step::Collect, e))?;
        let (usdc_collected, weth_collected) = if key.token0 == contracts.usdc {
            (collected.amount0, collected.amount1)
        } else {
            (collected.amount1, collected.amount0)
        };
        info!(
            "Collected {} USDC + {} WETH from position {}",
            display_units(usdc_collected, USDC_DECIMALS),
            display_units(weth_collected, WETH_DECIMALS),
            position.id
        );
        if controller.state() != LifecycleState::Settled {
            warn!("Position {} still holds liquidity or owed tokens after collect", position.id);
        }
        report.collected = Some(collected);
        report.position = Some(position);
        report.complete(Step::Collect, vec![record]);

        report.finished_at = Some(Utc::now());
        Ok(report)
    }
}
