//! In-memory chain for tests
//!
//! Decodes calldata with the same `sol!` types the workflow encodes with,
//! keeps ERC20 ledgers, a NonfungiblePositionManager and a fixed-rate
//! SwapRouter, and emits the events the real contracts emit. A reverted
//! call rolls the ledger back and comes back as a status-0 confirmation.
//!
//! Fixed rate: 1 WETH = 3000 USDC. Swap fees (0.30%) accrue to open
//! positions pro rata to their share of pool liquidity.

use super::{ChainClient, Confirmation, ContractCall};
use crate::contracts::{
    INonfungiblePositionManager as Npm, ISwapRouter, IWETH9, UniswapV3Factory, UniswapV3Pool,
    IERC20,
};
use crate::error::{FlowError, FlowResult};
use alloy::primitives::{Address, Bytes, Log, B256, I256, U256};
use alloy::sol_types::{SolCall, SolEvent, SolValue};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::debug;

const POOL_FEE: u32 = 3000;
const FEE_DENOMINATOR: u64 = 1_000_000;
/// USDC raw units per 1e18 WETH raw units
const USDC_PER_WETH: u64 = 3_000_000_000;
const WETH_UNIT: u128 = 1_000_000_000_000_000_000;
const START_TIMESTAMP: u64 = 1_700_000_000;

#[derive(Debug, Clone)]
struct MockPosition {
    owner: Address,
    token0: Address,
    token1: Address,
    tick_lower: i32,
    tick_upper: i32,
    liquidity: u128,
    principal0: U256,
    principal1: U256,
    owed0: U256,
    owed1: U256,
}

/// Everything a reverted call must leave untouched
#[derive(Debug, Clone, Default)]
struct Ledger {
    balances: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    positions: BTreeMap<U256, MockPosition>,
    next_token_id: u64,
    /// Liquidity from other LPs
    seed_liquidity: u128,
}

struct MockState {
    ledger: Ledger,
    timestamp: u64,
    block: u64,
    sent: usize,
    unlocked: HashSet<Address>,
    impersonating: HashSet<Address>,
    suppress_increase_event: bool,
}

pub(crate) struct MockChain {
    state: Mutex<MockState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

type Revert = String;

impl MockChain {
    pub fn new() -> Self {
        let mut unlocked = HashSet::new();
        unlocked.insert(Self::OPERATOR);
        Self {
            state: Mutex::new(MockState {
                ledger: Ledger {
                    next_token_id: 1,
                    ..Ledger::default()
                },
                timestamp: START_TIMESTAMP,
                block: 1,
                sent: 0,
                unlocked,
                impersonating: HashSet::new(),
                suppress_increase_event: false,
            }),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    // usdc < weth, as on mainnet
    const USDC: Address = Address::repeat_byte(0xA0);
    const WETH: Address = Address::repeat_byte(0xC0);
    const NPM: Address = Address::repeat_byte(0x33);
    const ROUTER: Address = Address::repeat_byte(0x44);
    const FACTORY: Address = Address::repeat_byte(0x55);
    const POOL: Address = Address::repeat_byte(0x66);
    const OPERATOR: Address = Address::repeat_byte(0x77);
    const DONOR: Address = Address::repeat_byte(0xD0);

    pub fn usdc(&self) -> Address {
        Self::USDC
    }
    pub fn weth(&self) -> Address {
        Self::WETH
    }
    pub fn token0(&self) -> Address {
        Self::USDC
    }
    pub fn token1(&self) -> Address {
        Self::WETH
    }
    pub fn position_manager(&self) -> Address {
        Self::NPM
    }
    pub fn router(&self) -> Address {
        Self::ROUTER
    }
    pub fn factory(&self) -> Address {
        Self::FACTORY
    }
    pub fn pool(&self) -> Address {
        Self::POOL
    }
    pub fn operator(&self) -> Address {
        Self::OPERATOR
    }
    pub fn donor(&self) -> Address {
        Self::DONOR
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state poisoned")
    }

    pub fn timestamp(&self) -> u64 {
        self.lock().timestamp
    }

    pub fn set_timestamp(&self, timestamp: u64) {
        self.lock().timestamp = timestamp;
    }

    pub fn set_balance(&self, asset: Address, holder: Address, amount: U256) {
        self.lock().ledger.balances.insert((asset, holder), amount);
    }

    pub fn balance(&self, asset: Address, holder: Address) -> U256 {
        self.lock().ledger.balance(asset, holder)
    }

    pub fn allowance_of(&self, asset: Address, owner: Address, spender: Address) -> U256 {
        self.lock().ledger.allowance(asset, owner, spender)
    }

    pub fn seed_pool_liquidity(&self, liquidity: u128) {
        self.lock().ledger.seed_liquidity = liquidity;
    }

    pub fn suppress_increase_liquidity_event(&self, suppress: bool) {
        self.lock().suppress_increase_event = suppress;
    }

    /// Calls that reached the chain, reverted ones included
    pub fn sent_count(&self) -> usize {
        self.lock().sent
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn is_impersonating(&self, account: Address) -> bool {
        self.lock().impersonating.contains(&account)
    }

    /// Drop the operator from the node's unlocked accounts
    pub fn lock_operator(&self) {
        self.lock().unlocked.remove(&Self::OPERATOR);
    }
}

impl Ledger {
    fn balance(&self, asset: Address, holder: Address) -> U256 {
        self.balances.get(&(asset, holder)).copied().unwrap_or(U256::ZERO)
    }

    fn allowance(&self, asset: Address, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(asset, owner, spender))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    fn credit(&mut self, asset: Address, holder: Address, amount: U256) {
        *self.balances.entry((asset, holder)).or_insert(U256::ZERO) += amount;
    }

    fn move_funds(
        &mut self,
        asset: Address,
        from: Address,
        to: Address,
        amount: U256,
        logs: &mut Vec<Log>,
    ) -> Result<(), Revert> {
        let available = self.balance(asset, from);
        if available < amount {
            return Err("ERC20: transfer amount exceeds balance".to_string());
        }
        self.balances.insert((asset, from), available - amount);
        self.credit(asset, to, amount);
        logs.push(log(asset, IERC20::Transfer { from, to, value: amount }));
        Ok(())
    }

    fn transfer_from(
        &mut self,
        asset: Address,
        owner: Address,
        spender: Address,
        to: Address,
        amount: U256,
        logs: &mut Vec<Log>,
    ) -> Result<(), Revert> {
        let approved = self.allowance(asset, owner, spender);
        if approved < amount {
            return Err("STF".to_string());
        }
        if approved != U256::MAX {
            self.allowances.insert((asset, owner, spender), approved - amount);
        }
        self.move_funds(asset, owner, to, amount, logs)
            .map_err(|_| "STF".to_string())
    }

    fn pool_liquidity(&self) -> u128 {
        self.seed_liquidity + self.positions.values().map(|p| p.liquidity).sum::<u128>()
    }
}

fn log<E: SolEvent>(address: Address, event: E) -> Log {
    Log {
        address,
        data: event.encode_log_data(),
    }
}

fn is_pool(token_a: Address, token_b: Address, fee: u32) -> bool {
    let pair = if token_a < token_b {
        (token_a, token_b)
    } else {
        (token_b, token_a)
    };
    pair == (MockChain::USDC, MockChain::WETH) && fee == POOL_FEE
}

fn check_deadline(deadline: U256, now: u64) -> Result<(), Revert> {
    if deadline < U256::from(now) {
        return Err("Transaction too old".to_string());
    }
    Ok(())
}

impl MockState {
    fn execute(&mut self, call: &ContractCall) -> FlowResult<Confirmation> {
        if !self.unlocked.contains(&call.from) && !self.impersonating.contains(&call.from) {
            return Err(FlowError::Rpc(format!("No Signer available for {}", call.from)));
        }

        self.sent += 1;
        self.block += 1;
        let tx_hash = B256::left_padding_from(&self.block.to_be_bytes());

        let snapshot = self.ledger.clone();
        let mut logs = Vec::new();
        let status = match self.dispatch(call, &mut logs) {
            Ok(()) => true,
            Err(reason) => {
                debug!("mock revert in {}: {}", call.kind, reason);
                self.ledger = snapshot;
                logs.clear();
                false
            }
        };

        Ok(Confirmation {
            tx_hash,
            block_number: Some(self.block),
            gas_used: 21_000,
            status,
            logs,
        })
    }

    fn dispatch(&mut self, call: &ContractCall, logs: &mut Vec<Log>) -> Result<(), Revert> {
        let input = call.input.as_ref();
        if call.to == MockChain::NPM {
            self.position_manager(call.from, input, logs)
        } else if call.to == MockChain::ROUTER {
            self.router(call.from, input, logs)
        } else {
            self.token(call.to, call.from, call.value, input, logs)
        }
    }

    fn token(
        &mut self,
        asset: Address,
        from: Address,
        value: U256,
        input: &[u8],
        logs: &mut Vec<Log>,
    ) -> Result<(), Revert> {
        if let Ok(c) = IERC20::approveCall::abi_decode(input) {
            if c.spender == Address::ZERO {
                return Err("ERC20: approve to the zero address".to_string());
            }
            self.ledger.allowances.insert((asset, from, c.spender), c.amount);
            logs.push(log(
                asset,
                IERC20::Approval {
                    owner: from,
                    spender: c.spender,
                    value: c.amount,
                },
            ));
            return Ok(());
        }
        if let Ok(c) = IERC20::transferCall::abi_decode(input) {
            return self.ledger.move_funds(asset, from, c.to, c.amount, logs);
        }
        if IWETH9::depositCall::abi_decode(input).is_ok() && asset == MockChain::WETH {
            self.ledger.credit(asset, from, value);
            return Ok(());
        }
        Err("unsupported token call".to_string())
    }

    fn position_manager(
        &mut self,
        from: Address,
        input: &[u8],
        logs: &mut Vec<Log>,
    ) -> Result<(), Revert> {
        let npm = MockChain::NPM;

        if let Ok(c) = Npm::mintCall::abi_decode(input) {
            let p = c.params;
            check_deadline(p.deadline, self.timestamp)?;
            if p.token0 >= p.token1 || !is_pool(p.token0, p.token1, p.fee.to::<u32>()) {
                return Err("pool not initialized".to_string());
            }
            let tick_lower = i32::try_from(p.tickLower).map_err(|_| "TLM".to_string())?;
            let tick_upper = i32::try_from(p.tickUpper).map_err(|_| "TUM".to_string())?;
            if tick_lower >= tick_upper {
                return Err("TLU".to_string());
            }
            let liquidity = p.amount0Desired.min(p.amount1Desired).to::<u128>();
            if liquidity == 0 {
                return Err("zero liquidity".to_string());
            }

            self.ledger
                .transfer_from(p.token0, from, npm, npm, p.amount0Desired, logs)?;
            self.ledger
                .transfer_from(p.token1, from, npm, npm, p.amount1Desired, logs)?;

            let token_id = U256::from(self.ledger.next_token_id);
            self.ledger.next_token_id += 1;
            self.ledger.positions.insert(
                token_id,
                MockPosition {
                    owner: p.recipient,
                    token0: p.token0,
                    token1: p.token1,
                    tick_lower,
                    tick_upper,
                    liquidity,
                    principal0: p.amount0Desired,
                    principal1: p.amount1Desired,
                    owed0: U256::ZERO,
                    owed1: U256::ZERO,
                },
            );
            if !self.suppress_increase_event {
                logs.push(log(
                    npm,
                    Npm::IncreaseLiquidity {
                        tokenId: token_id,
                        liquidity,
                        amount0: p.amount0Desired,
                        amount1: p.amount1Desired,
                    },
                ));
            }
            return Ok(());
        }

        if let Ok(c) = Npm::decreaseLiquidityCall::abi_decode(input) {
            let p = c.params;
            check_deadline(p.deadline, self.timestamp)?;
            let position = self
                .ledger
                .positions
                .get_mut(&p.tokenId)
                .ok_or_else(|| "Invalid token ID".to_string())?;
            if position.owner != from {
                return Err("Not approved".to_string());
            }
            if p.liquidity == 0 || p.liquidity > position.liquidity {
                return Err("LS".to_string());
            }
            let total = U256::from(position.liquidity);
            let amount0 = position.principal0 * U256::from(p.liquidity) / total;
            let amount1 = position.principal1 * U256::from(p.liquidity) / total;
            if amount0 < p.amount0Min || amount1 < p.amount1Min {
                return Err("Price slippage check".to_string());
            }
            position.principal0 -= amount0;
            position.principal1 -= amount1;
            position.owed0 += amount0;
            position.owed1 += amount1;
            position.liquidity -= p.liquidity;
            logs.push(log(
                npm,
                Npm::DecreaseLiquidity {
                    tokenId: p.tokenId,
                    liquidity: p.liquidity,
                    amount0,
                    amount1,
                },
            ));
            return Ok(());
        }

        if let Ok(c) = Npm::collectCall::abi_decode(input) {
            let p = c.params;
            if p.amount0Max == 0 && p.amount1Max == 0 {
                return Err("zero max".to_string());
            }
            let position = self
                .ledger
                .positions
                .get_mut(&p.tokenId)
                .ok_or_else(|| "Invalid token ID".to_string())?;
            if position.owner != from {
                return Err("Not approved".to_string());
            }
            let amount0 = position.owed0.min(U256::from(p.amount0Max));
            let amount1 = position.owed1.min(U256::from(p.amount1Max));
            position.owed0 -= amount0;
            position.owed1 -= amount1;
            let (token0, token1) = (position.token0, position.token1);

            if !amount0.is_zero() {
                self.ledger.move_funds(token0, npm, p.recipient, amount0, logs)?;
            }
            if !amount1.is_zero() {
                self.ledger.move_funds(token1, npm, p.recipient, amount1, logs)?;
            }
            logs.push(log(
                npm,
                Npm::Collect {
                    tokenId: p.tokenId,
                    recipient: p.recipient,
                    amount0,
                    amount1,
                },
            ));
            return Ok(());
        }

        Err("unsupported position manager call".to_string())
    }

    fn router(&mut self, from: Address, input: &[u8], logs: &mut Vec<Log>) -> Result<(), Revert> {
        let c = ISwapRouter::exactInputSingleCall::abi_decode(input)
            .map_err(|_| "unsupported router call".to_string())?;
        let p = c.params;
        check_deadline(p.deadline, self.timestamp)?;

        let fee = p.fee.to::<u32>();
        if !is_pool(p.tokenIn, p.tokenOut, fee) {
            return Err("invalid pool".to_string());
        }
        let total_liquidity = self.ledger.pool_liquidity();
        if total_liquidity == 0 {
            return Err("no liquidity".to_string());
        }

        let fee_amount = p.amountIn * U256::from(fee) / U256::from(FEE_DENOMINATOR);
        let net_in = p.amountIn - fee_amount;
        let amount_out = if p.tokenIn == MockChain::WETH {
            net_in * U256::from(USDC_PER_WETH) / U256::from(WETH_UNIT)
        } else {
            net_in * U256::from(WETH_UNIT) / U256::from(USDC_PER_WETH)
        };
        if amount_out < p.amountOutMinimum {
            return Err("Too little received".to_string());
        }

        self.ledger
            .transfer_from(p.tokenIn, from, MockChain::ROUTER, MockChain::POOL, p.amountIn, logs)?;
        // Pool reserves are unbounded here
        self.ledger.credit(p.tokenOut, MockChain::POOL, amount_out);
        self.ledger
            .move_funds(p.tokenOut, MockChain::POOL, p.recipient, amount_out, logs)?;

        // Fees accrue to positions in proportion to their liquidity
        let token_in_is_0 = p.tokenIn == MockChain::USDC;
        let mut accrued = U256::ZERO;
        for position in self.ledger.positions.values_mut() {
            let share = fee_amount * U256::from(position.liquidity) / U256::from(total_liquidity);
            if token_in_is_0 {
                position.owed0 += share;
            } else {
                position.owed1 += share;
            }
            accrued += share;
        }
        // Backing for the fees owed by the position manager
        self.ledger
            .move_funds(p.tokenIn, MockChain::POOL, MockChain::NPM, accrued, &mut Vec::new())?;

        Ok(())
    }

    fn read(&self, to: Address, input: &[u8]) -> FlowResult<Bytes> {
        let ledger = &self.ledger;
        let out = if let Ok(c) = IERC20::balanceOfCall::abi_decode(input) {
            ledger.balance(to, c.account).abi_encode()
        } else if let Ok(c) = IERC20::allowanceCall::abi_decode(input) {
            ledger.allowance(to, c.owner, c.spender).abi_encode()
        } else if let Ok(c) = UniswapV3Factory::getPoolCall::abi_decode(input) {
            let known = is_pool(c.tokenA, c.tokenB, c.fee.to::<u32>());
            let pool = if to == MockChain::FACTORY && known {
                MockChain::POOL
            } else {
                Address::ZERO
            };
            pool.abi_encode()
        } else if UniswapV3Pool::liquidityCall::abi_decode(input).is_ok() && to == MockChain::POOL {
            ledger.pool_liquidity().abi_encode()
        } else if let Ok(c) = Npm::positionsCall::abi_decode(input) {
            let p = ledger
                .positions
                .get(&c.tokenId)
                .ok_or_else(|| FlowError::Rpc("execution reverted: Invalid token ID".to_string()))?;
            (
                U256::ZERO,
                Address::ZERO,
                p.token0,
                p.token1,
                U256::from(POOL_FEE),
                I256::try_from(i64::from(p.tick_lower)).expect("tick fits"),
                I256::try_from(i64::from(p.tick_upper)).expect("tick fits"),
                U256::from(p.liquidity),
                U256::ZERO,
                U256::ZERO,
                p.owed0,
                p.owed1,
            )
                .abi_encode_params()
        } else {
            return Err(FlowError::Rpc(format!("mock cannot answer call to {}", to)));
        };
        Ok(Bytes::from(out))
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn accounts(&self) -> FlowResult<Vec<Address>> {
        let mut accounts: Vec<Address> = self.lock().unlocked.iter().copied().collect();
        accounts.sort();
        Ok(accounts)
    }

    async fn send(&self, call: &ContractCall) -> FlowResult<Confirmation> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        // Give any concurrent submitter a chance to interleave
        tokio::task::yield_now().await;
        let result = self.lock().execute(call);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn read(&self, to: Address, input: Bytes) -> FlowResult<Bytes> {
        self.lock().read(to, &input)
    }

    async fn latest_timestamp(&self) -> FlowResult<u64> {
        Ok(self.timestamp())
    }

    async fn impersonate(&self, account: Address) -> FlowResult<()> {
        self.lock().impersonating.insert(account);
        Ok(())
    }

    async fn stop_impersonating(&self, account: Address) -> FlowResult<()> {
        self.lock().impersonating.remove(&account);
        Ok(())
    }
}
