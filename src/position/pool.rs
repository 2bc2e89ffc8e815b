//! Pool resolution through the V3 factory

use crate::chain::ChainClient;
use crate::contracts::{fee_to_u24, UniswapV3Factory, UniswapV3Pool};
use crate::error::{FlowError, FlowResult};
use crate::execution::TransactionSequencer;
use crate::types::PoolKey;
use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Deployed pool for a `PoolKey`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPool {
    pub key: PoolKey,
    pub address: Address,
    /// In-range liquidity at resolution time
    pub liquidity: u128,
}

/// Look up `key` with `getPool` and read its current liquidity.
/// Zero liquidity is only warned about; swaps against it will revert.
pub async fn resolve_pool<C: ChainClient>(
    sequencer: &TransactionSequencer<C>,
    factory: Address,
    key: &PoolKey,
) -> FlowResult<ResolvedPool> {
    let address = sequencer
        .read(
            factory,
            UniswapV3Factory::getPoolCall {
                tokenA: key.token0,
                tokenB: key.token1,
                fee: fee_to_u24(key.fee),
            },
        )
        .await?;

    if address == Address::ZERO {
        return Err(FlowError::PoolNotFound {
            token0: key.token0,
            token1: key.token1,
            fee: key.fee,
        });
    }

    let liquidity = sequencer.read(address, UniswapV3Pool::liquidityCall {}).await?;
    if liquidity == 0 {
        warn!("Pool {} at {:?} has zero in-range liquidity", key, address);
    } else {
        info!("Pool {} at {:?} | liquidity={}", key, address, liquidity);
    }

    Ok(ResolvedPool {
        key: *key,
        address,
        liquidity,
    })
}
