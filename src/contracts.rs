//! Contract Definitions
//!
//! Solidity interfaces used by the liquidity/swap workflow, defined with
//! alloy's `sol!` macro. Calls are ABI-encoded here and routed through a
//! `ChainClient`, so no `#[sol(rpc)]` instance types are generated.
//!
//! Mainnet deployments (forked locally):
//!     - NonfungiblePositionManager 0xC36442b4a4522E871399CD717aBDD847Ab11FE88
//!     - SwapRouter                 0xE592427A0AEce92De3Edee1F18E0157C05861564
//!     - UniswapV3Factory           0x1F98431c8aD98523631AE4a59f267346ea31F984

use alloy::primitives::aliases::{I24, U24};
use alloy::sol;

// ── ERC20 ─────────────────────────────────────────────────────────────

sol! {
    interface IERC20 {
        event Transfer(address indexed from, address indexed to, uint256 value);
        event Approval(address indexed owner, address indexed spender, uint256 value);

        function approve(address spender, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

sol! {
    interface IWETH9 {
        function deposit() external payable;
    }
}

// ── Uniswap V3 core ──────────────────────────────────────────────────

sol! {
    interface UniswapV3Factory {
        function getPool(address tokenA, address tokenB, uint24 fee) external view returns (address pool);
    }
}

sol! {
    interface UniswapV3Pool {
        function liquidity() external view returns (uint128);
    }
}

// ── Uniswap V3 periphery ─────────────────────────────────────────────

sol! {
    interface INonfungiblePositionManager {
        struct MintParams {
            address token0;
            address token1;
            uint24 fee;
            int24 tickLower;
            int24 tickUpper;
            uint256 amount0Desired;
            uint256 amount1Desired;
            uint256 amount0Min;
            uint256 amount1Min;
            address recipient;
            uint256 deadline;
        }

        struct DecreaseLiquidityParams {
            uint256 tokenId;
            uint128 liquidity;
            uint256 amount0Min;
            uint256 amount1Min;
            uint256 deadline;
        }

        struct CollectParams {
            uint256 tokenId;
            address recipient;
            uint128 amount0Max;
            uint128 amount1Max;
        }

        event IncreaseLiquidity(uint256 indexed tokenId, uint128 liquidity, uint256 amount0, uint256 amount1);
        event DecreaseLiquidity(uint256 indexed tokenId, uint128 liquidity, uint256 amount0, uint256 amount1);
        event Collect(uint256 indexed tokenId, address recipient, uint256 amount0, uint256 amount1);

        function mint(MintParams calldata params) external payable returns (uint256 tokenId, uint128 liquidity, uint256 amount0, uint256 amount1);
        function positions(uint256 tokenId) external view returns (uint96 nonce, address operator, address token0, address token1, uint24 fee, int24 tickLower, int24 tickUpper, uint128 liquidity, uint256 feeGrowthInside0LastX128, uint256 feeGrowthInside1LastX128, uint128 tokensOwed0, uint128 tokensOwed1);
        function decreaseLiquidity(DecreaseLiquidityParams calldata params) external payable returns (uint256 amount0, uint256 amount1);
        function collect(CollectParams calldata params) external payable returns (uint256 amount0, uint256 amount1);
    }
}

sol! {
    interface ISwapRouter {
        struct ExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint24 fee;
            address recipient;
            uint256 deadline;
            uint256 amountIn;
            uint256 amountOutMinimum;
            uint160 sqrtPriceLimitX96;
        }

        function exactInputSingle(ExactInputSingleParams calldata params) external payable returns (uint256 amountOut);
    }
}

/// Convert a u32 fee tier to the `uint24` type used in call params.
/// Uses from_limbs() because Uint<24, 1> doesn't impl From<u32>.
pub fn fee_to_u24(fee: u32) -> U24 {
    debug_assert!(fee <= 0xFFFFFF, "fee {} exceeds U24 max (16777215)", fee);
    U24::from_limbs([fee as u64])
}

/// Convert a tick to `int24`, rejecting values outside the type's range.
pub fn tick_to_i24(tick: i32) -> Option<I24> {
    I24::try_from(tick).ok()
}

/// `int24` tick read back from a call result
pub fn tick_from_i24(tick: I24) -> Option<i32> {
    i32::try_from(tick).ok()
}
