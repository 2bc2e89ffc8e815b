//! Liquidity position management

pub mod controller;
pub mod pool;

pub use controller::{PositionLifecycleController, ProvisionRequest};
pub use pool::{resolve_pool, ResolvedPool};
