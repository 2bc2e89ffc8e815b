//! Call execution
//!
//! Submission/confirmation primitive and the components built on it.

pub mod approval;
pub mod funding;
pub mod sequencer;
pub mod swap;

pub use approval::ApprovalManager;
pub use funding::{Funder, FundingPlan, FundingReceipts};
pub use sequencer::{decode_events, extract_event, BalanceWatch, TransactionSequencer};
pub use swap::{SwapExecutor, SwapOutcome};
