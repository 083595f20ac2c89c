//! The module contains the errors the engine can return.
//!
//! Invalid inputs *inside* a computation (a weight for a non-participant, a
//! zero weight sum) never surface here: the split calculator falls back to a
//! zero share. These errors are for record validation and for the
//! consistency checks the calling layer must honor before mutating a group:
//!
//! - [`MemberNotInGroup`] a record references someone who left the group.
//! - [`OutstandingBalance`] a member or group still has money to settle.
//!
//!  [`MemberNotInGroup`]: EngineError::MemberNotInGroup
//!  [`OutstandingBalance`]: EngineError::OutstandingBalance
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid split: {0}")]
    InvalidSplit(String),
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),
    #[error("\"{0}\" is not a member of the group")]
    MemberNotInGroup(String),
    #[error("Outstanding balance: {0}")]
    OutstandingBalance(String),
    #[error("Inactive record: {0}")]
    InactiveRecord(String),
    #[error("Record already active: {0}")]
    ActiveRecord(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
}
