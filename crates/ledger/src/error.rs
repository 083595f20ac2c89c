//! Errors surfaced by the ledger service.
//!
//! - [`StoreError`]: the persistence port failed or refused a write.
//! - [`NotifyError`]: a notice could not be delivered.
//! - [`LedgerError`]: what callers of [`crate::Ledger`] see, wrapping the
//!   above plus [`EngineError`] for rejected records.
use engine::EngineError;
use thiserror::Error;

/// Errors raised by a [`crate::GroupStore`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("\"{0}\" not found")]
    NotFound(String),
    #[error("\"{0}\" already exists")]
    AlreadyExists(String),
    /// The document changed since it was read.
    #[error("version conflict on \"{id}\": expected {expected}, found {found}")]
    Conflict { id: String, expected: u64, found: u64 },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by a [`crate::Notifier`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notifier unavailable: {0}")]
    Unavailable(String),
    #[error("notice rejected: {0}")]
    Rejected(String),
}

/// Ledger service errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl PartialEq for LedgerError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Engine(a), Self::Engine(b)) => a == b,
            (Self::Store(a), Self::Store(b)) => a == b,
            (Self::Config(a), Self::Config(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

/// Errors worth another attempt.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Unavailable(_))
    }
}

impl Transient for NotifyError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl Transient for LedgerError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Store(err) => err.is_transient(),
            _ => false,
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
