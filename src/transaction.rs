//! Transaction contracts
//!
//! Transactions belong to the storage connection; this crate only
//! orchestrates them. A repository asks its [`TransactionProvider`] for a
//! [`TransactionHandle`] at the start of a save or delete, commits it on
//! success, and rolls it back on any failure. At most one transaction may be
//! open per repository at a time; a second `begin` is a programming error,
//! never retried or queued.

use std::fmt;

/// Transaction error type.
#[derive(Debug, Clone)]
pub enum TransactionError {
    /// A transaction is already open on this repository.
    AlreadyStarted(String),
    /// Commit or rollback was requested with no transaction open.
    NotStarted(String),
    /// The handle was already committed or rolled back.
    TransactionClosed,
    /// Transactions are enabled but no provider is configured.
    NoProvider(String),
    /// The underlying connection failed.
    Provider(String),
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionError::AlreadyStarted(owner) => {
                write!(
                    f,
                    "transaction already started, unable to start another one in {owner}"
                )
            }
            TransactionError::NotStarted(owner) => {
                write!(f, "transaction should be started first in {owner}")
            }
            TransactionError::TransactionClosed => {
                write!(f, "transaction has already been committed or rolled back")
            }
            TransactionError::NoProvider(owner) => {
                write!(f, "transactions enabled but no provider configured in {owner}")
            }
            TransactionError::Provider(s) => write!(f, "transaction provider error: {s}"),
        }
    }
}

impl std::error::Error for TransactionError {}

/// Opens transactions on a single storage connection.
pub trait TransactionProvider {
    /// Begin a new local transaction.
    fn begin(&self) -> Result<Box<dyn TransactionHandle>, TransactionError>;
}

/// An open transaction.
///
/// A handle is single-shot: after a successful commit or rollback every
/// further call must answer [`TransactionError::TransactionClosed`].
pub trait TransactionHandle {
    fn commit(&mut self) -> Result<(), TransactionError>;

    fn rollback(&mut self) -> Result<(), TransactionError>;
}
