//! Error types for the marketplace settlement core.

use crate::book::BookStatus;
use crate::ids::{BookId, RentalId, UserId};
use crate::money::Money;
use thiserror::Error;

/// Result type alias for marketplace operations
pub type Result<T> = std::result::Result<T, MarketError>;

/// Errors returned by the settlement core and the batch CLI.
///
/// Settlement failures never leave partial state behind: any error raised
/// inside a unit of work discards every staged change.
#[derive(Error, Debug)]
pub enum MarketError {
    /// Wallet balance is below the amount required
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Money, available: Money },

    /// Book status precludes the requested action
    #[error("{book} is not available (status: {status})")]
    NotAvailable { book: BookId, status: BookStatus },

    /// Actor is not allowed to perform the action
    #[error("{user} is not allowed to {reason}")]
    Forbidden { user: UserId, reason: &'static str },

    /// Referenced entity does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// A concurrent settlement changed the book after it was quoted
    #[error("{book} was modified concurrently, re-fetch and retry")]
    Conflict { book: BookId },

    /// Buyer or renter already owns the book
    #[error("{user} already owns {book}")]
    OwnBook { user: UserId, book: BookId },

    /// Amount is zero, negative or outside configured limits
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Rental length is not one of the offered periods
    #[error("Invalid rental period: {0} days (allowed: 1, 3, 7, 14, 30)")]
    InvalidRentalPeriod(u32),

    /// Rental was already returned or expired
    #[error("{0} is no longer active")]
    RentalNotActive(RentalId),

    /// Username is empty or malformed
    #[error("Invalid username: {0:?}")]
    InvalidUsername(String),

    /// Username is already registered
    #[error("Username already taken: {0}")]
    DuplicateUsername(String),

    /// Batch file reuses a book label
    #[error("Book label already listed: {0}")]
    DuplicateBookLabel(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to open or read the input file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid command record
    #[error("Invalid command at row {row}: {message}")]
    InvalidRecord { row: usize, message: String },

    /// Missing input file argument
    #[error("Missing input file argument. Usage: bookmarket <actions.csv>")]
    MissingArgument,
}

impl MarketError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        MarketError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns `true` for validation failures meant to be shown to the
    /// acting user, as opposed to infrastructure errors.
    pub fn is_user_visible(&self) -> bool {
        !matches!(
            self,
            MarketError::Config(_)
                | MarketError::Io(_)
                | MarketError::Csv(_)
                | MarketError::InvalidRecord { .. }
                | MarketError::DuplicateBookLabel(_)
                | MarketError::MissingArgument
        )
    }
}
