//! # Bookmarket
//!
//! Settlement core of a university book marketplace. Students list books,
//! buy or rent each other's books with an internal wallet balance, and
//! administrators moderate accounts.
//!
//! ## Design Principles
//!
//! - **Fixed-point money**: 2 decimal places via `rust_decimal`
//! - **Atomic settlement**: every purchase or rental commits its wallet,
//!   ledger, rental and book changes together or not at all
//! - **Strict invariants**: wallet balances never go negative; ledger entries
//!   are never modified once written
//! - **Serialized books**: a book is sold or rented at most once, the loser of
//!   a race gets `NotAvailable` or `Conflict`
//!
//! ## Example
//!
//! ```
//! use bookmarket::{Money, NewBook, SettlementEngine};
//!
//! let engine = SettlementEngine::default();
//! let alice = engine.register_student("alice").unwrap();
//! let bob = engine.register_student("bob").unwrap();
//!
//! let wallet = engine.wallet_of(alice.id).unwrap();
//! engine.add_funds(wallet.id, Money::from_units(50)).unwrap();
//!
//! let book = engine
//!     .list_book(bob.id, NewBook::new("SICP", "Abelson", Money::from_units(30), Money::from_units(1)))
//!     .unwrap();
//! engine.purchase(alice.id, book.id).unwrap();
//!
//! assert_eq!(engine.wallet_of(alice.id).unwrap().balance(), Money::from_units(20));
//! ```

pub mod batch;
pub mod book;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod ids;
pub mod money;
pub mod rental;
pub mod store;
pub mod transaction;
pub mod user;
pub mod wallet;

pub use batch::BatchProcessor;
pub use book::{Book, BookStatus, NewBook};
pub use command::{Command, CommandRecord};
pub use config::MarketConfig;
pub use engine::{DashboardStats, RentalReceipt, SettlementEngine, WalletSummary};
pub use error::{MarketError, Result};
pub use ids::{BookId, RentalId, TransactionId, UserId, WalletId};
pub use money::Money;
pub use rental::{Rental, RentalPeriod, RentalState};
pub use store::{LedgerStore, UnitOfWork};
pub use transaction::{Transaction, TxStatus, TxType};
pub use user::{Role, User};
pub use wallet::Wallet;
