//! Batch replay of marketplace actions.
//!
//! Reads a CSV of actions one row at a time, runs each against a
//! [`SettlementEngine`], and writes the resulting wallet states as CSV.
//! Rejected actions and unreadable rows are logged and skipped.

use crate::book::NewBook;
use crate::command::{Command, CommandRecord};
use crate::config::MarketConfig;
use crate::engine::SettlementEngine;
use crate::error::{MarketError, Result};
use crate::ids::{BookId, UserId};
use csv::{ReaderBuilder, Trim};
use log::{debug, warn};
use std::collections::HashMap;
use std::io::{Read, Write};

/// Replays action files against one engine.
///
/// Keeps the label → id mappings the input file refers to. Output rows are
/// ordered by user id, i.e. registration order.
pub struct BatchProcessor {
    engine: SettlementEngine,
    books: HashMap<String, BookId>,
}

impl BatchProcessor {
    pub fn new(config: MarketConfig) -> Self {
        BatchProcessor {
            engine: SettlementEngine::new(config),
            books: HashMap::new(),
        }
    }

    pub fn engine(&self) -> &SettlementEngine {
        &self.engine
    }

    /// Id of the book listed under `label`, if any.
    pub fn book_id(&self, label: &str) -> Option<BookId> {
        self.books.get(label).copied()
    }

    /// Processes actions from a CSV reader in streaming fashion.
    pub fn process_csv<R: Read>(&mut self, reader: R) -> Result<()> {
        let mut csv_reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        for (row_idx, result) in csv_reader.deserialize::<CommandRecord>().enumerate() {
            let row_num = row_idx + 2; // 1-indexed, accounting for header row

            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!("Row {}: CSV parse error: {}", row_num, e);
                    continue;
                }
            };

            let command = match record.parse() {
                Ok(command) => command,
                Err(message) => {
                    warn!(
                        "{}",
                        MarketError::InvalidRecord {
                            row: row_num,
                            message
                        }
                    );
                    continue;
                }
            };

            if let Err(e) = self.apply(command) {
                if e.is_user_visible() {
                    debug!("Row {}: rejected: {}", row_num, e);
                } else {
                    warn!("Row {}: {}", row_num, e);
                }
            }
        }

        Ok(())
    }

    /// Runs a single parsed command.
    pub fn apply(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Register { user } => {
                self.engine.register_student(&user)?;
            }
            Command::Admin { user } => {
                if user != self.engine.config().bootstrap_admin {
                    return Err(MarketError::Config(format!(
                        "{} is not the configured bootstrap admin",
                        user
                    )));
                }
                self.engine.bootstrap_admin()?;
            }
            Command::Promote { admin, target } => {
                let admin = self.user_id(&admin)?;
                let target = self.user_id(&target)?;
                self.engine.promote_to_admin(admin, target)?;
            }
            Command::SetActive {
                admin,
                target,
                active,
            } => {
                let admin = self.user_id(&admin)?;
                let target = self.user_id(&target)?;
                self.engine.set_user_active(admin, target, active)?;
            }
            Command::Deposit { user, amount } => {
                let user = self.user_id(&user)?;
                let wallet = self.engine.wallet_of(user)?;
                self.engine.add_funds(wallet.id, amount)?;
            }
            Command::List {
                user,
                book,
                price,
                fee,
            } => {
                if self.books.contains_key(&book) {
                    return Err(MarketError::DuplicateBookLabel(book));
                }
                let user = self.user_id(&user)?;
                let listed = self
                    .engine
                    .list_book(user, NewBook::new(book.clone(), String::new(), price, fee))?;
                self.books.insert(book, listed.id);
            }
            Command::Purchase { user, book } => {
                let user = self.user_id(&user)?;
                let book = self.known_book(&book)?;
                self.engine.purchase(user, book)?;
            }
            Command::Rent { user, book, days } => {
                let user = self.user_id(&user)?;
                let book = self.known_book(&book)?;
                self.engine.rent(user, book, days)?;
            }
            Command::Return { user, book } => {
                let user = self.user_id(&user)?;
                let book = self.known_book(&book)?;
                let rental = self
                    .engine
                    .store()
                    .rentals()
                    .into_iter()
                    .find(|r| r.book_id == book && r.renter_id == user && r.is_active())
                    .ok_or_else(|| MarketError::not_found("active rental of", book))?;
                self.engine.return_rental(user, rental.id)?;
            }
        }
        Ok(())
    }

    fn user_id(&self, username: &str) -> Result<UserId> {
        self.engine
            .store()
            .user_by_username(username)
            .map(|u| u.id)
            .ok_or_else(|| MarketError::not_found("user", username))
    }

    fn known_book(&self, label: &str) -> Result<BookId> {
        self.book_id(label)
            .ok_or_else(|| MarketError::not_found("book labelled", label))
    }

    /// Writes final wallet states to CSV.
    ///
    /// One row per wallet, ordered by owner id. Amounts carry 2 decimals.
    pub fn write_output<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["user", "balance", "spent", "earned", "purchases", "rentals"])?;

        let mut wallets = self.engine.store().wallets();
        wallets.sort_by_key(|w| w.user_id);

        for wallet in wallets {
            let user = self.engine.store().user(wallet.user_id)?;
            let summary = self.engine.wallet_summary(wallet.user_id)?;
            csv_writer.write_record([
                user.username,
                summary.balance.to_string(),
                summary.total_spent.to_string(),
                summary.total_earnings.to_string(),
                summary.purchase_count.to_string(),
                summary.rental_count.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

impl Default for BatchProcessor {
    fn default() -> Self {
        Self::new(MarketConfig::default())
    }
}
