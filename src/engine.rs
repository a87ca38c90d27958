//! Settlement engine.
//!
//! Turns purchase and rental requests into one consistent set of mutations:
//! buyer debit, owner credit, ledger entry, optional rental window and book
//! status change. Each request runs as a single [`UnitOfWork`]; any failure
//! discards the whole unit.
//!
//! Requests are priced from a quote (a snapshot of the book taken before the
//! unit opens). Inside the unit the book is re-read under the store lock: a
//! book that is no longer available fails with `NotAvailable`, one that is
//! still available but changed since the quote fails with `Conflict`.

use crate::book::{Book, BookStatus, NewBook};
use crate::config::MarketConfig;
use crate::error::{MarketError, Result};
use crate::ids::{BookId, RentalId, TransactionId, UserId, WalletId};
use crate::money::Money;
use crate::rental::{Rental, RentalPeriod};
use crate::store::{LedgerStore, UnitOfWork};
use crate::transaction::{Transaction, TxType};
use crate::user::{Role, User};
use crate::wallet::Wallet;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

/// Number of entries shown as recent activity on the admin dashboard.
const RECENT_ACTIVITY: usize = 5;

/// Ids produced by a successful rental.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RentalReceipt {
    pub transaction_id: TransactionId,
    pub rental_id: RentalId,
    pub end: DateTime<Utc>,
}

/// Wallet page figures for one student.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletSummary {
    pub balance: Money,
    /// Sum of everything the student paid.
    pub total_spent: Money,
    pub purchase_count: usize,
    pub rental_count: usize,
    /// Sum of everything paid to the student for books they owned.
    pub total_earnings: Money,
}

/// Admin dashboard figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub users: usize,
    pub books: usize,
    pub transactions: usize,
    pub active_rentals: usize,
    /// Newest entries first.
    pub recent: Vec<Transaction>,
}

/// The marketplace settlement engine.
///
/// Owns the [`LedgerStore`]. Share it across request threads behind an
/// `Arc`; all methods take `&self`.
#[derive(Debug, Default)]
pub struct SettlementEngine {
    store: LedgerStore,
    config: MarketConfig,
}

impl SettlementEngine {
    pub fn new(config: MarketConfig) -> Self {
        SettlementEngine {
            store: LedgerStore::new(),
            config,
        }
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Registers a student together with an empty wallet.
    pub fn register_student(&self, username: &str) -> Result<User> {
        let username = valid_username(username)?;
        let user = self.store.atomically(|uow| {
            ensure_username_free(uow, username)?;
            let user = uow.insert_user(username, Role::Student);
            uow.insert_wallet(user.id);
            Ok(user)
        })?;

        info!("Registered student {} as {}", user.username, user.id);
        Ok(user)
    }

    /// Creates the configured bootstrap administrator, or returns it if it
    /// already exists.
    pub fn bootstrap_admin(&self) -> Result<User> {
        let username = valid_username(&self.config.bootstrap_admin)?;
        self.store.atomically(|uow| match uow.user_by_username(username) {
            Some(existing) if existing.is_admin() => Ok(existing),
            Some(_) => Err(MarketError::DuplicateUsername(username.to_string())),
            None => {
                let user = uow.insert_user(username, Role::Admin);
                info!("Bootstrapped administrator {} as {}", user.username, user.id);
                Ok(user)
            }
        })
    }

    /// Grants the admin role. Only an active admin may do so.
    ///
    /// A promoted student keeps their wallet record, but admins cannot
    /// trade, so the balance is frozen from then on.
    pub fn promote_to_admin(&self, admin: UserId, target: UserId) -> Result<User> {
        self.store.atomically(|uow| {
            require_admin(&uow.user(admin)?, "grant the admin role")?;
            let mut user = uow.user(target)?;
            user.role = Role::Admin;
            uow.put_user(user.clone());
            info!("{} promoted {} to admin", admin, target);
            Ok(user)
        })
    }

    /// Activates or deactivates an account.
    pub fn set_user_active(&self, admin: UserId, target: UserId, active: bool) -> Result<User> {
        self.store.atomically(|uow| {
            require_admin(&uow.user(admin)?, "change account status")?;
            if admin == target && !active {
                return Err(MarketError::Forbidden {
                    user: admin,
                    reason: "deactivate their own account",
                });
            }
            let mut user = uow.user(target)?;
            user.active = active;
            uow.put_user(user.clone());
            info!(
                "{} {} {}",
                admin,
                if active { "activated" } else { "deactivated" },
                target
            );
            Ok(user)
        })
    }

    /// Removes a user, their wallet and the books they currently own.
    ///
    /// Books out on rental block the deletion. Ledger entries are kept.
    pub fn delete_user(&self, admin: UserId, target: UserId) -> Result<()> {
        self.store.atomically(|uow| {
            require_admin(&uow.user(admin)?, "delete accounts")?;
            if admin == target {
                return Err(MarketError::Forbidden {
                    user: admin,
                    reason: "delete their own account",
                });
            }
            let user = uow.user(target)?;

            let owned = uow.books_owned_by(target);
            if let Some(rented) = owned.iter().find(|b| b.status == BookStatus::Rented) {
                return Err(MarketError::NotAvailable {
                    book: rented.id,
                    status: rented.status,
                });
            }
            for book in &owned {
                uow.delete_book(book.id);
            }
            if let Ok(wallet) = uow.wallet_for_user(target) {
                uow.delete_wallet(wallet.id);
            }
            uow.delete_user(target);

            info!(
                "{} deleted {} ({}) with {} owned books",
                admin,
                target,
                user.username,
                owned.len()
            );
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    /// Lists a book for sale and rent. Students only.
    pub fn list_book(&self, actor: UserId, listing: NewBook) -> Result<Book> {
        ensure_listing_prices(listing.price, listing.rental_fee)?;
        let book = self.store.atomically(|uow| {
            require_trader(&uow.user(actor)?, "list books")?;
            Ok(uow.insert_book(actor, listing))
        })?;

        info!(
            "{} listed {} ({:?}) at {} / {} per day",
            actor, book.id, book.title, book.price, book.rental_fee
        );
        Ok(book)
    }

    /// Changes the price and daily fee of an available book. Owner only.
    pub fn reprice(
        &self,
        actor: UserId,
        book_id: BookId,
        price: Money,
        rental_fee: Money,
    ) -> Result<Book> {
        ensure_listing_prices(price, rental_fee)?;
        self.store.atomically(|uow| {
            require_trader(&uow.user(actor)?, "reprice books")?;
            let mut book = uow.book(book_id)?;
            if book.owner_id != actor {
                return Err(MarketError::Forbidden {
                    user: actor,
                    reason: "reprice a book they do not own",
                });
            }
            ensure_available(&book)?;
            book.price = price;
            book.rental_fee = rental_fee;
            book.updated_at = Utc::now();
            uow.put_book(book.clone());
            debug!("{} repriced {} to {} / {}", actor, book_id, price, rental_fee);
            Ok(book)
        })
    }

    /// Removes a listing. Owner or admin; rented books cannot be removed.
    pub fn delete_book(&self, actor: UserId, book_id: BookId) -> Result<()> {
        self.store.atomically(|uow| {
            let user = uow.user(actor)?;
            let book = uow.book(book_id)?;
            if !(user.is_admin() || (user.can_trade() && book.owner_id == actor)) {
                return Err(MarketError::Forbidden {
                    user: actor,
                    reason: "delete a book they do not own",
                });
            }
            if book.status == BookStatus::Rented {
                return Err(MarketError::NotAvailable {
                    book: book_id,
                    status: book.status,
                });
            }
            uow.delete_book(book_id);
            info!("{} deleted {}", actor, book_id);
            Ok(())
        })
    }

    /// Snapshot of a book as currently listed.
    pub fn quote(&self, book_id: BookId) -> Result<Book> {
        self.store.book(book_id)
    }

    /// Books open for purchase or rental, ordered by id.
    pub fn catalog(&self) -> Vec<Book> {
        self.store
            .books()
            .into_iter()
            .filter(Book::is_available)
            .collect()
    }

    pub fn books_owned_by(&self, owner: UserId) -> Vec<Book> {
        self.store
            .books()
            .into_iter()
            .filter(|b| b.owner_id == owner)
            .collect()
    }

    // ------------------------------------------------------------------
    // Wallets
    // ------------------------------------------------------------------

    /// Deposits into a wallet and returns the new balance.
    pub fn add_funds(&self, wallet_id: WalletId, amount: Money) -> Result<Money> {
        self.config.check_deposit(amount)?;
        let balance = self.store.atomically(|uow| {
            let mut wallet = uow.wallet(wallet_id)?;
            let balance = wallet.credit(amount)?;
            uow.put_wallet(wallet);
            Ok(balance)
        })?;

        info!("Added {} to {}, balance {}", amount, wallet_id, balance);
        Ok(balance)
    }

    /// The wallet of a student. Admins have none.
    pub fn wallet_of(&self, user: UserId) -> Result<Wallet> {
        let user = self.store.user(user)?;
        require_trader(&user, "hold a wallet")?;
        self.store.wallet_for_user(user.id)
    }

    // ------------------------------------------------------------------
    // Settlement
    // ------------------------------------------------------------------

    /// Buys a book at its current price.
    pub fn purchase(&self, actor: UserId, book_id: BookId) -> Result<TransactionId> {
        self.purchase_at(actor, book_id, Utc::now())
    }

    pub fn purchase_at(
        &self,
        actor: UserId,
        book_id: BookId,
        now: DateTime<Utc>,
    ) -> Result<TransactionId> {
        self.check_actor(actor, "purchase books")?;
        let quote = self.quote(book_id)?;
        self.purchase_quoted_at(actor, &quote, now)
    }

    /// Buys a book at the price shown in `quote`.
    pub fn purchase_quoted(&self, actor: UserId, quote: &Book) -> Result<TransactionId> {
        self.purchase_quoted_at(actor, quote, Utc::now())
    }

    fn purchase_quoted_at(
        &self,
        actor: UserId,
        quote: &Book,
        now: DateTime<Utc>,
    ) -> Result<TransactionId> {
        let result = self.store.atomically(|uow| {
            let mut book = checkout(uow, actor, quote, "purchase books")?;
            let seller = book.owner_id;
            let price = book.price;

            transfer(uow, actor, seller, price)?;
            let tx = uow.insert_transaction(actor, seller, book.id, price, TxType::Purchase, now);

            book.status = BookStatus::Sold;
            book.owner_id = actor;
            book.updated_at = now;
            uow.put_book(book);

            Ok((tx.id(), seller, price))
        });

        match result {
            Ok((tx_id, seller, price)) => {
                info!(
                    "{}: {} bought {} from {} for {}",
                    tx_id, actor, quote.id, seller, price
                );
                Ok(tx_id)
            }
            Err(e) => {
                debug!("Purchase of {} by {} rejected: {}", quote.id, actor, e);
                Err(e)
            }
        }
    }

    /// Rents a book for `days` days (1, 3, 7, 14 or 30).
    pub fn rent(&self, actor: UserId, book_id: BookId, days: u32) -> Result<RentalReceipt> {
        self.rent_at(actor, book_id, days, Utc::now())
    }

    pub fn rent_at(
        &self,
        actor: UserId,
        book_id: BookId,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<RentalReceipt> {
        self.check_actor(actor, "rent books")?;
        let period = RentalPeriod::try_from(days)?;
        let quote = self.quote(book_id)?;
        self.rent_quoted_at(actor, &quote, period, now)
    }

    /// Rents a book at the daily fee shown in `quote`.
    pub fn rent_quoted(
        &self,
        actor: UserId,
        quote: &Book,
        period: RentalPeriod,
    ) -> Result<RentalReceipt> {
        self.rent_quoted_at(actor, quote, period, Utc::now())
    }

    fn rent_quoted_at(
        &self,
        actor: UserId,
        quote: &Book,
        period: RentalPeriod,
        now: DateTime<Utc>,
    ) -> Result<RentalReceipt> {
        let result = self.store.atomically(|uow| {
            let mut book = checkout(uow, actor, quote, "rent books")?;
            let owner = book.owner_id;
            let total = book.rental_cost(period.days()).ok_or_else(|| {
                MarketError::InvalidAmount(format!(
                    "{} per day for {} overflows",
                    book.rental_fee, period
                ))
            })?;

            transfer(uow, actor, owner, total)?;
            let tx = uow.insert_transaction(actor, owner, book.id, total, TxType::Rental, now);
            let rental = uow.insert_rental(&tx, period, now);

            book.status = BookStatus::Rented;
            book.updated_at = now;
            uow.put_book(book);

            Ok((
                RentalReceipt {
                    transaction_id: tx.id(),
                    rental_id: rental.id,
                    end: rental.end,
                },
                total,
            ))
        });

        match result {
            Ok((receipt, total)) => {
                info!(
                    "{}: {} rented {} for {} ({}), due {}",
                    receipt.transaction_id, actor, quote.id, period, total, receipt.end
                );
                Ok(receipt)
            }
            Err(e) => {
                debug!("Rental of {} by {} rejected: {}", quote.id, actor, e);
                Err(e)
            }
        }
    }

    /// Ends a rental early and puts the book back on the catalog.
    ///
    /// Allowed for the renter and for admins. No money moves.
    pub fn return_rental(&self, actor: UserId, rental_id: RentalId) -> Result<Rental> {
        self.return_rental_at(actor, rental_id, Utc::now())
    }

    pub fn return_rental_at(
        &self,
        actor: UserId,
        rental_id: RentalId,
        now: DateTime<Utc>,
    ) -> Result<Rental> {
        self.store.atomically(|uow| {
            let user = uow.user(actor)?;
            let mut rental = uow.rental(rental_id)?;
            if !user.is_admin() && rental.renter_id != actor {
                return Err(MarketError::Forbidden {
                    user: actor,
                    reason: "return a rental they do not hold",
                });
            }
            rental.mark_returned(now)?;
            release_book(uow, rental.book_id, now)?;
            uow.put_rental(rental.clone());
            info!("{} returned {} ({})", actor, rental_id, rental.book_id);
            Ok(rental)
        })
    }

    /// Expires every active rental whose window has ended by `now` and
    /// puts the books back on the catalog. Returns the number expired.
    ///
    /// Each rental is closed in its own unit of work, so a failure on one
    /// does not hold back the rest.
    pub fn reconcile_expired(&self, now: DateTime<Utc>) -> usize {
        let due: Vec<RentalId> = self
            .store
            .rentals()
            .into_iter()
            .filter(|r| r.has_lapsed(now))
            .map(|r| r.id)
            .collect();

        let mut expired = 0;
        for rental_id in due {
            let outcome = self.store.atomically(|uow| {
                let mut rental = uow.rental(rental_id)?;
                if !rental.has_lapsed(now) {
                    return Ok(false);
                }
                rental.mark_expired(now)?;
                release_book(uow, rental.book_id, now)?;
                uow.put_rental(rental);
                Ok(true)
            });

            match outcome {
                Ok(true) => {
                    debug!("Expired {}", rental_id);
                    expired += 1;
                }
                Ok(false) => {}
                Err(e) => warn!("Could not expire {}: {}", rental_id, e),
            }
        }

        if expired > 0 {
            info!("Reconciliation expired {} rentals", expired);
        }
        expired
    }

    // ------------------------------------------------------------------
    // Reports
    // ------------------------------------------------------------------

    pub fn transaction(&self, id: TransactionId) -> Result<Transaction> {
        self.store.transaction(id)
    }

    pub fn rental(&self, id: RentalId) -> Result<Rental> {
        self.store.rental(id)
    }

    /// Students see what they paid for, admins see the whole ledger.
    /// Newest first.
    pub fn transaction_history(&self, actor: UserId) -> Result<Vec<Transaction>> {
        let user = self.store.user(actor)?;
        let mut history: Vec<Transaction> = self
            .store
            .transactions()
            .into_iter()
            .filter(|t| user.is_admin() || t.payer() == actor)
            .collect();
        history.sort_by_key(|t| std::cmp::Reverse((t.created_at(), t.id())));
        Ok(history)
    }

    pub fn wallet_summary(&self, user: UserId) -> Result<WalletSummary> {
        let wallet = self.store.wallet_for_user(user)?;
        let ledger = self.store.transactions();

        let paid: Vec<&Transaction> = ledger.iter().filter(|t| t.payer() == user).collect();

        Ok(WalletSummary {
            balance: wallet.balance(),
            total_spent: paid.iter().map(|t| t.amount()).sum(),
            purchase_count: paid.iter().filter(|t| t.kind() == TxType::Purchase).count(),
            rental_count: paid.iter().filter(|t| t.kind() == TxType::Rental).count(),
            total_earnings: ledger
                .iter()
                .filter(|t| t.payee() == user)
                .map(|t| t.amount())
                .sum(),
        })
    }

    pub fn dashboard(&self, admin: UserId) -> Result<DashboardStats> {
        require_admin(&self.store.user(admin)?, "view the dashboard")?;
        let mut recent = self.transaction_history(admin)?;
        let transactions = recent.len();
        recent.truncate(RECENT_ACTIVITY);

        Ok(DashboardStats {
            users: self.store.users().len(),
            books: self.store.books().len(),
            transactions,
            active_rentals: self
                .store
                .rentals()
                .iter()
                .filter(|r| r.is_active())
                .count(),
            recent,
        })
    }

    /// Rejects admins and inactive users before any book is read.
    fn check_actor(&self, actor: UserId, action: &'static str) -> Result<()> {
        let user = self.store.user(actor)?;
        require_trader(&user, action).map_err(|e| {
            debug!("{} refused: {}", actor, e);
            e
        })
    }
}

/// Re-validates actor and book inside the unit and returns the locked book.
fn checkout(
    uow: &UnitOfWork<'_>,
    actor: UserId,
    quote: &Book,
    action: &'static str,
) -> Result<Book> {
    require_trader(&uow.user(actor)?, action)?;
    let book = uow.book(quote.id)?;
    ensure_available(&book)?;
    if book.version != quote.version {
        return Err(MarketError::Conflict { book: book.id });
    }
    if book.owner_id == actor {
        return Err(MarketError::OwnBook {
            user: actor,
            book: book.id,
        });
    }
    Ok(book)
}

/// Moves `amount` from the payer's wallet to the payee's. Zero amounts move
/// nothing.
fn transfer(uow: &mut UnitOfWork<'_>, payer: UserId, payee: UserId, amount: Money) -> Result<()> {
    let mut from = uow.wallet_for_user(payer)?;
    let mut to = uow.wallet_for_user(payee)?;
    if amount.is_zero() {
        return Ok(());
    }
    from.debit(amount)?;
    to.credit(amount)?;
    uow.put_wallet(from);
    uow.put_wallet(to);
    Ok(())
}

fn release_book(uow: &mut UnitOfWork<'_>, book_id: BookId, now: DateTime<Utc>) -> Result<()> {
    let mut book = uow.book(book_id)?;
    if book.status == BookStatus::Rented {
        book.status = BookStatus::Available;
        book.updated_at = now;
        uow.put_book(book);
    }
    Ok(())
}

fn require_trader(user: &User, action: &'static str) -> Result<()> {
    if user.can_trade() {
        Ok(())
    } else {
        Err(MarketError::Forbidden {
            user: user.id,
            reason: action,
        })
    }
}

fn require_admin(user: &User, action: &'static str) -> Result<()> {
    if user.is_admin() && user.active {
        Ok(())
    } else {
        Err(MarketError::Forbidden {
            user: user.id,
            reason: action,
        })
    }
}

fn ensure_available(book: &Book) -> Result<()> {
    if book.is_available() {
        Ok(())
    } else {
        Err(MarketError::NotAvailable {
            book: book.id,
            status: book.status,
        })
    }
}

fn ensure_listing_prices(price: Money, rental_fee: Money) -> Result<()> {
    if price.is_negative() || rental_fee.is_negative() {
        return Err(MarketError::InvalidAmount(format!(
            "price {} and rental fee {} must not be negative",
            price, rental_fee
        )));
    }
    Ok(())
}

fn valid_username(raw: &str) -> Result<&str> {
    let name = raw.trim();
    if name.is_empty() || name.len() > 64 || name.contains(char::is_whitespace) {
        return Err(MarketError::InvalidUsername(raw.to_string()));
    }
    Ok(name)
}

fn ensure_username_free(uow: &UnitOfWork<'_>, username: &str) -> Result<()> {
    if uow.user_by_username(username).is_some() {
        return Err(MarketError::DuplicateUsername(username.to_string()));
    }
    Ok(())
}
