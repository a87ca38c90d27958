//! In-memory ledger store.
//!
//! Holds users, wallets, books, transactions and rentals behind a single
//! lock. Every multi-entity mutation goes through a [`UnitOfWork`]: changes
//! are staged while the lock is held and applied together on
//! [`UnitOfWork::commit`]. Dropping a unit without committing discards them,
//! so a failed settlement leaves nothing behind.

use crate::book::{Book, NewBook};
use crate::error::{MarketError, Result};
use crate::ids::{BookId, RentalId, TransactionId, UserId, WalletId};
use crate::money::Money;
use crate::rental::{Rental, RentalPeriod};
use crate::transaction::{Transaction, TxType};
use crate::user::{Role, User};
use crate::wallet::Wallet;
use chrono::{DateTime, Utc};
use log::debug;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

/// Last id handed out per entity kind.
#[derive(Debug, Clone, Copy, Default)]
struct Sequences {
    user: u32,
    wallet: u32,
    book: u32,
    transaction: u32,
    rental: u32,
}

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    wallets: HashMap<WalletId, Wallet>,
    books: HashMap<BookId, Book>,
    transactions: HashMap<TransactionId, Transaction>,
    rentals: HashMap<RentalId, Rental>,

    usernames: HashMap<String, UserId>,
    wallet_by_user: HashMap<UserId, WalletId>,
    rental_by_transaction: HashMap<TransactionId, RentalId>,

    seq: Sequences,
}

/// Thread-safe ledger store.
///
/// Units of work are serialized by the store lock, which makes every
/// settlement see the latest committed book and wallet rows.
#[derive(Debug, Default)]
pub struct LedgerStore {
    tables: Mutex<Tables>,
}

impl LedgerStore {
    pub fn new() -> Self {
        LedgerStore::default()
    }

    /// Opens a unit of work. The store stays locked until the unit is
    /// committed or dropped.
    pub fn begin(&self) -> UnitOfWork<'_> {
        let tables = self.tables.lock();
        let seq = tables.seq;
        UnitOfWork {
            tables,
            changes: ChangeSet::new(seq),
        }
    }

    /// Runs `f` in a unit of work, committing only if it returns `Ok`.
    pub fn atomically<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut UnitOfWork<'_>) -> Result<T>,
    {
        let mut uow = self.begin();
        let value = f(&mut uow)?;
        uow.commit();
        Ok(value)
    }

    pub fn user(&self, id: UserId) -> Result<User> {
        fetch(&self.tables.lock().users, id, "user")
    }

    pub fn user_by_username(&self, username: &str) -> Option<User> {
        let tables = self.tables.lock();
        tables
            .usernames
            .get(username)
            .and_then(|id| tables.users.get(id))
            .cloned()
    }

    pub fn wallet(&self, id: WalletId) -> Result<Wallet> {
        fetch(&self.tables.lock().wallets, id, "wallet")
    }

    pub fn wallet_for_user(&self, user: UserId) -> Result<Wallet> {
        let tables = self.tables.lock();
        tables
            .wallet_by_user
            .get(&user)
            .and_then(|id| tables.wallets.get(id))
            .cloned()
            .ok_or_else(|| MarketError::not_found("wallet for", user))
    }

    pub fn book(&self, id: BookId) -> Result<Book> {
        fetch(&self.tables.lock().books, id, "book")
    }

    pub fn transaction(&self, id: TransactionId) -> Result<Transaction> {
        fetch(&self.tables.lock().transactions, id, "transaction")
    }

    pub fn rental(&self, id: RentalId) -> Result<Rental> {
        fetch(&self.tables.lock().rentals, id, "rental")
    }

    pub fn rental_for_transaction(&self, tx: TransactionId) -> Result<Rental> {
        let tables = self.tables.lock();
        tables
            .rental_by_transaction
            .get(&tx)
            .and_then(|id| tables.rentals.get(id))
            .cloned()
            .ok_or_else(|| MarketError::not_found("rental for", tx))
    }

    /// All users ordered by id.
    pub fn users(&self) -> Vec<User> {
        sorted(&self.tables.lock().users)
    }

    /// All wallets ordered by id.
    pub fn wallets(&self) -> Vec<Wallet> {
        sorted(&self.tables.lock().wallets)
    }

    /// All books ordered by id.
    pub fn books(&self) -> Vec<Book> {
        sorted(&self.tables.lock().books)
    }

    /// The full ledger ordered by id.
    pub fn transactions(&self) -> Vec<Transaction> {
        sorted(&self.tables.lock().transactions)
    }

    /// All rentals ordered by id.
    pub fn rentals(&self) -> Vec<Rental> {
        sorted(&self.tables.lock().rentals)
    }
}

fn fetch<K, V>(table: &HashMap<K, V>, id: K, entity: &'static str) -> Result<V>
where
    K: Eq + Hash + Display,
    V: Clone,
{
    table
        .get(&id)
        .cloned()
        .ok_or_else(|| MarketError::not_found(entity, id))
}

fn sorted<K, V>(table: &HashMap<K, V>) -> Vec<V>
where
    K: Eq + Hash + Ord + Copy,
    V: Clone,
{
    let mut keys: Vec<K> = table.keys().copied().collect();
    keys.sort();
    keys.iter().filter_map(|k| table.get(k)).cloned().collect()
}

/// Pending mutations of one unit of work. `None` marks a deletion.
#[derive(Debug)]
struct ChangeSet {
    users: HashMap<UserId, Option<User>>,
    wallets: HashMap<WalletId, Option<Wallet>>,
    books: HashMap<BookId, Option<Book>>,
    transactions: Vec<Transaction>,
    rentals: HashMap<RentalId, Rental>,
    seq: Sequences,
}

impl ChangeSet {
    fn new(seq: Sequences) -> Self {
        ChangeSet {
            users: HashMap::new(),
            wallets: HashMap::new(),
            books: HashMap::new(),
            transactions: Vec::new(),
            rentals: HashMap::new(),
            seq,
        }
    }
}

/// A staged, all-or-nothing group of mutations.
///
/// Reads see the unit's own staged changes layered over the committed
/// tables. Nothing becomes visible to other callers before
/// [`commit`](Self::commit).
pub struct UnitOfWork<'a> {
    tables: MutexGuard<'a, Tables>,
    changes: ChangeSet,
}

impl UnitOfWork<'_> {
    pub fn user(&self, id: UserId) -> Result<User> {
        layered(&self.changes.users, &self.tables.users, id, "user")
    }

    pub fn user_by_username(&self, username: &str) -> Option<User> {
        let staged = self
            .changes
            .users
            .values()
            .flatten()
            .find(|u| u.username == username);
        if let Some(user) = staged {
            return Some(user.clone());
        }
        let id = *self.tables.usernames.get(username)?;
        self.user(id).ok()
    }

    /// Registers a new user with the next free id.
    pub fn insert_user(&mut self, username: &str, role: Role) -> User {
        self.changes.seq.user += 1;
        let user = User::new(UserId::new(self.changes.seq.user), username, role);
        self.changes.users.insert(user.id, Some(user.clone()));
        user
    }

    pub fn put_user(&mut self, user: User) {
        self.changes.users.insert(user.id, Some(user));
    }

    pub fn delete_user(&mut self, id: UserId) {
        self.changes.users.insert(id, None);
    }

    pub fn wallet(&self, id: WalletId) -> Result<Wallet> {
        layered(&self.changes.wallets, &self.tables.wallets, id, "wallet")
    }

    pub fn wallet_for_user(&self, user: UserId) -> Result<Wallet> {
        let staged = self
            .changes
            .wallets
            .values()
            .flatten()
            .find(|w| w.user_id == user);
        if let Some(wallet) = staged {
            return Ok(wallet.clone());
        }
        let id = self
            .tables
            .wallet_by_user
            .get(&user)
            .copied()
            .ok_or_else(|| MarketError::not_found("wallet for", user))?;
        self.wallet(id)
    }

    /// Opens an empty wallet for `user`.
    pub fn insert_wallet(&mut self, user: UserId) -> Wallet {
        self.changes.seq.wallet += 1;
        let wallet = Wallet::new(WalletId::new(self.changes.seq.wallet), user);
        self.changes.wallets.insert(wallet.id, Some(wallet.clone()));
        wallet
    }

    pub fn put_wallet(&mut self, wallet: Wallet) {
        self.changes.wallets.insert(wallet.id, Some(wallet));
    }

    pub fn delete_wallet(&mut self, id: WalletId) {
        self.changes.wallets.insert(id, None);
    }

    pub fn book(&self, id: BookId) -> Result<Book> {
        layered(&self.changes.books, &self.tables.books, id, "book")
    }

    /// Books currently owned by `owner`, staged changes included.
    pub fn books_owned_by(&self, owner: UserId) -> Vec<Book> {
        let mut ids: Vec<BookId> = self
            .tables
            .books
            .keys()
            .chain(self.changes.books.keys())
            .copied()
            .collect();
        ids.sort();
        ids.dedup();
        ids.into_iter()
            .filter_map(|id| self.book(id).ok())
            .filter(|b| b.owner_id == owner)
            .collect()
    }

    /// Lists a new book with the next free id.
    pub fn insert_book(&mut self, uploader: UserId, listing: NewBook) -> Book {
        self.changes.seq.book += 1;
        let book = Book::from_listing(BookId::new(self.changes.seq.book), uploader, listing);
        self.changes.books.insert(book.id, Some(book.clone()));
        book
    }

    /// Stages an updated book. Its `version` is bumped on commit.
    pub fn put_book(&mut self, book: Book) {
        self.changes.books.insert(book.id, Some(book));
    }

    pub fn delete_book(&mut self, id: BookId) {
        self.changes.books.insert(id, None);
    }

    pub fn transaction(&self, id: TransactionId) -> Result<Transaction> {
        if let Some(tx) = self.changes.transactions.iter().find(|t| t.id() == id) {
            return Ok(tx.clone());
        }
        fetch(&self.tables.transactions, id, "transaction")
    }

    /// Appends a completed entry to the ledger. Entries cannot be updated.
    pub fn insert_transaction(
        &mut self,
        payer: UserId,
        payee: UserId,
        book: BookId,
        amount: Money,
        kind: TxType,
        at: DateTime<Utc>,
    ) -> Transaction {
        self.changes.seq.transaction += 1;
        let tx = Transaction::completed(
            TransactionId::new(self.changes.seq.transaction),
            payer,
            payee,
            book,
            amount,
            kind,
            at,
        );
        self.changes.transactions.push(tx.clone());
        tx
    }

    pub fn rental(&self, id: RentalId) -> Result<Rental> {
        if let Some(rental) = self.changes.rentals.get(&id) {
            return Ok(rental.clone());
        }
        fetch(&self.tables.rentals, id, "rental")
    }

    /// Opens a rental window for a rental-type transaction.
    pub fn insert_rental(
        &mut self,
        transaction: &Transaction,
        period: RentalPeriod,
        start: DateTime<Utc>,
    ) -> Rental {
        self.changes.seq.rental += 1;
        let rental = Rental::new(
            RentalId::new(self.changes.seq.rental),
            transaction.id(),
            transaction.book(),
            transaction.payer(),
            period,
            start,
        );
        self.changes.rentals.insert(rental.id, rental.clone());
        rental
    }

    pub fn put_rental(&mut self, rental: Rental) {
        self.changes.rentals.insert(rental.id, rental);
    }

    /// Applies every staged change and releases the store lock.
    pub fn commit(self) {
        let UnitOfWork {
            mut tables,
            changes,
        } = self;
        let tables = &mut *tables;

        debug!(
            "Committing unit of work: {} users, {} wallets, {} books, {} transactions, {} rentals",
            changes.users.len(),
            changes.wallets.len(),
            changes.books.len(),
            changes.transactions.len(),
            changes.rentals.len()
        );

        for (id, staged) in changes.users {
            match staged {
                Some(user) => {
                    tables.usernames.insert(user.username.clone(), id);
                    tables.users.insert(id, user);
                }
                None => {
                    if let Some(old) = tables.users.remove(&id) {
                        tables.usernames.remove(&old.username);
                    }
                }
            }
        }

        for (id, staged) in changes.wallets {
            match staged {
                Some(wallet) => {
                    tables.wallet_by_user.insert(wallet.user_id, id);
                    tables.wallets.insert(id, wallet);
                }
                None => {
                    if let Some(old) = tables.wallets.remove(&id) {
                        tables.wallet_by_user.remove(&old.user_id);
                    }
                }
            }
        }

        for (id, staged) in changes.books {
            match staged {
                Some(mut book) => {
                    if let Some(current) = tables.books.get(&id) {
                        book.version = current.version + 1;
                    }
                    tables.books.insert(id, book);
                }
                None => {
                    tables.books.remove(&id);
                }
            }
        }

        for tx in changes.transactions {
            tables.transactions.insert(tx.id(), tx);
        }

        for (id, rental) in changes.rentals {
            tables.rental_by_transaction.insert(rental.transaction_id, id);
            tables.rentals.insert(id, rental);
        }

        tables.seq = changes.seq;
    }
}

fn layered<K, V>(
    staged: &HashMap<K, Option<V>>,
    committed: &HashMap<K, V>,
    id: K,
    entity: &'static str,
) -> Result<V>
where
    K: Eq + Hash + Display,
    V: Clone,
{
    match staged.get(&id) {
        Some(Some(value)) => Ok(value.clone()),
        Some(None) => Err(MarketError::not_found(entity, id)),
        None => fetch(committed, id, entity),
    }
}
