//! Ledger entries for money-moving events.

use crate::ids::{BookId, TransactionId, UserId};
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of settlement that produced a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxType {
    Purchase,
    Rental,
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxType::Purchase => f.write_str("purchase"),
            TxType::Rental => f.write_str("rental"),
        }
    }
}

/// Settlement outcome recorded on the entry.
///
/// `Pending` and `Failed` mirror the ledger schema and are never produced by
/// the engine. It only writes `Completed`; rejected attempts leave no entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Completed,
    Pending,
    Failed,
}

/// Immutable ledger entry.
///
/// Fields are private and only exposed through getters; once the store has
/// accepted an entry there is no way to change it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    id: TransactionId,
    payer: UserId,
    payee: UserId,
    book: BookId,
    amount: Money,
    kind: TxType,
    status: TxStatus,
    created_at: DateTime<Utc>,
}

impl Transaction {
    /// Builds a completed entry for a settled purchase or rental.
    pub fn completed(
        id: TransactionId,
        payer: UserId,
        payee: UserId,
        book: BookId,
        amount: Money,
        kind: TxType,
        created_at: DateTime<Utc>,
    ) -> Self {
        Transaction {
            id,
            payer,
            payee,
            book,
            amount,
            kind,
            status: TxStatus::Completed,
            created_at,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Student who paid.
    pub fn payer(&self) -> UserId {
        self.payer
    }

    /// Book owner who was paid.
    pub fn payee(&self) -> UserId {
        self.payee
    }

    pub fn book(&self) -> BookId {
        self.book
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn kind(&self) -> TxType {
        self.kind
    }

    pub fn status(&self) -> TxStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_entry_exposes_fields() {
        let now = Utc::now();
        let tx = Transaction::completed(
            TransactionId::new(1),
            UserId::new(2),
            UserId::new(3),
            BookId::new(4),
            Money::from_cents(1250),
            TxType::Rental,
            now,
        );

        assert_eq!(tx.id(), TransactionId::new(1));
        assert_eq!(tx.payer(), UserId::new(2));
        assert_eq!(tx.payee(), UserId::new(3));
        assert_eq!(tx.book(), BookId::new(4));
        assert_eq!(tx.amount().to_string(), "12.50");
        assert_eq!(tx.kind(), TxType::Rental);
        assert_eq!(tx.status(), TxStatus::Completed);
        assert_eq!(tx.created_at(), now);
    }

    #[test]
    fn test_type_display() {
        assert_eq!(TxType::Purchase.to_string(), "purchase");
        assert_eq!(TxType::Rental.to_string(), "rental");
    }
}
