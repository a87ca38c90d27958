//! Student wallet and its credit/debit operations.
//!
//! Maintains the invariant: `balance >= 0` at all times.

use crate::error::{MarketError, Result};
use crate::ids::{UserId, WalletId};
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A student's stored balance used for every in-system payment.
///
/// # Invariants
///
/// - `balance >= 0` after every operation; a debit that would overdraw is
///   rejected whole, never applied partially
/// - The balance only changes through [`Wallet::credit`] and [`Wallet::debit`]
///
/// Mutations are in-memory only. Persisting a changed wallet is the job of
/// the surrounding [`UnitOfWork`](crate::store::UnitOfWork).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Wallet {
    pub id: WalletId,

    /// Owning student. Exactly one wallet per student.
    pub user_id: UserId,

    balance: Money,

    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Creates an empty wallet for a student.
    pub fn new(id: WalletId, user_id: UserId) -> Self {
        Wallet {
            id,
            user_id,
            balance: Money::ZERO,
            updated_at: Utc::now(),
        }
    }

    pub fn balance(&self) -> Money {
        self.balance
    }

    /// Adds funds and returns the new balance.
    ///
    /// Fails with `InvalidAmount` unless `amount > 0`, or when the new
    /// balance would not be representable. The wallet is untouched on error.
    pub fn credit(&mut self, amount: Money) -> Result<Money> {
        ensure_positive(amount)?;

        self.balance = self.balance.checked_add(amount).ok_or_else(|| {
            MarketError::InvalidAmount(format!(
                "crediting {} to a balance of {} overflows",
                amount, self.balance
            ))
        })?;
        self.updated_at = Utc::now();
        Ok(self.balance)
    }

    /// Removes funds and returns the new balance.
    ///
    /// Fails with `InsufficientFunds` when `balance < amount`, leaving the
    /// wallet untouched.
    pub fn debit(&mut self, amount: Money) -> Result<Money> {
        ensure_positive(amount)?;

        let remaining =
            self.balance
                .checked_sub(amount)
                .ok_or(MarketError::InsufficientFunds {
                    required: amount,
                    available: self.balance,
                })?;

        self.balance = remaining;
        self.updated_at = Utc::now();
        Ok(self.balance)
    }

    /// Verifies the invariant: `balance >= 0`.
    #[cfg(debug_assertions)]
    pub fn check_invariant(&self) -> bool {
        !self.balance.is_negative()
    }
}

fn ensure_positive(amount: Money) -> Result<()> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(MarketError::InvalidAmount(format!(
            "{} must be greater than zero",
            amount
        )))
    }
}
