//! Rental windows and their lifecycle.
//!
//! A rental starts `Active` and ends exactly once, either `Returned` by the
//! renter or `Expired` by reconciliation after its end date.

use crate::error::{MarketError, Result};
use crate::ids::{BookId, RentalId, TransactionId, UserId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rental lengths offered to students.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RentalPeriod {
    OneDay,
    ThreeDays,
    OneWeek,
    TwoWeeks,
    ThirtyDays,
}

impl RentalPeriod {
    pub const ALL: [RentalPeriod; 5] = [
        RentalPeriod::OneDay,
        RentalPeriod::ThreeDays,
        RentalPeriod::OneWeek,
        RentalPeriod::TwoWeeks,
        RentalPeriod::ThirtyDays,
    ];

    pub fn days(self) -> u32 {
        match self {
            RentalPeriod::OneDay => 1,
            RentalPeriod::ThreeDays => 3,
            RentalPeriod::OneWeek => 7,
            RentalPeriod::TwoWeeks => 14,
            RentalPeriod::ThirtyDays => 30,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::days(i64::from(self.days()))
    }
}

impl TryFrom<u32> for RentalPeriod {
    type Error = MarketError;

    fn try_from(days: u32) -> Result<Self> {
        RentalPeriod::ALL
            .into_iter()
            .find(|p| p.days() == days)
            .ok_or(MarketError::InvalidRentalPeriod(days))
    }
}

impl fmt::Display for RentalPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.days() {
            1 => f.write_str("1 day"),
            n => write!(f, "{} days", n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RentalState {
    Active,
    Returned,
    Expired,
}

/// Time-bounded rental, linked 1:1 to its rental-type transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rental {
    pub id: RentalId,
    pub transaction_id: TransactionId,
    pub book_id: BookId,
    pub renter_id: UserId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    state: RentalState,
    /// When the rental left the `Active` state.
    pub closed_at: Option<DateTime<Utc>>,
}

impl Rental {
    pub fn new(
        id: RentalId,
        transaction_id: TransactionId,
        book_id: BookId,
        renter_id: UserId,
        period: RentalPeriod,
        start: DateTime<Utc>,
    ) -> Self {
        Rental {
            id,
            transaction_id,
            book_id,
            renter_id,
            start,
            end: start + period.duration(),
            state: RentalState::Active,
            closed_at: None,
        }
    }

    pub fn state(&self) -> RentalState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == RentalState::Active
    }

    /// Still active past its end date. Derived at read time.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && now > self.end
    }

    /// Active with an end date at or before `now`: due for reconciliation.
    pub fn has_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && now >= self.end
    }

    /// `Active → Returned`.
    pub fn mark_returned(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.close(RentalState::Returned, now)
    }

    /// `Active → Expired`.
    pub fn mark_expired(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.close(RentalState::Expired, now)
    }

    fn close(&mut self, to: RentalState, now: DateTime<Utc>) -> Result<()> {
        if !self.is_active() {
            return Err(MarketError::RentalNotActive(self.id));
        }
        self.state = to;
        self.closed_at = Some(now);
        Ok(())
    }
}
