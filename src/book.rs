//! Book listings.

use crate::ids::{BookId, UserId};
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Availability of a listed book.
///
/// `Available → Sold` on purchase and `Available → Rented` on rental. A rented
/// book returns to `Available` once its rental is returned or expires; a sold
/// book stays sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    Available,
    Rented,
    Sold,
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookStatus::Available => f.write_str("available"),
            BookStatus::Rented => f.write_str("rented"),
            BookStatus::Sold => f.write_str("sold"),
        }
    }
}

/// Listing details supplied by the uploading student.
#[derive(Debug, Clone, Default)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    /// Sale price.
    pub price: Money,
    /// Rental fee per day.
    pub rental_fee: Money,
}

impl NewBook {
    pub fn new(title: impl Into<String>, author: impl Into<String>, price: Money, rental_fee: Money) -> Self {
        NewBook {
            title: title.into(),
            author: author.into(),
            price,
            rental_fee,
            ..Default::default()
        }
    }
}

/// A book listed on the marketplace.
///
/// Provenance and ownership are tracked separately: `uploader_id` never
/// changes, `owner_id` moves to the buyer on purchase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub price: Money,
    pub rental_fee: Money,
    pub status: BookStatus,
    pub uploader_id: UserId,
    pub owner_id: UserId,
    /// Bumped by the store on every committed update.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    pub fn from_listing(id: BookId, uploader: UserId, listing: NewBook) -> Self {
        let now = Utc::now();
        Book {
            id,
            title: listing.title,
            author: listing.author,
            isbn: listing.isbn,
            category: listing.category,
            description: listing.description,
            price: listing.price,
            rental_fee: listing.rental_fee,
            status: BookStatus::Available,
            uploader_id: uploader,
            owner_id: uploader,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == BookStatus::Available
    }

    /// Total charge for renting this book for `days` days.
    pub fn rental_cost(&self, days: u32) -> Option<Money> {
        self.rental_fee.times(days)
    }
}
