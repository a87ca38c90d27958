//! Identifier newtypes for ledger entities.
//!
//! Ids are allocated sequentially by the [`LedgerStore`](crate::store::LedgerStore),
//! starting at 1 for each entity kind.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $prefix, self.0)
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }
    };
}

entity_id!(
    /// Identifies a registered user (student or admin).
    UserId,
    "user"
);
entity_id!(
    /// Identifies a student wallet.
    WalletId,
    "wallet"
);
entity_id!(
    /// Identifies a listed book.
    BookId,
    "book"
);
entity_id!(
    /// Identifies a ledger entry.
    TransactionId,
    "tx"
);
entity_id!(RentalId, "rental");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_entity_prefix() {
        assert_eq!(UserId::new(3).to_string(), "user#3");
        assert_eq!(BookId::from(12).to_string(), "book#12");
        assert_eq!(TransactionId::new(1).to_string(), "tx#1");
    }

    #[test]
    fn test_ids_order_by_raw_value() {
        assert!(WalletId::new(1) < WalletId::new(2));
        assert_eq!(RentalId::new(9).get(), 9);
    }
}
