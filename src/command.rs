//! Marketplace actions as read from a batch CSV file.

use crate::money::Money;
use serde::Deserialize;
use std::str::FromStr;

/// Raw action row.
///
/// Header: `action,user,book,amount,fee,days`. Users are referenced by
/// username and books by a label chosen by whoever wrote the file. For
/// account moderation rows the `book` column carries the target username.
#[derive(Debug, Deserialize)]
pub struct CommandRecord {
    /// register, admin, promote, deposit, list, purchase, rent, return,
    /// activate, deactivate
    pub action: String,

    /// Acting username
    pub user: String,

    /// Book label, or target username for moderation rows
    pub book: Option<String>,

    /// Deposit amount or sale price
    pub amount: Option<String>,

    /// Daily rental fee (list only)
    pub fee: Option<String>,

    /// Rental length (rent only)
    pub days: Option<u32>,
}

impl CommandRecord {
    /// Parses the raw row into a typed command, or explains why it cannot.
    pub fn parse(&self) -> Result<Command, String> {
        let action = self.action.trim().to_lowercase();
        let user = self.user.trim().to_string();
        if user.is_empty() {
            return Err("missing user".to_string());
        }

        match action.as_str() {
            "register" => Ok(Command::Register { user }),
            "admin" => Ok(Command::Admin { user }),
            "promote" => Ok(Command::Promote {
                admin: user,
                target: self.book_field("target user")?,
            }),
            "activate" | "deactivate" => Ok(Command::SetActive {
                admin: user,
                target: self.book_field("target user")?,
                active: action == "activate",
            }),
            "deposit" => Ok(Command::Deposit {
                user,
                amount: parse_money("amount", self.amount.as_deref())?,
            }),
            "list" => Ok(Command::List {
                user,
                book: self.book_field("book")?,
                price: parse_money("amount", self.amount.as_deref())?,
                fee: parse_money("fee", self.fee.as_deref())?,
            }),
            "purchase" => Ok(Command::Purchase {
                user,
                book: self.book_field("book")?,
            }),
            "rent" => Ok(Command::Rent {
                user,
                book: self.book_field("book")?,
                days: self.days.ok_or_else(|| "missing days".to_string())?,
            }),
            "return" => Ok(Command::Return {
                user,
                book: self.book_field("book")?,
            }),
            other => Err(format!("unknown action {:?}", other)),
        }
    }

    fn book_field(&self, what: &str) -> Result<String, String> {
        match self.book.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => Ok(label.to_string()),
            _ => Err(format!("missing {}", what)),
        }
    }
}

fn parse_money(field: &str, raw: Option<&str>) -> Result<Money, String> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(format!("missing {}", field));
    }
    Money::from_str(raw).map_err(|e| format!("bad {} {:?}: {}", field, raw, e))
}

/// A parsed action ready to run against the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Register a student with an empty wallet.
    Register { user: String },

    /// Create the bootstrap administrator.
    Admin { user: String },

    /// Grant the admin role to `target`.
    Promote { admin: String, target: String },

    /// Activate or deactivate `target`.
    SetActive {
        admin: String,
        target: String,
        active: bool,
    },

    /// Add funds to the user's wallet.
    Deposit { user: String, amount: Money },

    /// List a book under `book` label.
    List {
        user: String,
        book: String,
        price: Money,
        fee: Money,
    },

    Purchase { user: String, book: String },

    Rent { user: String, book: String, days: u32 },

    /// Return the user's active rental of `book`.
    Return { user: String, book: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(action: &str, user: &str, book: Option<&str>) -> CommandRecord {
        CommandRecord {
            action: action.to_string(),
            user: user.to_string(),
            book: book.map(str::to_string),
            amount: None,
            fee: None,
            days: None,
        }
    }

    #[test]
    fn test_parse_register() {
        let parsed = record("register", "alice", None).parse().unwrap();
        assert_eq!(
            parsed,
            Command::Register {
                user: "alice".to_string()
            }
        );
    }

    #[test]
    fn test_parse_deposit() {
        let mut rec = record("deposit", "alice", None);
        rec.amount = Some(" 25.5 ".to_string());

        match rec.parse().unwrap() {
            Command::Deposit { user, amount } => {
                assert_eq!(user, "alice");
                assert_eq!(amount.to_string(), "25.50");
            }
            other => panic!("Expected Deposit, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_list() {
        let mut rec = record("list", "bob", Some("sicp"));
        rec.amount = Some("30".to_string());
        rec.fee = Some("1.25".to_string());

        match rec.parse().unwrap() {
            Command::List {
                user,
                book,
                price,
                fee,
            } => {
                assert_eq!(user, "bob");
                assert_eq!(book, "sicp");
                assert_eq!(price.to_string(), "30.00");
                assert_eq!(fee.to_string(), "1.25");
            }
            other => panic!("Expected List, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rent_requires_days() {
        let mut rec = record("rent", "alice", Some("sicp"));
        assert!(rec.parse().unwrap_err().contains("days"));

        rec.days = Some(7);
        assert!(matches!(rec.parse().unwrap(), Command::Rent { days: 7, .. }));
    }

    #[test]
    fn test_parse_moderation_rows() {
        assert_eq!(
            record("Deactivate", "root", Some("alice")).parse().unwrap(),
            Command::SetActive {
                admin: "root".to_string(),
                target: "alice".to_string(),
                active: false,
            }
        );
        assert!(record("promote", "root", None).parse().is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_action() {
        assert!(record("refund", "alice", Some("x")).parse().is_err());
    }

    #[test]
    fn test_parse_rejects_missing_fields() {
        assert!(record("purchase", "alice", None).parse().is_err());
        assert!(record("purchase", "alice", Some("  ")).parse().is_err());
        assert!(record("register", " ", None).parse().is_err());

        let mut rec = record("deposit", "alice", None);
        rec.amount = Some("ten".to_string());
        assert!(rec.parse().unwrap_err().contains("bad amount"));
    }
}
