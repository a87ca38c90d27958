//! Marketplace settings.
//!
//! Defaults match the limits students see on the add-funds form. Each value
//! can be overridden through the environment:
//!
//! - `BOOKMARKET_MIN_DEPOSIT`: smallest accepted single deposit
//! - `BOOKMARKET_MAX_DEPOSIT`: largest accepted single deposit
//! - `BOOKMARKET_BOOTSTRAP_ADMIN`: username of the first administrator

use crate::error::{MarketError, Result};
use crate::money::Money;
use std::env;
use std::str::FromStr;

pub const MIN_DEPOSIT_VAR: &str = "BOOKMARKET_MIN_DEPOSIT";
pub const MAX_DEPOSIT_VAR: &str = "BOOKMARKET_MAX_DEPOSIT";
pub const BOOTSTRAP_ADMIN_VAR: &str = "BOOKMARKET_BOOTSTRAP_ADMIN";

/// Upper bound for `max_deposit`, in whole currency units.
pub const DEPOSIT_CEILING: i64 = 1_000_000_000;

#[derive(Debug, Clone, PartialEq)]
pub struct MarketConfig {
    pub min_deposit: Money,
    pub max_deposit: Money,
    /// The only account allowed to become admin without an existing admin
    /// granting the role.
    pub bootstrap_admin: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        MarketConfig {
            min_deposit: Money::from_units(1),
            max_deposit: Money::from_units(1000),
            bootstrap_admin: "admin".to_string(),
        }
    }
}

impl MarketConfig {
    /// Loads the defaults, then applies any environment overrides.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a pluggable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = MarketConfig::default();

        if let Some(raw) = lookup(MIN_DEPOSIT_VAR) {
            config.min_deposit = parse_money(MIN_DEPOSIT_VAR, &raw)?;
        }
        if let Some(raw) = lookup(MAX_DEPOSIT_VAR) {
            config.max_deposit = parse_money(MAX_DEPOSIT_VAR, &raw)?;
        }
        if let Some(raw) = lookup(BOOTSTRAP_ADMIN_VAR) {
            let name = raw.trim();
            if name.is_empty() {
                return Err(MarketError::Config(format!("{} is empty", BOOTSTRAP_ADMIN_VAR)));
            }
            config.bootstrap_admin = name.to_string();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.min_deposit.is_positive() {
            return Err(MarketError::Config(format!(
                "minimum deposit must be positive, got {}",
                self.min_deposit
            )));
        }
        if self.min_deposit > self.max_deposit {
            return Err(MarketError::Config(format!(
                "minimum deposit {} exceeds maximum {}",
                self.min_deposit, self.max_deposit
            )));
        }
        if self.max_deposit > Money::from_units(DEPOSIT_CEILING) {
            return Err(MarketError::Config(format!(
                "maximum deposit {} exceeds the ceiling of {}",
                self.max_deposit,
                Money::from_units(DEPOSIT_CEILING)
            )));
        }
        Ok(())
    }

    /// Checks a single deposit against the configured bounds.
    pub fn check_deposit(&self, amount: Money) -> Result<()> {
        if !amount.is_positive() {
            return Err(MarketError::InvalidAmount(format!(
                "deposit {} must be greater than zero",
                amount
            )));
        }
        if amount < self.min_deposit || amount > self.max_deposit {
            return Err(MarketError::InvalidAmount(format!(
                "deposit {} outside allowed range {}..={}",
                amount, self.min_deposit, self.max_deposit
            )));
        }
        Ok(())
    }
}

fn parse_money(key: &str, raw: &str) -> Result<Money> {
    Money::from_str(raw).map_err(|e| MarketError::Config(format!("{}={:?}: {}", key, raw, e)))
}
