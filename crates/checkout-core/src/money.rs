//! # Money Types
//!
//! Currency and price types for checkout totals.
//! Amounts are kept in the smallest currency unit (paise for INR) so that
//! subtotal, fee and discount arithmetic is exact.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul};

/// Largest accepted unit price for a single menu item, in minor units.
pub const MAX_UNIT_PRICE_MINOR: i64 = 100_000_000;

/// Supported currencies (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    INR,
    USD,
    EUR,
    GBP,
}

impl Currency {
    /// Returns the ISO 4217 currency code as sent to the gateway
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::INR => "INR",
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::INR => "₹",
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::GBP => "£",
        }
    }

    /// Number of decimal places of the minor unit
    pub fn decimal_places(&self) -> u8 {
        2
    }

    /// Convert a decimal amount to the smallest currency unit
    pub fn to_smallest_unit(&self, amount: f64) -> i64 {
        let multiplier = 10_f64.powi(self.decimal_places() as i32);
        (amount * multiplier).round() as i64
    }

    /// Convert from smallest unit back to decimal
    pub fn from_smallest_unit(&self, amount: i64) -> f64 {
        let divisor = 10_f64.powi(self.decimal_places() as i32);
        amount as f64 / divisor
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::INR
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Price with amount in smallest currency unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Price {
    /// Amount in smallest currency unit (paise for INR)
    pub amount: i64,
    /// Currency
    pub currency: Currency,
}

impl Price {
    /// Create a new price from decimal amount
    pub fn new(amount: f64, currency: Currency) -> Self {
        Self {
            amount: currency.to_smallest_unit(amount),
            currency,
        }
    }

    /// Create a price from smallest unit (paise)
    pub fn from_minor(amount: i64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: 0,
            currency,
        }
    }

    /// Get the decimal amount
    pub fn as_decimal(&self) -> f64 {
        self.currency.from_smallest_unit(self.amount)
    }

    pub fn is_negative(&self) -> bool {
        self.amount < 0
    }

    /// True for a non-negative amount no larger than `MAX_UNIT_PRICE_MINOR`
    pub fn is_valid_unit_price(&self) -> bool {
        (0..=MAX_UNIT_PRICE_MINOR).contains(&self.amount)
    }

    /// `self - other`, floored at zero
    pub fn saturating_sub(self, other: Price) -> Price {
        Price {
            amount: self.amount.saturating_sub(other.amount).max(0),
            currency: self.currency,
        }
    }

    /// The smaller of two prices
    pub fn min(self, other: Price) -> Price {
        if other.amount < self.amount {
            Price {
                amount: other.amount,
                currency: self.currency,
            }
        } else {
            self
        }
    }

    /// Format for display (e.g., "₹250.00")
    pub fn display(&self) -> String {
        let sign = if self.amount < 0 { "-" } else { "" };
        let abs = self.amount.unsigned_abs();
        format!(
            "{}{}{}.{:02}",
            sign,
            self.currency.symbol(),
            abs / 100,
            abs % 100
        )
    }
}

impl Add for Price {
    type Output = Price;

    fn add(self, rhs: Price) -> Price {
        Price {
            amount: self.amount.saturating_add(rhs.amount),
            currency: self.currency,
        }
    }
}

impl Mul<u32> for Price {
    type Output = Price;

    fn mul(self, quantity: u32) -> Price {
        Price {
            amount: self.amount.saturating_mul(i64::from(quantity)),
            currency: self.currency,
        }
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}

/// `max(0, subtotal + delivery_fee - discount)`
pub fn checkout_total(subtotal: Price, delivery_fee: Price, discount: Price) -> Price {
    (subtotal + delivery_fee).saturating_sub(discount)
}
