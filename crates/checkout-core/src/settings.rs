//! # Checkout Settings
//!
//! Merchant-level checkout configuration, loaded from
//! `config/checkout.toml` when present.
//!
//! ```toml
//! currency = "inr"
//! default_delivery_fee = 50.0
//! merchant_name = "Cravt"
//! theme_color = "#E65100"
//! allow_dev_payments = false
//! ```

use crate::error::{CheckoutError, CheckoutResult};
use crate::money::{Currency, Price};
use serde::{Deserialize, Serialize};

/// Checkout configuration shared by the controller and the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutSettings {
    pub currency: Currency,

    /// Used when the restaurant publishes no delivery fee
    pub default_delivery_fee: f64,

    /// Merchant name shown in the gateway UI
    pub merchant_name: String,

    /// Gateway UI accent colour
    pub theme_color: String,

    /// Simulate payments locally when the gateway client cannot be loaded.
    /// Development only.
    pub allow_dev_payments: bool,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            currency: Currency::INR,
            default_delivery_fee: 50.0,
            merchant_name: "Cravt".to_string(),
            theme_color: "#E65100".to_string(),
            allow_dev_payments: false,
        }
    }
}

impl CheckoutSettings {
    /// Parse settings from TOML; missing keys take their defaults
    pub fn from_toml(toml_str: &str) -> CheckoutResult<Self> {
        let settings: Self = toml::from_str(toml_str)
            .map_err(|e| CheckoutError::Configuration(format!("invalid checkout settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> CheckoutResult<()> {
        if !self.default_delivery_fee.is_finite() || self.default_delivery_fee < 0.0 {
            return Err(CheckoutError::Configuration(
                "default_delivery_fee must be a non-negative amount".to_string(),
            ));
        }
        if self.merchant_name.trim().is_empty() {
            return Err(CheckoutError::Configuration(
                "merchant_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn default_delivery_fee(&self) -> Price {
        Price::new(self.default_delivery_fee, self.currency)
    }

    /// Builder: toggle simulated payments
    pub fn with_dev_payments(mut self, allow: bool) -> Self {
        self.allow_dev_payments = allow;
        self
    }
}
