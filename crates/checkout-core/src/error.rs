//! # Checkout Error Types
//!
//! Typed error handling for the cravt checkout engine.
//! All checkout operations return `Result<T, CheckoutError>`.

use crate::ids::{OrderId, RestaurantId};
use thiserror::Error;

/// Shown when an item from a second restaurant is added to a non-empty cart.
pub const CART_CONFLICT_MESSAGE: &str =
    "You can only order from one restaurant at a time. Please clear your cart to add this item.";

/// Core error type for all checkout operations
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Local validation failure; no network call was made
    #[error("{0}")]
    Validation(String),

    /// Item belongs to a different restaurant than the current cart
    #[error("{}", CART_CONFLICT_MESSAGE)]
    CartConflict {
        current: RestaurantId,
        requested: RestaurantId,
    },

    /// A coupon is already applied to this checkout
    #[error("Coupon '{code}' is already applied")]
    CouponAlreadyApplied { code: String },

    /// Non-success HTTP status from the Cravt API
    #[error("{message}")]
    Backend { status: u16, message: String },

    /// Network/HTTP error communicating with the backend
    #[error("Network error: {0}")]
    Network(String),

    /// Gateway client library could not be loaded
    #[error("Payment gateway unavailable: {0}")]
    GatewayLoad(String),

    /// Gateway reported a failed payment
    #[error("Payment failed: {description}")]
    GatewayPayment { description: String },

    /// Backend refused to verify a payment the gateway reported as successful
    #[error("Payment verification failed for order {order_id}: {message}")]
    VerificationMismatch { order_id: OrderId, message: String },

    /// Durable cart storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CheckoutError {
    /// Shorthand for a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        CheckoutError::Validation(message.into())
    }

    /// Returns true if the user may simply try the same action again
    pub fn is_retryable(&self) -> bool {
        match self {
            CheckoutError::Network(_) | CheckoutError::GatewayLoad(_) => true,
            CheckoutError::Backend { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns true for errors handled locally before any network call
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            CheckoutError::Validation(_)
                | CheckoutError::CartConflict { .. }
                | CheckoutError::CouponAlreadyApplied { .. }
        )
    }

    /// Message suitable for an inline notice
    pub fn user_message(&self) -> String {
        match self {
            CheckoutError::GatewayPayment { description } => description.clone(),
            CheckoutError::Network(_) => {
                "Could not reach the server. Please check your connection and try again."
                    .to_string()
            }
            CheckoutError::Storage(_)
            | CheckoutError::Serialization(_)
            | CheckoutError::Internal(_)
            | CheckoutError::Configuration(_) => {
                "Something went wrong. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for CheckoutError {
    fn from(err: serde_json::Error) -> Self {
        CheckoutError::Serialization(err.to_string())
    }
}

/// Result type alias for checkout operations
pub type CheckoutResult<T> = Result<T, CheckoutError>;
