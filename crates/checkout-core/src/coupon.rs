//! # Coupons
//!
//! At most one coupon per checkout attempt. The backend is the pricing
//! authority; `Coupon::estimate_discount` is only a local preview.

use crate::error::{CheckoutError, CheckoutResult};
use crate::ids::RestaurantId;
use crate::money::Price;
use crate::ports::CheckoutBackend;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// How a coupon's `discount_value` is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscountKind {
    Percentage,
    Fixed,
}

/// A coupon offered by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    #[serde(rename = "discount_type")]
    pub discount_kind: DiscountKind,
    pub discount_value: f64,
}

impl Coupon {
    /// Short label such as "10% OFF" or "₹50 OFF"
    pub fn deal_label(&self, currency_symbol: &str) -> String {
        match self.discount_kind {
            DiscountKind::Percentage => format!("{}% OFF", trim_number(self.discount_value)),
            DiscountKind::Fixed => {
                format!("{}{} OFF", currency_symbol, trim_number(self.discount_value))
            }
        }
    }

    /// Preview of the discount on `subtotal`, capped at the subtotal
    pub fn estimate_discount(&self, subtotal: Price) -> Price {
        let raw = match self.discount_kind {
            DiscountKind::Percentage => {
                let minor = (subtotal.amount as f64 * self.discount_value / 100.0).round() as i64;
                Price::from_minor(minor, subtotal.currency)
            }
            DiscountKind::Fixed => Price::new(self.discount_value, subtotal.currency),
        };
        let capped = raw.min(subtotal);
        if capped.is_negative() {
            Price::zero(subtotal.currency)
        } else {
            capped
        }
    }
}

fn trim_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Request for `POST /coupons/apply`
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyCouponRequest {
    pub code: String,
    pub subtotal: Price,
    pub restaurant_id: RestaurantId,
}

/// The coupon currently applied to the checkout
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedCoupon {
    pub code: String,
    pub discount: Price,
}

/// Coupon state for one checkout attempt.
#[derive(Debug, Clone, Default)]
pub struct CouponEngine {
    applied: Option<AppliedCoupon>,
    error: Option<String>,
    suggestions: Vec<Coupon>,
    applying: bool,
}

impl CouponEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn applied(&self) -> Option<&AppliedCoupon> {
        self.applied.as_ref()
    }

    pub fn applied_code(&self) -> Option<&str> {
        self.applied.as_ref().map(|c| c.code.as_str())
    }

    /// Applied discount, or zero
    pub fn discount(&self, currency: crate::money::Currency) -> Price {
        self.applied
            .as_ref()
            .map(|c| c.discount)
            .unwrap_or_else(|| Price::zero(currency))
    }

    /// Inline error from the last rejected attempt
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn suggestions(&self) -> &[Coupon] {
        &self.suggestions
    }

    /// Whether the apply action is currently available
    pub fn can_apply(&self) -> bool {
        self.applied.is_none() && !self.applying
    }

    /// Load coupon suggestions for the restaurant. Failures yield no
    /// suggestions and are only logged.
    #[instrument(skip(self, backend))]
    pub async fn list_applicable(
        &mut self,
        backend: &dyn CheckoutBackend,
        restaurant_id: RestaurantId,
    ) -> &[Coupon] {
        match backend.applicable_coupons(restaurant_id).await {
            Ok(coupons) => self.suggestions = coupons,
            Err(e) => {
                warn!(error = %e, "failed to fetch applicable coupons");
                self.suggestions.clear();
            }
        }
        &self.suggestions
    }

    /// Validate `code` with the backend and apply the returned discount.
    ///
    /// - already applied: `CouponAlreadyApplied`, state unchanged
    /// - blank code: validation error, no network call
    /// - backend rejection: inline error recorded, applied state unchanged
    #[instrument(skip(self, backend, subtotal))]
    pub async fn apply_coupon(
        &mut self,
        backend: &dyn CheckoutBackend,
        code: &str,
        subtotal: Price,
        restaurant_id: RestaurantId,
    ) -> CheckoutResult<Price> {
        if let Some(applied) = &self.applied {
            return Err(CheckoutError::CouponAlreadyApplied {
                code: applied.code.clone(),
            });
        }

        let code = code.trim();
        if code.is_empty() {
            let err = CheckoutError::validation("Please enter a coupon code.");
            self.error = Some(err.to_string());
            return Err(err);
        }

        self.applying = true;
        self.error = None;
        let request = ApplyCouponRequest {
            code: code.to_string(),
            subtotal,
            restaurant_id,
        };
        let result = backend.apply_coupon(&request).await;
        self.applying = false;

        match result {
            Ok(discount) => {
                info!(code, discount = %discount, "coupon applied");
                self.applied = Some(AppliedCoupon {
                    code: code.to_string(),
                    discount,
                });
                Ok(discount)
            }
            Err(e) => {
                warn!(code, error = %e, "coupon rejected");
                self.error = Some(e.user_message());
                Err(e)
            }
        }
    }

    /// Equivalent to typing the suggestion's code and applying it
    pub async fn select_suggestion(
        &mut self,
        backend: &dyn CheckoutBackend,
        coupon: &Coupon,
        subtotal: Price,
        restaurant_id: RestaurantId,
    ) -> CheckoutResult<Price> {
        self.apply_coupon(backend, &coupon.code, subtotal, restaurant_id)
            .await
    }

    /// Drop the applied coupon and any inline error
    pub fn reset(&mut self) {
        self.applied = None;
        self.error = None;
    }
}
