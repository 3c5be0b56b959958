//! # Checkout Ports
//!
//! The two external collaborators of a checkout, expressed as traits so the
//! HTTP client, the gateway UI and the test fakes can be swapped freely.
//!
//! ```text
//! ┌───────────────────────────────┐   ┌───────────────────────────────┐
//! │   CheckoutBackend (trait)     │   │   PaymentGateway (trait)      │
//! │  ├── delivery_fee()           │   │  ├── load()                   │
//! │  ├── available_slots()        │   │  ├── open()                   │
//! │  ├── applicable_coupons()     │   │  └── provider_name()          │
//! │  ├── apply_coupon()           │   └───────────────────────────────┘
//! │  ├── place_order()            │                   ▲
//! │  ├── create_payment()         │                   │
//! │  └── verify_payment()         │            ChannelGateway
//! └───────────────────────────────┘
//!                ▲
//!          HttpBackend
//! ```

use crate::coupon::{ApplyCouponRequest, Coupon};
use crate::error::CheckoutResult;
use crate::ids::{OrderId, RestaurantId};
use crate::money::Price;
use crate::order::OrderIntent;
use crate::payment::{GatewayCallback, GatewayHandoff, GatewayOrder, VerifyPaymentRequest};
use crate::schedule::AvailableDay;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

/// Cravt API operations used during checkout.
///
/// Every call carries the caller's auth token. Non-success responses
/// surface as `CheckoutError::Backend` with the server-provided message.
#[async_trait]
pub trait CheckoutBackend: Send + Sync {
    /// Restaurant delivery fee, if the restaurant publishes one.
    async fn delivery_fee(&self, restaurant_id: RestaurantId) -> CheckoutResult<Option<Price>>;

    /// Bookable days and slots from `date` onwards.
    async fn available_slots(
        &self,
        restaurant_id: RestaurantId,
        date: NaiveDate,
    ) -> CheckoutResult<Vec<AvailableDay>>;

    /// Coupons the customer may apply at this restaurant.
    async fn applicable_coupons(&self, restaurant_id: RestaurantId) -> CheckoutResult<Vec<Coupon>>;

    /// Validate a coupon and return the discount it grants.
    async fn apply_coupon(&self, request: &ApplyCouponRequest) -> CheckoutResult<Price>;

    /// Create the order and return its id.
    async fn place_order(&self, intent: &OrderIntent) -> CheckoutResult<OrderId>;

    /// Create the gateway-side order for an existing order.
    async fn create_payment(&self, order_id: OrderId) -> CheckoutResult<GatewayOrder>;

    /// Verify the gateway's payment proof; returns the server message.
    async fn verify_payment(&self, request: &VerifyPaymentRequest) -> CheckoutResult<String>;
}

/// External payment gateway client.
///
/// `load` makes the gateway client available; `open` hands the payment
/// off to the gateway UI and resolves once the customer finished or the
/// gateway reported a failure.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn load(&self) -> CheckoutResult<()>;

    async fn open(&self, handoff: GatewayHandoff) -> CheckoutResult<GatewayCallback>;

    /// Get the provider name (for logging).
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a shared backend (dynamic dispatch)
pub type BoxedBackend = Arc<dyn CheckoutBackend>;

/// Type alias for a shared gateway (dynamic dispatch)
pub type BoxedGateway = Arc<dyn PaymentGateway>;
