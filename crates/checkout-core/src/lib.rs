//! # checkout-core
//!
//! Core types and components of the cravt checkout engine.
//!
//! This crate provides:
//! - `CartStore`: durable, observable single-restaurant cart
//! - `SchedulingResolver`: order type and time-slot selection
//! - `CouponEngine`: one-coupon-per-checkout discount handling
//! - `OrderPlacer`: validated order submission
//! - `PaymentOrchestrator`: gateway lifecycle and server-side verification
//! - `CheckoutController`: the single "place order" flow over all of the above
//! - `CheckoutBackend` / `PaymentGateway` ports and `CheckoutError`
//!
//! ## Example
//!
//! ```rust,ignore
//! use checkout_core::{CartStore, CheckoutController, CheckoutSettings, OrderType};
//!
//! let cart = Arc::new(CartStore::load(storage, StorageScope::Global, Currency::INR)?);
//! cart.add_item(MenuItem::new(1, "Masala Dosa", Price::new(120.0, Currency::INR)), 7)?;
//!
//! let mut checkout = CheckoutController::new(cart, backend, gateway, settings, OrderType::Takeaway);
//! checkout.initialize(today).await;
//! let outcome = checkout.place_order(contact).await?;
//! ```

pub mod cart;
pub mod controller;
pub mod coupon;
pub mod error;
pub mod ids;
pub mod money;
pub mod order;
pub mod payment;
pub mod ports;
pub mod schedule;
pub mod settings;
pub mod storage;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use cart::{Cart, CartEntry, CartStore, MenuItem};
pub use controller::{CheckoutController, CheckoutOutcome, CheckoutSummary, SubmitBlocker};
pub use coupon::{AppliedCoupon, ApplyCouponRequest, Coupon, CouponEngine, DiscountKind};
pub use error::{CheckoutError, CheckoutResult, CART_CONFLICT_MESSAGE};
pub use ids::{MenuItemId, OrderId, RestaurantId};
pub use money::{checkout_total, Currency, Price, MAX_UNIT_PRICE_MINOR};
pub use order::{OrderIntent, OrderLine, OrderPlacer};
pub use payment::{
    CustomerContact, GatewayCallback, GatewayHandoff, GatewayOrder, Navigation,
    PaymentOrchestrator, PaymentOutcome, PaymentSession, PaymentState, VerifyPaymentRequest,
    VERIFICATION_WARNING,
};
pub use ports::{BoxedBackend, BoxedGateway, CheckoutBackend, PaymentGateway};
pub use schedule::{
    AvailableDay, OrderType, ScheduleChoice, ScheduleSelection, SchedulingResolver, TimeSlot,
    SELECT_TIME_SLOT_MESSAGE,
};
pub use settings::CheckoutSettings;
pub use storage::{
    FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, SharedKeyValueStore, StorageScope,
};
