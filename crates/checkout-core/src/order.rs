//! # Order Intent
//!
//! The immutable order payload built once per checkout attempt, and the
//! placer that validates it and submits it to the backend.

use crate::cart::Cart;
use crate::error::{CheckoutError, CheckoutResult};
use crate::ids::{MenuItemId, OrderId, RestaurantId};
use crate::ports::BoxedBackend;
use crate::schedule::{OrderType, SELECT_TIME_SLOT_MESSAGE};
use crate::storage::StorageScope;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, instrument};

/// One ordered menu item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub menu_item_id: MenuItemId,
    pub quantity: u32,
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderIntent {
    #[serde(skip_serializing_if = "Option::is_none")]
    restaurant_id: Option<RestaurantId>,
    order_type: OrderType,
    items: Vec<OrderLine>,
    coupon_code: Option<String>,
    scheduled_time: Option<String>,

    /// Sent as the `Idempotency-Key` header, not in the body
    #[serde(skip)]
    idempotency_key: String,
}

impl OrderIntent {
    pub fn new(
        restaurant_id: Option<RestaurantId>,
        order_type: OrderType,
        items: Vec<OrderLine>,
        coupon_code: Option<String>,
        scheduled_time: Option<String>,
        scope: &StorageScope,
    ) -> Self {
        let mut intent = Self {
            restaurant_id,
            order_type,
            items,
            coupon_code,
            scheduled_time,
            idempotency_key: String::new(),
        };
        intent.idempotency_key = intent.fingerprint(scope);
        intent
    }

    /// Build the intent from the current cart contents
    pub fn from_cart(
        cart: &Cart,
        order_type: OrderType,
        coupon_code: Option<String>,
        scheduled_time: Option<String>,
        scope: &StorageScope,
    ) -> Self {
        let items = cart
            .entries()
            .iter()
            .map(|e| OrderLine {
                menu_item_id: e.id,
                quantity: e.quantity,
            })
            .collect();
        Self::new(
            cart.restaurant_id(),
            order_type,
            items,
            coupon_code,
            scheduled_time,
            scope,
        )
    }

    pub fn restaurant_id(&self) -> Option<RestaurantId> {
        self.restaurant_id
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn items(&self) -> &[OrderLine] {
        &self.items
    }

    pub fn coupon_code(&self) -> Option<&str> {
        self.coupon_code.as_deref()
    }

    pub fn scheduled_time(&self) -> Option<&str> {
        self.scheduled_time.as_deref()
    }

    pub fn idempotency_key(&self) -> &str {
        &self.idempotency_key
    }

    /// Local checks run before any network call
    pub fn validate(&self, requires_schedule: bool) -> CheckoutResult<()> {
        if requires_schedule && self.scheduled_time.as_deref().map_or(true, str::is_empty) {
            return Err(CheckoutError::validation(SELECT_TIME_SLOT_MESSAGE));
        }
        if self.items.is_empty() {
            return Err(CheckoutError::validation("Your cart is empty."));
        }
        if self.restaurant_id.is_none() {
            return Err(CheckoutError::validation(
                "No restaurant selected for this order.",
            ));
        }
        Ok(())
    }

    /// SHA-256 over the fields that make two submissions the same order.
    /// Item order does not matter.
    fn fingerprint(&self, scope: &StorageScope) -> String {
        let mut items: Vec<(MenuItemId, u32)> = self
            .items
            .iter()
            .map(|l| (l.menu_item_id, l.quantity))
            .collect();
        items.sort_unstable();

        let mut hasher = Sha256::new();
        hasher.update(scope.label().as_bytes());
        hasher.update(b"|");
        hasher.update(
            self.restaurant_id
                .map(|r| r.to_string())
                .unwrap_or_default()
                .as_bytes(),
        );
        hasher.update(b"|");
        hasher.update(self.order_type.as_str().as_bytes());
        hasher.update(b"|");
        for (id, qty) in items {
            hasher.update(format!("{}x{};", id, qty).as_bytes());
        }
        hasher.update(b"|");
        hasher.update(self.coupon_code.as_deref().unwrap_or_default().as_bytes());
        hasher.update(b"|");
        hasher.update(self.scheduled_time.as_deref().unwrap_or_default().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Submits validated intents to the backend.
#[derive(Clone)]
pub struct OrderPlacer {
    backend: BoxedBackend,
}

impl OrderPlacer {
    pub fn new(backend: BoxedBackend) -> Self {
        Self { backend }
    }

    /// Validate `intent` and create the order.
    ///
    /// Validation failures return before the backend is contacted.
    #[instrument(skip(self, intent), fields(restaurant_id = ?intent.restaurant_id(), items = intent.items().len()))]
    pub async fn place(&self, intent: &OrderIntent, requires_schedule: bool) -> CheckoutResult<OrderId> {
        intent.validate(requires_schedule)?;
        let order_id = self.backend.place_order(intent).await?;
        info!(order_id, "order placed");
        Ok(order_id)
    }
}
