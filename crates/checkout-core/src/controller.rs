//! # Checkout Controller
//!
//! Composes the cart, scheduling, coupons, order placement and payment into
//! one checkout attempt with a single "place order" action.

use crate::cart::CartStore;
use crate::coupon::{Coupon, CouponEngine};
use crate::error::{CheckoutError, CheckoutResult};
use crate::money::{checkout_total, Price};
use crate::order::{OrderIntent, OrderPlacer};
use crate::payment::{CustomerContact, PaymentOrchestrator, PaymentOutcome};
use crate::ports::{BoxedBackend, BoxedGateway};
use crate::schedule::{OrderType, ScheduleChoice, SchedulingResolver, SELECT_TIME_SLOT_MESSAGE};
use crate::settings::CheckoutSettings;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Holds the in-flight flag for one submission.
///
/// Cleared on drop, so an abandoned `place_order` future unblocks the
/// controller as well as a completed one.
struct InFlightGuard<'a>(&'a mut bool);

impl<'a> InFlightGuard<'a> {
    fn raise(flag: &'a mut bool) -> Self {
        *flag = true;
        Self(flag)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}

/// Result of a submitted checkout
pub type CheckoutOutcome = PaymentOutcome;

/// Why the submit action is currently disabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitBlocker {
    InFlight,
    EmptyCart,
    MissingTimeSlot,
}

impl SubmitBlocker {
    pub fn message(&self) -> &'static str {
        match self {
            SubmitBlocker::InFlight => "Your order is already being placed.",
            SubmitBlocker::EmptyCart => "Your cart is empty.",
            SubmitBlocker::MissingTimeSlot => SELECT_TIME_SLOT_MESSAGE,
        }
    }
}

/// Price breakdown shown next to the submit action
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSummary {
    pub item_count: u32,
    pub subtotal: Price,
    pub delivery_fee: Price,
    pub discount: Price,
    pub total: Price,
    pub coupon_code: Option<String>,
}

/// One checkout attempt over the shared cart.
pub struct CheckoutController {
    cart: Arc<CartStore>,
    backend: BoxedBackend,
    placer: OrderPlacer,
    orchestrator: PaymentOrchestrator,
    settings: CheckoutSettings,
    scheduling: SchedulingResolver,
    coupons: CouponEngine,
    delivery_fee: Price,
    reference_date: Option<NaiveDate>,
    in_flight: bool,
}

impl CheckoutController {
    pub fn new(
        cart: Arc<CartStore>,
        backend: BoxedBackend,
        gateway: BoxedGateway,
        settings: CheckoutSettings,
        order_type: OrderType,
    ) -> Self {
        let orchestrator =
            PaymentOrchestrator::new(cart.clone(), backend.clone(), gateway, settings.clone());
        Self {
            placer: OrderPlacer::new(backend.clone()),
            delivery_fee: settings.default_delivery_fee(),
            cart,
            backend,
            orchestrator,
            settings,
            scheduling: SchedulingResolver::new(order_type),
            coupons: CouponEngine::new(),
            reference_date: None,
            in_flight: false,
        }
    }

    /// Load the delivery fee, coupon suggestions and, when scheduling,
    /// availability from `reference_date`. Individual lookup failures are
    /// logged and fall back to defaults.
    #[instrument(skip(self))]
    pub async fn initialize(&mut self, reference_date: NaiveDate) {
        self.reference_date = Some(reference_date);
        let Some(restaurant_id) = self.cart.restaurant_id() else {
            info!("cart is empty, nothing to load");
            return;
        };

        self.delivery_fee = match self.backend.delivery_fee(restaurant_id).await {
            Ok(Some(fee)) => fee,
            Ok(None) => self.settings.default_delivery_fee(),
            Err(e) => {
                warn!(error = %e, "failed to load delivery fee, using default");
                self.settings.default_delivery_fee()
            }
        };

        self.coupons
            .list_applicable(self.backend.as_ref(), restaurant_id)
            .await;
        self.refresh_availability().await;
    }

    async fn refresh_availability(&mut self) {
        let (Some(restaurant_id), Some(date)) = (self.cart.restaurant_id(), self.reference_date)
        else {
            return;
        };
        // failures are kept in `slots_error`
        let _ = self
            .scheduling
            .fetch_availability(self.backend.as_ref(), restaurant_id, date)
            .await;
    }

    pub fn order_type(&self) -> OrderType {
        self.scheduling.order_type()
    }

    /// Switch order type. Resets the time selection and the applied coupon,
    /// then reloads availability if the new type needs a slot.
    pub async fn set_order_type(&mut self, order_type: OrderType) {
        self.scheduling.set_order_type(order_type);
        self.coupons.reset();
        self.refresh_availability().await;
    }

    /// Choose "now" or "later" for takeaway
    pub async fn set_schedule_choice(&mut self, choice: ScheduleChoice) {
        self.scheduling.set_choice(choice);
        if self.scheduling.is_scheduling() && self.scheduling.days().is_empty() {
            self.refresh_availability().await;
        }
    }

    pub fn select_date(&mut self, date_value: &str) -> CheckoutResult<()> {
        self.scheduling.select_date(date_value)
    }

    pub fn select_time(&mut self, slot_value: &str) -> CheckoutResult<()> {
        self.scheduling.select_time(slot_value)
    }

    pub fn scheduling(&self) -> &SchedulingResolver {
        &self.scheduling
    }

    pub fn coupons(&self) -> &CouponEngine {
        &self.coupons
    }

    pub async fn apply_coupon(&mut self, code: &str) -> CheckoutResult<Price> {
        let restaurant_id = self
            .cart
            .restaurant_id()
            .ok_or_else(|| CheckoutError::validation(SubmitBlocker::EmptyCart.message()))?;
        let subtotal = self.subtotal();
        self.coupons
            .apply_coupon(self.backend.as_ref(), code, subtotal, restaurant_id)
            .await
    }

    pub async fn select_coupon(&mut self, coupon: &Coupon) -> CheckoutResult<Price> {
        self.apply_coupon(&coupon.code).await
    }

    pub fn subtotal(&self) -> Price {
        self.cart.subtotal()
    }

    pub fn delivery_fee(&self) -> Price {
        self.delivery_fee
    }

    pub fn discount(&self) -> Price {
        self.coupons.discount(self.cart.currency())
    }

    /// `max(0, subtotal + delivery_fee - discount)` from current inputs
    pub fn total(&self) -> Price {
        checkout_total(self.subtotal(), self.delivery_fee, self.discount())
    }

    pub fn summary(&self) -> CheckoutSummary {
        CheckoutSummary {
            item_count: self.cart.item_count(),
            subtotal: self.subtotal(),
            delivery_fee: self.delivery_fee,
            discount: self.discount(),
            total: self.total(),
            coupon_code: self.coupons.applied_code().map(str::to_string),
        }
    }

    pub fn submit_blockers(&self) -> Vec<SubmitBlocker> {
        let mut blockers = Vec::new();
        if self.in_flight {
            blockers.push(SubmitBlocker::InFlight);
        }
        if self.cart.is_empty() {
            blockers.push(SubmitBlocker::EmptyCart);
        }
        if self.scheduling.is_blocking() {
            blockers.push(SubmitBlocker::MissingTimeSlot);
        }
        blockers
    }

    pub fn can_submit(&self) -> bool {
        self.submit_blockers().is_empty()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Place the order and run payment.
    ///
    /// Local validation and order-placement failures are returned as errors
    /// and leave the checkout as it was. Once an order exists the result is
    /// always an outcome, whatever happened during payment.
    #[instrument(skip(self, contact), fields(order_type = %self.order_type()))]
    pub async fn place_order(&mut self, contact: CustomerContact) -> CheckoutResult<CheckoutOutcome> {
        if let Some(blocker) = self.submit_blockers().first() {
            return Err(CheckoutError::validation(blocker.message()));
        }

        let intent = OrderIntent::from_cart(
            &self.cart.snapshot(),
            self.scheduling.order_type(),
            self.coupons.applied_code().map(str::to_string),
            self.scheduling.scheduled_time(),
            self.cart.scope(),
        );

        let _in_flight = InFlightGuard::raise(&mut self.in_flight);
        let placed = self
            .placer
            .place(&intent, self.scheduling.is_scheduling())
            .await;
        let order_id = match placed {
            Ok(order_id) => order_id,
            Err(e) => {
                warn!(error = %e, "order placement failed");
                return Err(e);
            }
        };

        let outcome = self.orchestrator.pay(order_id, contact).await;
        info!(order_id, state = %outcome.state(), "checkout finished");
        Ok(outcome)
    }

    /// Clear the cart and all per-checkout state
    pub fn logout(&mut self) -> CheckoutResult<()> {
        self.cart.clear()?;
        self.coupons.reset();
        self.scheduling = SchedulingResolver::new(self.scheduling.order_type());
        self.delivery_fee = self.settings.default_delivery_fee();
        Ok(())
    }
}
