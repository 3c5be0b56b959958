//! In-process fakes of the checkout ports for unit tests.

use crate::coupon::{ApplyCouponRequest, Coupon};
use crate::error::{CheckoutError, CheckoutResult};
use crate::ids::{OrderId, RestaurantId};
use crate::money::{Currency, Price};
use crate::order::OrderIntent;
use crate::payment::{GatewayCallback, GatewayHandoff, GatewayOrder, VerifyPaymentRequest};
use crate::ports::{CheckoutBackend, PaymentGateway};
use crate::schedule::AvailableDay;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Scriptable `CheckoutBackend` that records every call.
#[derive(Debug, Default)]
pub struct FakeBackend {
    delivery_fee: Option<Price>,
    days: Vec<AvailableDay>,
    suggestions: Vec<Coupon>,
    discounts: HashMap<String, Price>,
    order_id: OrderId,
    failing: HashSet<&'static str>,
    calls: Mutex<HashMap<&'static str, usize>>,
    last_intent: Mutex<Option<OrderIntent>>,
    last_verify: Mutex<Option<VerifyPaymentRequest>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            order_id: 501,
            ..Self::default()
        }
    }

    pub fn with_delivery_fee(mut self, fee: Price) -> Self {
        self.delivery_fee = Some(fee);
        self
    }

    pub fn with_days(mut self, days: Vec<AvailableDay>) -> Self {
        self.days = days;
        self
    }

    pub fn with_suggestions(mut self, coupons: Vec<Coupon>) -> Self {
        self.suggestions = coupons;
        self
    }

    pub fn with_coupon_discount(mut self, code: &str, discount: Price) -> Self {
        self.discounts.insert(code.to_string(), discount);
        self
    }

    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = order_id;
        self
    }

    /// Make `op` answer with a server error
    pub fn failing(mut self, op: &'static str) -> Self {
        self.failing.insert(op);
        self
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn last_intent(&self) -> Option<OrderIntent> {
        self.last_intent.lock().unwrap().clone()
    }

    pub fn last_verify(&self) -> Option<VerifyPaymentRequest> {
        self.last_verify.lock().unwrap().clone()
    }

    fn record(&self, op: &'static str) -> CheckoutResult<()> {
        *self.calls.lock().unwrap().entry(op).or_default() += 1;
        if self.failing.contains(op) {
            return Err(CheckoutError::Backend {
                status: 500,
                message: format!("{} unavailable", op),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CheckoutBackend for FakeBackend {
    async fn delivery_fee(&self, _restaurant_id: RestaurantId) -> CheckoutResult<Option<Price>> {
        self.record("delivery_fee")?;
        Ok(self.delivery_fee)
    }

    async fn available_slots(
        &self,
        _restaurant_id: RestaurantId,
        _date: NaiveDate,
    ) -> CheckoutResult<Vec<AvailableDay>> {
        self.record("available_slots")?;
        Ok(self.days.clone())
    }

    async fn applicable_coupons(&self, _restaurant_id: RestaurantId) -> CheckoutResult<Vec<Coupon>> {
        self.record("applicable_coupons")?;
        Ok(self.suggestions.clone())
    }

    async fn apply_coupon(&self, request: &ApplyCouponRequest) -> CheckoutResult<Price> {
        self.record("apply_coupon")?;
        self.discounts
            .get(&request.code)
            .copied()
            .ok_or_else(|| CheckoutError::Backend {
                status: 404,
                message: "Invalid or expired coupon code.".to_string(),
            })
    }

    async fn place_order(&self, intent: &OrderIntent) -> CheckoutResult<OrderId> {
        self.record("place_order")?;
        *self.last_intent.lock().unwrap() = Some(intent.clone());
        Ok(self.order_id)
    }

    async fn create_payment(&self, order_id: OrderId) -> CheckoutResult<GatewayOrder> {
        self.record("create_payment")?;
        Ok(GatewayOrder {
            gateway_order_id: format!("order_gw_{}", order_id),
            gateway_key: "rzp_test_key".to_string(),
            amount: Price::from_minor(25_000, Currency::INR),
        })
    }

    async fn verify_payment(&self, request: &VerifyPaymentRequest) -> CheckoutResult<String> {
        *self.last_verify.lock().unwrap() = Some(request.clone());
        self.record("verify_payment")?;
        Ok("Payment verified successfully".to_string())
    }
}

/// Scriptable `PaymentGateway`.
#[derive(Debug)]
pub struct FakeGateway {
    available: bool,
    hangs: bool,
    callback: GatewayCallback,
    loaded: Mutex<usize>,
    handoffs: Mutex<Vec<GatewayHandoff>>,
}

impl FakeGateway {
    pub fn succeeding(payment_id: &str, signature: &str) -> Self {
        Self::with_callback(
            true,
            GatewayCallback::Success {
                payment_id: payment_id.to_string(),
                gateway_order_id: String::new(),
                signature: signature.to_string(),
            },
        )
    }

    pub fn failing(description: &str) -> Self {
        Self::with_callback(
            true,
            GatewayCallback::Failure {
                description: description.to_string(),
            },
        )
    }

    pub fn unavailable() -> Self {
        Self::with_callback(
            false,
            GatewayCallback::Failure {
                description: "never opened".to_string(),
            },
        )
    }

    /// Opens the gateway UI and never answers.
    pub fn hanging() -> Self {
        Self {
            hangs: true,
            ..Self::succeeding("never", "never")
        }
    }

    fn with_callback(available: bool, callback: GatewayCallback) -> Self {
        Self {
            available,
            hangs: false,
            callback,
            loaded: Mutex::new(0),
            handoffs: Mutex::new(Vec::new()),
        }
    }

    pub fn loaded(&self) -> usize {
        *self.loaded.lock().unwrap()
    }

    pub fn opened(&self) -> usize {
        self.handoffs.lock().unwrap().len()
    }

    pub fn last_handoff(&self) -> Option<GatewayHandoff> {
        self.handoffs.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn load(&self) -> CheckoutResult<()> {
        *self.loaded.lock().unwrap() += 1;
        if self.available {
            Ok(())
        } else {
            Err(CheckoutError::GatewayLoad("script blocked".to_string()))
        }
    }

    async fn open(&self, handoff: GatewayHandoff) -> CheckoutResult<GatewayCallback> {
        let gateway_order_id = handoff.gateway_order_id.clone();
        self.handoffs.lock().unwrap().push(handoff);
        if self.hangs {
            std::future::pending::<()>().await;
        }
        Ok(match &self.callback {
            GatewayCallback::Success {
                payment_id,
                signature,
                ..
            } => GatewayCallback::Success {
                payment_id: payment_id.clone(),
                gateway_order_id,
                signature: signature.clone(),
            },
            failure => failure.clone(),
        })
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}
