//! # Payment Orchestration
//!
//! Drives one payment attempt for an already-created order:
//!
//! ```text
//! Idle -> OrderCreated -> GatewayOrderCreated -> AwaitingGatewayUi
//!   AwaitingGatewayUi   -> AwaitingUserPayment | DevModeSimulated | Failed
//!   AwaitingUserPayment -> Verifying | Failed
//!   DevModeSimulated    -> Verifying
//!   Verifying           -> Verified | VerifiedWithWarning
//! ```
//!
//! `Verified`, `VerifiedWithWarning` and `Failed` are terminal. A session is
//! never reused: a retry starts from a new order.

use crate::cart::CartStore;
use crate::error::{CheckoutError, CheckoutResult};
use crate::ids::OrderId;
use crate::money::Price;
use crate::ports::{BoxedBackend, BoxedGateway};
use crate::settings::CheckoutSettings;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Shown when the gateway charged the customer but the backend could not
/// confirm the payment.
pub const VERIFICATION_WARNING: &str =
    "Payment succeeded but verification failed. Please contact support.";

/// Lifecycle of a payment session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Idle,
    OrderCreated,
    GatewayOrderCreated,
    AwaitingGatewayUi,
    AwaitingUserPayment,
    DevModeSimulated,
    Verifying,
    Verified,
    VerifiedWithWarning,
    Failed,
}

impl PaymentState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentState::Verified | PaymentState::VerifiedWithWarning | PaymentState::Failed
        )
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: PaymentState) -> bool {
        use PaymentState::*;
        match (self, next) {
            (Idle, OrderCreated) => true,
            (OrderCreated, GatewayOrderCreated) => true,
            (GatewayOrderCreated, AwaitingGatewayUi) => true,
            (AwaitingGatewayUi, AwaitingUserPayment | DevModeSimulated) => true,
            (AwaitingUserPayment | DevModeSimulated, Verifying) => true,
            (Verifying, Verified | VerifiedWithWarning) => true,
            (state, Failed) => !state.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PaymentState::Idle => "idle",
            PaymentState::OrderCreated => "order_created",
            PaymentState::GatewayOrderCreated => "gateway_order_created",
            PaymentState::AwaitingGatewayUi => "awaiting_gateway_ui",
            PaymentState::AwaitingUserPayment => "awaiting_user_payment",
            PaymentState::DevModeSimulated => "dev_mode_simulated",
            PaymentState::Verifying => "verifying",
            PaymentState::Verified => "verified",
            PaymentState::VerifiedWithWarning => "verified_with_warning",
            PaymentState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Gateway-side order issued by `POST /payments/create`
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayOrder {
    pub gateway_order_id: String,
    /// Public gateway key for the client
    pub gateway_key: String,
    pub amount: Price,
}

/// Customer details used to prefill the gateway form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerContact {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl CustomerContact {
    pub fn new(name: Option<String>, email: Option<String>) -> Self {
        Self { name, email }
    }
}

/// Everything the gateway UI needs to collect a payment
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayHandoff {
    pub key: String,
    pub amount: Price,
    pub merchant_name: String,
    /// "Order #<id>"
    pub description: String,
    pub gateway_order_id: String,
    pub prefill: CustomerContact,
    pub theme_color: String,
}

impl GatewayHandoff {
    pub fn currency(&self) -> &'static str {
        self.amount.currency.as_str()
    }
}

/// Result reported by the gateway UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCallback {
    Success {
        payment_id: String,
        gateway_order_id: String,
        signature: String,
    },
    Failure {
        description: String,
    },
}

/// Body of `POST /payments/verify`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyPaymentRequest {
    pub order_id: OrderId,
    #[serde(rename = "razorpay_order_id")]
    pub gateway_order_id: String,
    #[serde(rename = "razorpay_payment_id")]
    pub payment_id: String,
    #[serde(rename = "razorpay_signature")]
    pub signature: String,
}

/// Where the customer should be taken after a payment attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// Remain on checkout
    Stay,
    OrderDetail(OrderId),
}

/// One payment attempt. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSession {
    order_id: OrderId,
    gateway_order: Option<GatewayOrder>,
    state: PaymentState,
}

impl PaymentSession {
    /// A session for a freshly created order
    pub fn new(order_id: OrderId) -> Self {
        Self {
            order_id,
            gateway_order: None,
            state: PaymentState::Idle,
        }
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn state(&self) -> PaymentState {
        self.state
    }

    pub fn gateway_order(&self) -> Option<&GatewayOrder> {
        self.gateway_order.as_ref()
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow
    pub fn advance(&mut self, next: PaymentState) -> CheckoutResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(CheckoutError::Internal(format!(
                "illegal payment transition {} -> {}",
                self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }

    fn attach_gateway_order(&mut self, order: GatewayOrder) -> CheckoutResult<()> {
        self.advance(PaymentState::GatewayOrderCreated)?;
        self.gateway_order = Some(order);
        Ok(())
    }

    fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = PaymentState::Failed;
        }
    }
}

/// Terminal result of a payment attempt
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentOutcome {
    pub session: PaymentSession,
    pub navigation: Navigation,
    /// Message to show the customer, if any
    pub notice: Option<String>,
}

impl PaymentOutcome {
    pub fn state(&self) -> PaymentState {
        self.session.state()
    }

    pub fn order_id(&self) -> OrderId {
        self.session.order_id()
    }

    pub fn is_paid(&self) -> bool {
        matches!(
            self.state(),
            PaymentState::Verified | PaymentState::VerifiedWithWarning
        )
    }
}

/// Runs the payment lifecycle against the backend and the gateway.
#[derive(Clone)]
pub struct PaymentOrchestrator {
    cart: Arc<CartStore>,
    backend: BoxedBackend,
    gateway: BoxedGateway,
    settings: CheckoutSettings,
}

impl PaymentOrchestrator {
    pub fn new(
        cart: Arc<CartStore>,
        backend: BoxedBackend,
        gateway: BoxedGateway,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            cart,
            backend,
            gateway,
            settings,
        }
    }

    /// Collect payment for `order_id`.
    ///
    /// Never returns an error: every failure is folded into the outcome's
    /// terminal state, notice and navigation.
    #[instrument(skip(self, contact), fields(gateway = self.gateway.provider_name()))]
    pub async fn pay(&self, order_id: OrderId, contact: CustomerContact) -> PaymentOutcome {
        let mut session = PaymentSession::new(order_id);
        match self.drive(&mut session, contact).await {
            Ok(outcome) => outcome,
            Err(CheckoutError::GatewayPayment { description }) => {
                warn!(order_id, %description, "gateway reported payment failure");
                session.fail();
                PaymentOutcome {
                    session,
                    navigation: Navigation::Stay,
                    notice: Some(format!("Payment failed: {}", description)),
                }
            }
            Err(e) => {
                error!(order_id, error = %e, state = %session.state(), "payment could not be started");
                session.fail();
                PaymentOutcome {
                    session,
                    navigation: Navigation::OrderDetail(order_id),
                    notice: Some(format!("Unable to start payment: {}", e.user_message())),
                }
            }
        }
    }

    async fn drive(
        &self,
        session: &mut PaymentSession,
        contact: CustomerContact,
    ) -> CheckoutResult<PaymentOutcome> {
        session.advance(PaymentState::OrderCreated)?;

        let gateway_order = self.backend.create_payment(session.order_id()).await?;
        info!(
            order_id = session.order_id(),
            gateway_order_id = %gateway_order.gateway_order_id,
            amount = %gateway_order.amount,
            "gateway order created"
        );
        session.attach_gateway_order(gateway_order.clone())?;

        session.advance(PaymentState::AwaitingGatewayUi)?;
        let request = match self.gateway.load().await {
            Ok(()) => {
                session.advance(PaymentState::AwaitingUserPayment)?;
                let handoff = self.handoff(session.order_id(), &gateway_order, contact);
                match self.gateway.open(handoff).await? {
                    GatewayCallback::Success {
                        payment_id,
                        gateway_order_id,
                        signature,
                    } => VerifyPaymentRequest {
                        order_id: session.order_id(),
                        gateway_order_id,
                        payment_id,
                        signature,
                    },
                    GatewayCallback::Failure { description } => {
                        return Err(CheckoutError::GatewayPayment { description });
                    }
                }
            }
            Err(e) if self.settings.allow_dev_payments => {
                warn!(error = %e, "gateway unavailable, simulating payment");
                session.advance(PaymentState::DevModeSimulated)?;
                simulated_payment(session.order_id(), &gateway_order)
            }
            Err(e) => return Err(e),
        };

        session.advance(PaymentState::Verifying)?;
        Ok(self.verify(session.clone(), request).await)
    }

    async fn verify(
        &self,
        mut session: PaymentSession,
        request: VerifyPaymentRequest,
    ) -> PaymentOutcome {
        let order_id = session.order_id();
        match self.backend.verify_payment(&request).await {
            Ok(message) => {
                session.state = PaymentState::Verified;
                info!(order_id, payment_id = %request.payment_id, "payment verified");
                if let Err(e) = self.cart.clear() {
                    error!(order_id, error = %e, "failed to clear cart after payment");
                }
                PaymentOutcome {
                    session,
                    navigation: Navigation::OrderDetail(order_id),
                    notice: Some(message),
                }
            }
            Err(e) => {
                let mismatch = CheckoutError::VerificationMismatch {
                    order_id,
                    message: e.to_string(),
                };
                error!(
                    order_id,
                    gateway_order_id = %request.gateway_order_id,
                    payment_id = %request.payment_id,
                    error = %mismatch,
                    "payment verification failed"
                );
                session.state = PaymentState::VerifiedWithWarning;
                PaymentOutcome {
                    session,
                    navigation: Navigation::OrderDetail(order_id),
                    notice: Some(VERIFICATION_WARNING.to_string()),
                }
            }
        }
    }

    fn handoff(
        &self,
        order_id: OrderId,
        gateway_order: &GatewayOrder,
        prefill: CustomerContact,
    ) -> GatewayHandoff {
        GatewayHandoff {
            key: gateway_order.gateway_key.clone(),
            amount: gateway_order.amount,
            merchant_name: self.settings.merchant_name.clone(),
            description: format!("Order #{}", order_id),
            gateway_order_id: gateway_order.gateway_order_id.clone(),
            prefill,
            theme_color: self.settings.theme_color.clone(),
        }
    }
}

fn simulated_payment(order_id: OrderId, gateway_order: &GatewayOrder) -> VerifyPaymentRequest {
    VerifyPaymentRequest {
        order_id,
        gateway_order_id: gateway_order.gateway_order_id.clone(),
        payment_id: format!("pay_dev_{}", random_suffix()),
        signature: format!("mock_signature_{}", random_suffix()),
    }
}

fn random_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..9].to_string()
}
