//! # Cravt API Client
//!
//! `CheckoutBackend` implementation over the Cravt REST API.
//! JSON bodies, snake_case keys, `Authentication-Token` auth header.

use crate::config::ClientConfig;
use async_trait::async_trait;
use checkout_core::{
    ApplyCouponRequest, AvailableDay, CheckoutBackend, CheckoutError, CheckoutResult, Coupon,
    Currency, GatewayOrder, OrderId, OrderIntent, Price, RestaurantId, VerifyPaymentRequest,
};
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

pub const AUTH_HEADER: &str = "Authentication-Token";
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// HTTP client for the checkout endpoints of the Cravt API
pub struct HttpBackend {
    config: ClientConfig,
    client: Client,
    currency: Currency,
}

impl HttpBackend {
    /// Create a new client; amounts are interpreted in INR
    pub fn new(config: ClientConfig) -> CheckoutResult<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CheckoutError::Configuration(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            currency: Currency::INR,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> CheckoutResult<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Builder: currency used for decimal amounts on the wire
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.auth_token {
            Some(token) => request.header(AUTH_HEADER, token),
            None => request,
        }
    }

    /// Send `request` and decode a successful JSON body.
    ///
    /// Non-success responses become `CheckoutError::Backend` carrying the
    /// server's `message`, or "HTTP error! Status: N" when there is none.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> CheckoutResult<T> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| CheckoutError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CheckoutError::Network(e.to_string()))?;

        if !status.is_success() {
            error!(status = status.as_u16(), %body, "Cravt API error");
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| format!("HTTP error! Status: {}", status.as_u16()));
            return Err(CheckoutError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            CheckoutError::Serialization(format!("Failed to parse Cravt response: {}", e))
        })
    }

    fn price(&self, amount: f64) -> Price {
        Price::new(amount, self.currency)
    }
}

#[async_trait]
impl CheckoutBackend for HttpBackend {
    #[instrument(skip(self))]
    async fn delivery_fee(&self, restaurant_id: RestaurantId) -> CheckoutResult<Option<Price>> {
        let url = self.config.endpoint(&format!("/restaurants/{}", restaurant_id));
        let restaurant: RestaurantResponse = self.send(self.client.get(&url)).await?;
        Ok(restaurant.delivery_fee.map(|fee| self.price(fee)))
    }

    #[instrument(skip(self))]
    async fn available_slots(
        &self,
        restaurant_id: RestaurantId,
        date: NaiveDate,
    ) -> CheckoutResult<Vec<AvailableDay>> {
        let url = self
            .config
            .endpoint(&format!("/restaurants/{}/available-slots", restaurant_id));
        let request = self
            .client
            .get(&url)
            .query(&[("date", date.format("%Y-%m-%d").to_string())]);
        let slots: SlotsResponse = self.send(request).await?;
        let days = slots.into_days();
        debug!(days = days.len(), "available slots loaded");
        Ok(days)
    }

    #[instrument(skip(self))]
    async fn applicable_coupons(&self, restaurant_id: RestaurantId) -> CheckoutResult<Vec<Coupon>> {
        let url = self
            .config
            .endpoint(&format!("/coupons/applicable/{}", restaurant_id));
        self.send(self.client.get(&url)).await
    }

    #[instrument(skip(self, request), fields(code = %request.code))]
    async fn apply_coupon(&self, request: &ApplyCouponRequest) -> CheckoutResult<Price> {
        let body = ApplyCouponBody {
            code: &request.code,
            subtotal: request.subtotal.as_decimal(),
            restaurant_id: request.restaurant_id,
        };
        let url = self.config.endpoint("/coupons/apply");
        let response: ApplyCouponResponse = self.send(self.client.post(&url).json(&body)).await?;
        Ok(self.price(response.discount))
    }

    #[instrument(skip(self, intent), fields(restaurant_id = ?intent.restaurant_id()))]
    async fn place_order(&self, intent: &OrderIntent) -> CheckoutResult<OrderId> {
        let url = self.config.endpoint("/orders");
        let request = self
            .client
            .post(&url)
            .header(IDEMPOTENCY_HEADER, intent.idempotency_key())
            .json(intent);
        let response: PlaceOrderResponse = self.send(request).await?;
        info!(order_id = response.order_id, "order created");
        Ok(response.order_id)
    }

    #[instrument(skip(self))]
    async fn create_payment(&self, order_id: OrderId) -> CheckoutResult<GatewayOrder> {
        let url = self.config.endpoint("/payments/create");
        let response: CreatePaymentResponse = self
            .send(self.client.post(&url).json(&CreatePaymentBody { order_id }))
            .await?;
        Ok(GatewayOrder {
            gateway_order_id: response.razorpay_order_id,
            gateway_key: response.razorpay_key,
            amount: Price::from_minor(response.amount, self.currency),
        })
    }

    #[instrument(skip(self, request), fields(order_id = request.order_id))]
    async fn verify_payment(&self, request: &VerifyPaymentRequest) -> CheckoutResult<String> {
        let url = self.config.endpoint("/payments/verify");
        let response: MessageResponse = self.send(self.client.post(&url).json(request)).await?;
        Ok(response
            .message
            .unwrap_or_else(|| "Payment verified".to_string()))
    }
}

// ============================================================================
// Cravt API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RestaurantResponse {
    #[serde(rename = "deliveryFee", alias = "delivery_fee", default)]
    delivery_fee: Option<f64>,
}

/// The slots endpoint answers either `{"days": [...]}` or a bare array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SlotsResponse {
    Wrapped { days: Vec<AvailableDay> },
    Bare(Vec<AvailableDay>),
}

impl SlotsResponse {
    fn into_days(self) -> Vec<AvailableDay> {
        match self {
            SlotsResponse::Wrapped { days } | SlotsResponse::Bare(days) => days,
        }
    }
}

#[derive(Debug, Serialize)]
struct ApplyCouponBody<'a> {
    code: &'a str,
    subtotal: f64,
    restaurant_id: RestaurantId,
}

#[derive(Debug, Deserialize)]
struct ApplyCouponResponse {
    discount: f64,
}

#[derive(Debug, Deserialize)]
struct PlaceOrderResponse {
    order_id: OrderId,
}

#[derive(Debug, Serialize)]
struct CreatePaymentBody {
    order_id: OrderId,
}

#[derive(Debug, Deserialize)]
struct CreatePaymentResponse {
    razorpay_order_id: String,
    razorpay_key: String,
    /// Minor units (paise)
    amount: i64,
}
