//! # Gateway Adapters
//!
//! `ChannelGateway` hands each payment to a UI task over an `mpsc` channel
//! and waits for that task's `oneshot` reply. Loading the gateway means
//! probing the gateway client script, when one is configured, and checking
//! that a UI task is still listening.

use crate::config::ClientConfig;
use async_trait::async_trait;
use checkout_core::{
    CheckoutError, CheckoutResult, GatewayCallback, GatewayHandoff, PaymentGateway,
};
use reqwest::Client;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, warn};

/// Description reported when the UI task drops a payment without answering
pub const DISMISSED_DESCRIPTION: &str = "Payment cancelled";

/// Checks that the gateway client script can be fetched.
#[derive(Debug, Clone)]
pub struct ScriptProbe {
    client: Client,
    url: String,
}

impl ScriptProbe {
    pub fn new(config: &ClientConfig) -> CheckoutResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CheckoutError::Configuration(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: config.gateway_script_url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn probe(&self) -> CheckoutResult<()> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CheckoutError::GatewayLoad(e.to_string()))?;
        if !response.status().is_success() {
            return Err(CheckoutError::GatewayLoad(format!(
                "script returned HTTP {}",
                response.status().as_u16()
            )));
        }
        debug!("gateway script reachable");
        Ok(())
    }
}

/// A payment waiting for the UI task
#[derive(Debug)]
pub struct GatewayRequest {
    pub handoff: GatewayHandoff,
    pub reply: oneshot::Sender<GatewayCallback>,
}

/// `PaymentGateway` backed by a UI task on the other end of a channel.
#[derive(Debug, Clone)]
pub struct ChannelGateway {
    probe: Option<ScriptProbe>,
    requests: mpsc::Sender<GatewayRequest>,
}

impl ChannelGateway {
    /// Create the gateway and the receiver the UI task should drain
    pub fn channel(probe: Option<ScriptProbe>) -> (Self, mpsc::Receiver<GatewayRequest>) {
        let (requests, receiver) = mpsc::channel(1);
        (Self { probe, requests }, receiver)
    }
}

#[async_trait]
impl PaymentGateway for ChannelGateway {
    async fn load(&self) -> CheckoutResult<()> {
        if self.requests.is_closed() {
            return Err(CheckoutError::GatewayLoad(
                "no payment UI is attached".to_string(),
            ));
        }
        if let Some(probe) = &self.probe {
            probe.probe().await?;
        }
        Ok(())
    }

    #[instrument(skip(self, handoff), fields(gateway_order_id = %handoff.gateway_order_id))]
    async fn open(&self, handoff: GatewayHandoff) -> CheckoutResult<GatewayCallback> {
        let (reply, answer) = oneshot::channel();
        self.requests
            .send(GatewayRequest { handoff, reply })
            .await
            .map_err(|_| CheckoutError::GatewayLoad("payment UI went away".to_string()))?;
        info!("payment handed to gateway UI");

        match answer.await {
            Ok(callback) => Ok(callback),
            Err(_) => {
                warn!("gateway UI closed without a result");
                Ok(GatewayCallback::Failure {
                    description: DISMISSED_DESCRIPTION.to_string(),
                })
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "razorpay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_core::{CustomerContact, Currency, Price};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn handoff() -> GatewayHandoff {
        GatewayHandoff {
            key: "rzp_test_abc".into(),
            amount: Price::from_minor(25_000, Currency::INR),
            merchant_name: "Cravt".into(),
            description: "Order #501".into(),
            gateway_order_id: "order_Nx1".into(),
            prefill: CustomerContact::default(),
            theme_color: "#E65100".into(),
        }
    }

    #[tokio::test]
    async fn test_probe_success_and_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string("/* sdk */"))
            .mount(&server)
            .await;

        let ok = ScriptProbe::new(
            &ClientConfig::new("http://localhost")
                .with_gateway_script_url(format!("{}/v1/checkout.js", server.uri())),
        )
        .unwrap();
        assert!(ok.probe().await.is_ok());

        let missing = ScriptProbe::new(
            &ClientConfig::new("http://localhost")
                .with_gateway_script_url(format!("{}/missing.js", server.uri())),
        )
        .unwrap();
        assert!(matches!(
            missing.probe().await,
            Err(CheckoutError::GatewayLoad(_))
        ));
    }

    #[tokio::test]
    async fn test_open_round_trips_through_ui_task() {
        let (gateway, mut requests) = ChannelGateway::channel(None);
        let ui = tokio::spawn(async move {
            let request = requests.recv().await.unwrap();
            assert_eq!(request.handoff.description, "Order #501");
            request
                .reply
                .send(GatewayCallback::Success {
                    payment_id: "pay_1".into(),
                    gateway_order_id: request.handoff.gateway_order_id.clone(),
                    signature: "sig".into(),
                })
                .unwrap();
        });

        gateway.load().await.unwrap();
        let callback = gateway.open(handoff()).await.unwrap();
        ui.await.unwrap();

        assert_eq!(
            callback,
            GatewayCallback::Success {
                payment_id: "pay_1".into(),
                gateway_order_id: "order_Nx1".into(),
                signature: "sig".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_dropped_reply_is_a_failure() {
        let (gateway, mut requests) = ChannelGateway::channel(None);
        tokio::spawn(async move {
            let request = requests.recv().await.unwrap();
            drop(request.reply);
        });

        let callback = gateway.open(handoff()).await.unwrap();
        assert_eq!(
            callback,
            GatewayCallback::Failure {
                description: DISMISSED_DESCRIPTION.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_load_fails_without_ui() {
        let (gateway, requests) = ChannelGateway::channel(None);
        drop(requests);
        assert!(matches!(
            gateway.load().await,
            Err(CheckoutError::GatewayLoad(_))
        ));
    }
}
