//! # Client Configuration
//!
//! Connection settings for the Cravt API and the payment gateway script.
//! Values come from environment variables (a `.env` file is honoured).

use checkout_core::CheckoutError;
use std::env;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_GATEWAY_SCRIPT_URL: &str = "https://checkout.razorpay.com/v1/checkout.js";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Cravt API client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL, e.g. `http://localhost:5000/api`
    pub api_base_url: String,

    /// Value of the `Authentication-Token` header
    pub auth_token: Option<String>,

    /// Gateway client script checked by `ScriptProbe`
    pub gateway_script_url: String,

    pub timeout: Duration,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional env vars:
    /// - `CRAVT_API_BASE_URL`
    /// - `CRAVT_AUTH_TOKEN`
    /// - `CRAVT_GATEWAY_SCRIPT_URL`
    /// - `CRAVT_HTTP_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self, CheckoutError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let api_base_url =
            env::var("CRAVT_API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());
        let auth_token = env::var("CRAVT_AUTH_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());
        let gateway_script_url = env::var("CRAVT_GATEWAY_SCRIPT_URL")
            .unwrap_or_else(|_| DEFAULT_GATEWAY_SCRIPT_URL.to_string());

        let timeout_secs = match env::var("CRAVT_HTTP_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse::<u64>().map_err(|_| {
                CheckoutError::Configuration(format!(
                    "CRAVT_HTTP_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                    raw
                ))
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        let config = Self {
            api_base_url,
            auth_token,
            gateway_script_url,
            timeout: Duration::from_secs(timeout_secs),
        };
        config.validate()?;
        Ok(config)
    }

    /// Create config for an explicit base URL (for testing)
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            auth_token: None,
            gateway_script_url: DEFAULT_GATEWAY_SCRIPT_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn validate(&self) -> Result<(), CheckoutError> {
        for (name, url) in [
            ("CRAVT_API_BASE_URL", &self.api_base_url),
            ("CRAVT_GATEWAY_SCRIPT_URL", &self.gateway_script_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(CheckoutError::Configuration(format!(
                    "{} must be an http(s) URL",
                    name
                )));
            }
        }
        if self.timeout.is_zero() {
            return Err(CheckoutError::Configuration(
                "CRAVT_HTTP_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Absolute URL for an API path such as `/orders`
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Builder: set the auth token
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Builder: set the gateway script URL
    pub fn with_gateway_script_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_script_url = url.into();
        self
    }

    /// Builder: set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
