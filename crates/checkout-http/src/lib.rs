//! # checkout-http
//!
//! Network adapters for the cravt checkout engine.
//!
//! - `HttpBackend`: `CheckoutBackend` over the Cravt REST API
//! - `ChannelGateway`: `PaymentGateway` that delegates to a UI task
//! - `ScriptProbe`: gateway client script availability check
//! - `ClientConfig`: environment-driven connection settings
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_http::{ChannelGateway, ClientConfig, HttpBackend, ScriptProbe};
//!
//! let config = ClientConfig::from_env()?;
//! let backend = Arc::new(HttpBackend::new(config.clone())?);
//! let (gateway, requests) = ChannelGateway::channel(Some(ScriptProbe::new(&config)?));
//! ```

pub mod client;
pub mod config;
pub mod gateway;

pub use client::HttpBackend;
pub use config::ClientConfig;
pub use gateway::{ChannelGateway, GatewayRequest, ScriptProbe};
