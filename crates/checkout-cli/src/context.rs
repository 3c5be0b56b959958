//! # Application Context
//!
//! Everything a command needs, built once at startup and passed by
//! reference: the durable cart, the API client and checkout settings.

use checkout_core::{
    BoxedBackend, CartStore, CheckoutSettings, FileKeyValueStore, StorageScope,
};
use checkout_http::{ClientConfig, HttpBackend};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub cart: Arc<CartStore>,
    pub backend: BoxedBackend,
    pub client_config: ClientConfig,
    pub settings: CheckoutSettings,
}

impl AppContext {
    /// Build the context from the environment and the cart file.
    pub fn new(cart_file: &Path, user_id: Option<&str>) -> anyhow::Result<Self> {
        let settings = load_settings()?;
        let client_config = ClientConfig::from_env()?;
        let backend = HttpBackend::new(client_config.clone())?.with_currency(settings.currency);
        let cart = open_cart(cart_file, user_id, &settings)?;

        tracing::info!(
            api = %client_config.api_base_url,
            cart_file = %cart_file.display(),
            dev_payments = settings.allow_dev_payments,
            "context ready"
        );

        Ok(Self {
            cart,
            backend: Arc::new(backend),
            client_config,
            settings,
        })
    }
}

/// Open the durable cart for `user_id` (device-wide when absent)
pub fn open_cart(
    cart_file: &Path,
    user_id: Option<&str>,
    settings: &CheckoutSettings,
) -> anyhow::Result<Arc<CartStore>> {
    let storage = FileKeyValueStore::open(cart_file)?;
    let scope = match user_id.map(str::trim).filter(|u| !u.is_empty()) {
        Some(user) => StorageScope::for_user(user),
        None => StorageScope::Global,
    };
    let cart = CartStore::load(Arc::new(storage), scope, settings.currency)?;
    Ok(Arc::new(cart))
}

/// Default cart file location
pub fn default_cart_file() -> PathBuf {
    PathBuf::from(".cravt").join("cart.json")
}

/// Load checkout settings from `config/checkout.toml`, then apply the
/// `CRAVT_DEV_PAYMENTS` override.
fn load_settings() -> anyhow::Result<CheckoutSettings> {
    let config_paths = [
        "config/checkout.toml",
        "../config/checkout.toml",
        "../../config/checkout.toml",
    ];

    let mut settings = None;
    for path in config_paths {
        if let Some(found) = read_settings(Path::new(path))? {
            tracing::info!("Loaded checkout settings from {}", path);
            settings = Some(found);
            break;
        }
    }
    let settings = settings.unwrap_or_else(|| {
        tracing::warn!("No checkout settings found, using defaults");
        CheckoutSettings::default()
    });

    Ok(apply_dev_override(
        settings,
        std::env::var("CRAVT_DEV_PAYMENTS").ok().as_deref(),
    ))
}

fn read_settings(path: &Path) -> anyhow::Result<Option<CheckoutSettings>> {
    match std::fs::read_to_string(path) {
        Ok(content) => CheckoutSettings::from_toml(&content)
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(anyhow::anyhow!("Failed to read {}: {}", path.display(), e)),
    }
}

fn apply_dev_override(settings: CheckoutSettings, raw: Option<&str>) -> CheckoutSettings {
    match raw.map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => {
            settings.with_dev_payments(true)
        }
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => {
            settings.with_dev_payments(false)
        }
        _ => settings,
    }
}
