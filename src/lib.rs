pub mod adapters;
pub mod config;
pub mod domain;
pub mod infra;
pub mod services;

use {services::checkout::CheckoutService, std::sync::Arc, tokio::sync::watch};

/// Shared secrets for inbound webhooks. A missing secret disables that
/// webhook route.
#[derive(Clone, Default)]
pub struct WebhookSecrets {
    pub base_pay: Option<Arc<str>>,
    pub wompi: Option<Arc<str>>,
    pub stripe: Option<Arc<str>>,
}

#[derive(Clone)]
pub struct AppState {
    pub checkout: CheckoutService,
    pub webhook_secrets: WebhookSecrets,
    /// Default network for crypto checkouts that do not say.
    pub base_pay_testnet: bool,
    /// Flips to `true` on shutdown; in-flight confirmations stop polling.
    pub shutdown: watch::Receiver<bool>,
}
