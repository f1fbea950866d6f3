use {
    super::error::CheckoutError,
    super::id::{OrderId, PaymentId},
    super::money::Money,
    super::payment::{Environment, PaymentMethod},
    serde::{Deserialize, Serialize},
    std::{future::Future, pin::Pin},
};

pub type ProviderFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, CheckoutError>> + Send + 'a>>;

/// Contact details the crypto rail can collect from the payer's wallet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PayerInfoRequest {
    pub requests: Vec<PayerInfoField>,
    #[serde(rename = "callbackURL", skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PayerInfoField {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub optional: bool,
}

/// What gets submitted to a provider. Immutable once built.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub order_id: OrderId,
    pub payment_id: PaymentId,
    pub amount: Money,
    pub recipient: String,
    pub environment: Environment,
    pub payer_info: Option<PayerInfoRequest>,
    pub description: String,
}

/// Provider-assigned id, the only thing needed to ask about the payment later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentHandle {
    pub external_id: String,
}

impl PaymentHandle {
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Initiation {
    pub handle: PaymentHandle,
    /// Hosted page the shopper is sent to (payment links).
    pub checkout_url: Option<String>,
    /// Secret the browser SDK needs to finish a card payment.
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Pending,
    Completed,
    Failed,
}

/// One answer from a status query. `body` is the provider's response as
/// received; references can sit under several different fields in it.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub id: String,
    pub status: ProviderStatus,
    pub failure_reason: Option<String>,
    pub body: serde_json::Value,
}

pub trait PaymentProvider: Send + Sync {
    fn method(&self) -> PaymentMethod;

    fn initiate<'a>(&'a self, request: &'a PaymentRequest) -> ProviderFuture<'a, Initiation>;

    /// Pure read. Must be safe to call any number of times.
    fn fetch_status<'a>(
        &'a self,
        handle: &'a PaymentHandle,
        environment: Environment,
    ) -> ProviderFuture<'a, StatusSnapshot>;
}
