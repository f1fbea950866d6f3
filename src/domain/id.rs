use {
    super::error::CheckoutError,
    chrono::Utc,
    derive_more::Display,
    serde::{Deserialize, Serialize},
    uuid::Uuid,
};

/// `order_<unix_ms>_<suffix>` style identifiers, as the storefront hands them out.
fn generate(prefix: &str) -> String {
    let random = Uuid::now_v7().simple().to_string();
    // v7 leads with the timestamp; the tail is random.
    format!(
        "{prefix}{}_{}",
        Utc::now().timestamp_millis(),
        &random[random.len() - 9..]
    )
}

/// Storefront order identifier (`order_xxx`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Result<Self, CheckoutError> {
        let id = id.into();
        if !id.starts_with("order_") || id.len() <= "order_".len() {
            return Err(CheckoutError::Validation(format!(
                "OrderId must start with order_, got: {id}"
            )));
        }
        Ok(Self(id))
    }

    pub fn generate() -> Self {
        Self(generate("order_"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Our own payment identifier (`payment_xxx`). Distinct from whatever id the
/// provider assigns, which lives on the record as `external_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(String);

impl PaymentId {
    pub fn new(id: impl Into<String>) -> Result<Self, CheckoutError> {
        let id = id.into();
        if !id.starts_with("payment_") || id.len() <= "payment_".len() {
            return Err(CheckoutError::Validation(format!(
                "PaymentId must start with payment_, got: {id}"
            )));
        }
        Ok(Self(id))
    }

    pub fn generate() -> Self {
        Self(generate("payment_"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}
