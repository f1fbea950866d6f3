use {
    super::{error::CheckoutError, payment::PaymentMethod},
    derive_more::Display,
    regex::Regex,
    serde::{Deserialize, Serialize},
    std::sync::LazyLock,
};

static ONCHAIN_HASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{64}$").expect("static regex"));
static PAYMENT_INTENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^pi_[A-Za-z0-9]+$").expect("static regex"));
static WOMPI_TRANSACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+-[0-9]+-[0-9]+$").expect("static regex"));

/// Shape a settled-payment reference must have on a given rail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceFormat {
    /// 32-byte hash, `0x` + 64 hex digits.
    OnchainHash,
    /// Stripe PaymentIntent id.
    PaymentIntent,
    /// Wompi transaction id, `<merchant>-<unix>-<seq>`.
    WompiTransaction,
}

impl ReferenceFormat {
    pub fn for_method(method: PaymentMethod) -> Self {
        match method {
            PaymentMethod::BasePay => Self::OnchainHash,
            PaymentMethod::Stripe => Self::PaymentIntent,
            PaymentMethod::Wompi => Self::WompiTransaction,
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Self::OnchainHash => ONCHAIN_HASH.is_match(candidate),
            Self::PaymentIntent => PAYMENT_INTENT.is_match(candidate),
            Self::WompiTransaction => WOMPI_TRANSACTION.is_match(candidate),
        }
    }
}

/// A reference that passed its rail's format check.
#[derive(Debug, Clone, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionReference(String);

impl TransactionReference {
    pub fn parse(raw: impl Into<String>, format: ReferenceFormat) -> Result<Self, CheckoutError> {
        let raw = raw.into();
        if !format.matches(&raw) {
            return Err(CheckoutError::Validation(format!(
                "malformed transaction reference for {format:?}: {raw}"
            )));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// How a stored reference was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceCheck {
    /// Found in a reference field of a provider response and well-formed.
    Verified,
    /// No reference field matched; the payment id itself had the right shape
    /// and was taken in its place. An id and a settlement hash are different
    /// things, so this one must not be presented as proof of settlement.
    Heuristic,
    /// Delivered by a signed webhook but failed the format check. Stored for
    /// reconciliation only.
    Malformed,
}

impl ReferenceCheck {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::Heuristic => "heuristic",
            Self::Malformed => "malformed",
        }
    }
}

impl TryFrom<&str> for ReferenceCheck {
    type Error = CheckoutError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "verified" => Ok(Self::Verified),
            "heuristic" => Ok(Self::Heuristic),
            "malformed" => Ok(Self::Malformed),
            other => Err(CheckoutError::Validation(format!(
                "unknown reference check: {other}"
            ))),
        }
    }
}
