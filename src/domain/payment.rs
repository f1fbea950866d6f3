use {
    super::audit::NewAuditEntry,
    super::error::CheckoutError,
    super::id::{OrderId, PaymentId},
    super::money::Money,
    super::reference::{ReferenceCheck, TransactionReference},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Pending is the only state with exits, and it has exactly one each way.
    pub fn can_transition_to(&self, next: &PaymentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Completed) | (Self::Pending, Self::Failed)
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for PaymentStatus {
    type Error = CheckoutError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(CheckoutError::Validation(format!(
                "unknown payment status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    BasePay,
    Stripe,
    Wompi,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BasePay => "base_pay",
            Self::Stripe => "stripe",
            Self::Wompi => "wompi",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for PaymentMethod {
    type Error = CheckoutError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "base_pay" => Ok(Self::BasePay),
            "stripe" => Ok(Self::Stripe),
            "wompi" => Ok(Self::Wompi),
            other => Err(CheckoutError::Validation(format!(
                "unknown payment method: {other}"
            ))),
        }
    }
}

/// Test network / sandbox vs live.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Production,
    Test,
}

impl Environment {
    pub fn from_testnet(testnet: bool) -> Self {
        if testnet { Self::Test } else { Self::Production }
    }

    pub fn is_test(&self) -> bool {
        matches!(self, Self::Test)
    }
}

/// Persisted payment row.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentRecord {
    pub payment_id: PaymentId,
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub external_id: Option<String>,
    pub money: Money,
    pub recipient: String,
    pub environment: Environment,
    pub status: PaymentStatus,
    pub transaction_reference: Option<String>,
    pub reference_check: Option<ReferenceCheck>,
    pub failure_reason: Option<String>,
    pub payment_link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// For INSERT at checkout start. Always pending.
#[derive(Debug, Clone)]
pub struct NewPaymentRecord {
    pub payment_id: PaymentId,
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub money: Money,
    pub recipient: String,
    pub environment: Environment,
}

impl NewPaymentRecord {
    pub fn into_record(self, now: DateTime<Utc>) -> PaymentRecord {
        PaymentRecord {
            payment_id: self.payment_id,
            order_id: self.order_id,
            method: self.method,
            external_id: None,
            money: self.money,
            recipient: self.recipient,
            environment: self.environment,
            status: PaymentStatus::Pending,
            transaction_reference: None,
            reference_check: None,
            failure_reason: None,
            payment_link: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

/// Who is trying to settle a payment. Kept in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementSource {
    Poller,
    Webhook(PaymentMethod),
}

impl SettlementSource {
    pub fn actor(&self) -> String {
        match self {
            Self::Poller => "poller".to_string(),
            Self::Webhook(method) => format!("webhook:{method}"),
        }
    }
}

/// A terminal status someone wants to write.
#[derive(Debug, Clone)]
pub enum Settlement {
    Completed {
        reference: String,
        check: ReferenceCheck,
        source: SettlementSource,
    },
    Failed {
        reason: String,
        source: SettlementSource,
    },
}

impl Settlement {
    pub fn completed(
        reference: TransactionReference,
        check: ReferenceCheck,
        source: SettlementSource,
    ) -> Self {
        Self::Completed {
            reference: reference.into_inner(),
            check,
            source,
        }
    }

    pub fn status(&self) -> PaymentStatus {
        match self {
            Self::Completed { .. } => PaymentStatus::Completed,
            Self::Failed { .. } => PaymentStatus::Failed,
        }
    }

    pub fn source(&self) -> SettlementSource {
        match self {
            Self::Completed { source, .. } | Self::Failed { source, .. } => *source,
        }
    }

    pub fn reference(&self) -> Option<&str> {
        match self {
            Self::Completed { reference, .. } => Some(reference),
            Self::Failed { .. } => None,
        }
    }

    pub fn reference_check(&self) -> Option<ReferenceCheck> {
        match self {
            Self::Completed { check, .. } => Some(*check),
            Self::Failed { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Failed { reason, .. } => Some(reason),
            Self::Completed { .. } => None,
        }
    }

    /// Audit row for a write that went through.
    pub fn applied_audit(&self, payment_id: &PaymentId) -> NewAuditEntry {
        let action = match self.reference_check() {
            Some(ReferenceCheck::Malformed) => "settled_malformed_reference",
            Some(ReferenceCheck::Heuristic) => "settled_heuristic_reference",
            _ => "status_changed",
        };
        NewAuditEntry {
            id: Uuid::now_v7(),
            entity_type: "payment".to_string(),
            entity_id: payment_id.as_str().to_string(),
            action: action.to_string(),
            actor: self.source().actor(),
            detail: serde_json::json!({
                "old_status": PaymentStatus::Pending.as_str(),
                "new_status": self.status().as_str(),
                "transaction_reference": self.reference(),
                "reference_check": self.reference_check().map(|c| c.as_str()),
                "failure_reason": self.failure_reason(),
            }),
        }
    }

    /// Audit row for a late writer that lost the race.
    pub fn rejected_audit(&self, payment_id: &PaymentId, current: PaymentStatus) -> NewAuditEntry {
        NewAuditEntry {
            id: Uuid::now_v7(),
            entity_type: "payment".to_string(),
            entity_id: payment_id.as_str().to_string(),
            action: "settlement_rejected".to_string(),
            actor: self.source().actor(),
            detail: serde_json::json!({
                "current_status": current.as_str(),
                "incoming_status": self.status().as_str(),
                "anomaly": current != self.status(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SettleResult {
    /// This writer moved the record out of pending.
    Applied(PaymentRecord),
    /// Someone else already did; nothing was written.
    AlreadyTerminal(PaymentRecord),
}

impl SettleResult {
    pub fn record(&self) -> &PaymentRecord {
        match self {
            Self::Applied(record) | Self::AlreadyTerminal(record) => record,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}
