use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("webhook signature: {0}")]
    WebhookSignature(String),

    #[error("provider {provider}: {message}")]
    Provider {
        provider: &'static str,
        message: String,
        retryable: bool,
    },

    /// The provider refused or could not take the payment. The checkout
    /// attempt is over; the record stays pending.
    #[error("initiation via {provider} failed: {message}")]
    Initiation {
        provider: &'static str,
        message: String,
        retryable: bool,
    },

    #[error("rail not configured: {0}")]
    RailDisabled(&'static str),
}

impl CheckoutError {
    pub fn provider(provider: &'static str, message: impl Into<String>, retryable: bool) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
            retryable,
        }
    }

    /// Network hiccups, 5xx and 429 from a provider. Everything else is final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider { retryable, .. } | Self::Initiation { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Re-labels a provider failure raised during initiation.
    pub fn into_initiation(self) -> Self {
        match self {
            Self::Provider {
                provider,
                message,
                retryable,
            } => Self::Initiation {
                provider,
                message,
                retryable,
            },
            other => other,
        }
    }
}
