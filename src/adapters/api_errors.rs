use crate::domain::error::CheckoutError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// HTTP face of `CheckoutError`. Internal details are logged, not returned.
pub struct ApiError(pub CheckoutError);

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut retryable = None;
        let (status, error_code, message) = match &self.0 {
            CheckoutError::Validation(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                msg.clone(),
            ),
            CheckoutError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            CheckoutError::WebhookSignature(_) => (
                StatusCode::UNAUTHORIZED,
                "webhook_error",
                "invalid webhook signature".to_string(),
            ),
            CheckoutError::Initiation {
                provider,
                message,
                retryable: can_retry,
            } => {
                tracing::warn!(provider, error = %message, "payment initiation failed");
                retryable = Some(*can_retry);
                (
                    StatusCode::BAD_GATEWAY,
                    "initiation_failed",
                    format!("{provider} could not start the payment"),
                )
            }
            CheckoutError::Provider {
                provider,
                message,
                retryable: can_retry,
            } => {
                tracing::error!(provider, error = %message, "provider error");
                retryable = Some(*can_retry);
                (
                    StatusCode::BAD_GATEWAY,
                    "provider_error",
                    format!("{provider} is not answering as expected"),
                )
            }
            CheckoutError::RailDisabled(method) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "rail_disabled",
                format!("{method} payments are not configured"),
            ),
            CheckoutError::Database(err) => {
                tracing::error!("database error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
            CheckoutError::Serialization(err) => {
                tracing::error!("serialization error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
        };

        let mut body = serde_json::json!({
            "error_code": error_code,
            "message": message,
        });
        if let Some(retryable) = retryable {
            body["retryable"] = serde_json::Value::Bool(retryable);
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        let cases = [
            (CheckoutError::Validation("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (CheckoutError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (CheckoutError::WebhookSignature("x".into()), StatusCode::UNAUTHORIZED),
            (CheckoutError::RailDisabled("wompi"), StatusCode::SERVICE_UNAVAILABLE),
            (
                CheckoutError::provider("stripe", "HTTP 500", true).into_initiation(),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).into_response().status(), expected);
        }
    }
}
