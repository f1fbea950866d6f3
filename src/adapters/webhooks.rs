use {
    crate::{
        AppState,
        adapters::{api_errors::ApiError, signature::verify_hmac_sha256_hex, wompi},
        domain::{error::CheckoutError, payment::PaymentMethod, provider::ProviderStatus},
        services::checkout::{WebhookOutcome, WebhookUpdate},
    },
    axum::{Json, body::Bytes, extract::State, http::HeaderMap},
    serde::Deserialize,
};

pub const BASE_PAY_SIGNATURE_HEADER: &str = "x-webhook-signature";
pub const WOMPI_SIGNATURE_HEADER: &str = "x-wompi-signature";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, CheckoutError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| CheckoutError::WebhookSignature(format!("missing {name} header")))
}

/// Verifies before anything in the body is looked at. Rejections are
/// security events.
fn verify(
    method: PaymentMethod,
    secret: Option<&str>,
    headers: &HeaderMap,
    header_name: &str,
    body: &[u8],
) -> Result<(), CheckoutError> {
    let secret = secret.ok_or(CheckoutError::RailDisabled(method.as_str()))?;
    header(headers, header_name)
        .and_then(|sig| verify_hmac_sha256_hex(body, secret, sig))
        .inspect_err(|e| {
            tracing::warn!(security_event = true, method = %method, error = %e, "webhook rejected");
        })
}

fn decode<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, CheckoutError> {
    serde_json::from_slice(body)
        .map_err(|e| CheckoutError::Validation(format!("malformed webhook body: {e}")))
}

fn respond(outcome: WebhookOutcome) -> Json<serde_json::Value> {
    match &outcome {
        WebhookOutcome::Ignored(why) => tracing::info!(why, "webhook ignored"),
        WebhookOutcome::Settled(record) => {
            tracing::info!(payment_id = %record.payment_id, status = %record.status, "webhook settled payment")
        }
        WebhookOutcome::AlreadyTerminal(record) => {
            tracing::info!(payment_id = %record.payment_id, status = %record.status, "webhook for settled payment, no change")
        }
    }
    Json(serde_json::json!({ "status": outcome.as_str() }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasePayEvent {
    pub external_payment_id: String,
    pub status: String,
    #[serde(default)]
    pub transaction_reference: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

/// Signed callback from the crypto rail: `{externalPaymentId, status,
/// transactionReference}` with a hex HMAC-SHA256 of the raw body.
#[tracing::instrument(name = "base_pay_webhook", skip_all)]
pub async fn base_pay_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    verify(
        PaymentMethod::BasePay,
        state.webhook_secrets.base_pay.as_deref(),
        &headers,
        BASE_PAY_SIGNATURE_HEADER,
        &body,
    )?;

    let event: BasePayEvent = decode(&body)?;
    let status = match event.status.as_str() {
        "completed" => ProviderStatus::Completed,
        "failed" => ProviderStatus::Failed,
        _ => ProviderStatus::Pending,
    };

    let outcome = state
        .checkout
        .apply_webhook(WebhookUpdate {
            method: PaymentMethod::BasePay,
            external_id: event.external_payment_id,
            status,
            reference: event.transaction_reference,
            failure_reason: event.failure_reason,
        })
        .await?;
    Ok(respond(outcome))
}

#[derive(Debug, Deserialize)]
pub struct WompiEvent {
    pub event: String,
    pub data: WompiEventData,
}

#[derive(Debug, Deserialize)]
pub struct WompiEventData {
    pub transaction: WompiTransaction,
}

#[derive(Debug, Deserialize)]
pub struct WompiTransaction {
    pub id: String,
    pub status: String,
    pub reference: String,
    #[serde(default)]
    pub status_message: Option<String>,
}

#[tracing::instrument(name = "wompi_webhook", skip_all)]
pub async fn wompi_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    verify(
        PaymentMethod::Wompi,
        state.webhook_secrets.wompi.as_deref(),
        &headers,
        WOMPI_SIGNATURE_HEADER,
        &body,
    )?;

    let event: WompiEvent = decode(&body)?;
    if !matches!(event.event.as_str(), "transaction.updated" | "payment.accepted") {
        return Ok(respond(WebhookOutcome::Ignored("unhandled event type")));
    }

    let tx = event.data.transaction;
    let Some(status) = wompi::terminal_status(&tx.status) else {
        return Ok(respond(WebhookOutcome::Ignored("transaction not final")));
    };
    let failure_reason = (status == ProviderStatus::Failed)
        .then(|| tx.status_message.clone().unwrap_or_else(|| tx.status.clone()));

    let outcome = state
        .checkout
        .apply_webhook(WebhookUpdate {
            method: PaymentMethod::Wompi,
            external_id: tx.reference,
            status,
            reference: Some(tx.id),
            failure_reason,
        })
        .await?;
    Ok(respond(outcome))
}

#[tracing::instrument(
    name = "stripe_webhook",
    skip_all,
    fields(event_id = tracing::field::Empty, event_type = tracing::field::Empty)
)]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let secret = state
        .webhook_secrets
        .stripe
        .as_deref()
        .ok_or(CheckoutError::RailDisabled(PaymentMethod::Stripe.as_str()))?;

    let event = header(&headers, "Stripe-Signature")
        .and_then(|sig| {
            stripe::Webhook::construct_event(&body, sig, secret)
                .map_err(|e| CheckoutError::WebhookSignature(e.to_string()))
        })
        .inspect_err(|e| {
            tracing::warn!(security_event = true, method = "stripe", error = %e, "webhook rejected");
        })?;

    tracing::Span::current()
        .record("event_id", tracing::field::display(&event.id))
        .record("event_type", tracing::field::display(&event.type_));

    let status = match event.type_ {
        stripe::EventType::PaymentIntentSucceeded => ProviderStatus::Completed,
        stripe::EventType::PaymentIntentPaymentFailed | stripe::EventType::PaymentIntentCanceled => {
            ProviderStatus::Failed
        }
        _ => return Ok(respond(WebhookOutcome::Ignored("unhandled event type"))),
    };
    let stripe::EventObject::PaymentIntent(pi) = event.data.object else {
        return Ok(respond(WebhookOutcome::Ignored("not a payment intent")));
    };

    let failure_reason = (status == ProviderStatus::Failed).then(|| {
        pi.last_payment_error
            .as_ref()
            .and_then(|e| e.message.clone())
            .unwrap_or_else(|| event.type_.to_string())
    });

    let outcome = state
        .checkout
        .apply_webhook(WebhookUpdate {
            method: PaymentMethod::Stripe,
            external_id: pi.id.to_string(),
            status,
            reference: Some(pi.id.to_string()),
            failure_reason,
        })
        .await?;
    Ok(respond(outcome))
}
