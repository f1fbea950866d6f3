use {
    crate::domain::{
        error::CheckoutError,
        money::Currency,
        payment::{Environment, PaymentMethod},
        provider::{
            Initiation, PaymentHandle, PaymentProvider, PaymentRequest, ProviderFuture,
            ProviderStatus, StatusSnapshot,
        },
    },
    std::collections::HashMap,
};

const PROVIDER: &str = "stripe";

/// Card payments through PaymentIntents. The PaymentIntent id doubles as the
/// settlement reference.
pub struct StripeProvider {
    client: stripe::Client,
}

impl StripeProvider {
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: stripe::Client::new(secret_key),
        }
    }

    async fn initiate_inner(&self, request: &PaymentRequest) -> Result<Initiation, CheckoutError> {
        request.amount.ensure_positive()?;

        let mut params = stripe::CreatePaymentIntent::new(
            request.amount.amount().cents(),
            convert_currency(request.amount.currency()),
        );
        params.description = Some(&request.description);
        params.metadata = Some(HashMap::from([
            ("orderId".to_string(), request.order_id.to_string()),
            ("paymentId".to_string(), request.payment_id.to_string()),
        ]));
        params.automatic_payment_methods =
            Some(stripe::CreatePaymentIntentAutomaticPaymentMethods {
                enabled: true,
                allow_redirects: None,
            });

        let pi = stripe::PaymentIntent::create(&self.client, params)
            .await
            .map_err(map_stripe_error)?;

        Ok(Initiation {
            handle: PaymentHandle::new(pi.id.to_string()),
            checkout_url: None,
            client_secret: pi.client_secret,
        })
    }

    async fn fetch_status_inner(&self, handle: &PaymentHandle) -> Result<StatusSnapshot, CheckoutError> {
        let pi_id = handle
            .external_id
            .parse::<stripe::PaymentIntentId>()
            .map_err(|e| CheckoutError::provider(PROVIDER, format!("invalid PaymentIntent id: {e}"), false))?;
        let pi = stripe::PaymentIntent::retrieve(&self.client, &pi_id, &[])
            .await
            .map_err(map_stripe_error)?;

        let failure_reason = pi
            .last_payment_error
            .as_ref()
            .and_then(|e| e.message.clone());
        let status = convert_pi_status(pi.status, failure_reason.is_some());

        let mut body = serde_json::to_value(&pi)?;
        if let Some(obj) = body.as_object_mut() {
            obj.insert(
                "transactionReference".to_string(),
                serde_json::Value::String(pi.id.to_string()),
            );
        }

        Ok(StatusSnapshot {
            id: pi.id.to_string(),
            status,
            failure_reason,
            body,
        })
    }
}

impl PaymentProvider for StripeProvider {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Stripe
    }

    fn initiate<'a>(&'a self, request: &'a PaymentRequest) -> ProviderFuture<'a, Initiation> {
        Box::pin(self.initiate_inner(request))
    }

    // Test and live mode are selected by the key, not per request.
    fn fetch_status<'a>(
        &'a self,
        handle: &'a PaymentHandle,
        _environment: Environment,
    ) -> ProviderFuture<'a, StatusSnapshot> {
        Box::pin(self.fetch_status_inner(handle))
    }
}

fn convert_currency(currency: Currency) -> stripe::Currency {
    match currency {
        Currency::Usd => stripe::Currency::USD,
        Currency::Cop => stripe::Currency::COP,
    }
}

/// A declined attempt puts the intent back in `requires_payment_method` with
/// the decline attached; that counts as failed for this checkout.
pub fn convert_pi_status(status: stripe::PaymentIntentStatus, has_payment_error: bool) -> ProviderStatus {
    #[allow(unreachable_patterns)]
    match status {
        stripe::PaymentIntentStatus::Succeeded => ProviderStatus::Completed,
        stripe::PaymentIntentStatus::Canceled => ProviderStatus::Failed,
        stripe::PaymentIntentStatus::RequiresPaymentMethod if has_payment_error => {
            ProviderStatus::Failed
        }
        stripe::PaymentIntentStatus::Processing
        | stripe::PaymentIntentStatus::RequiresAction
        | stripe::PaymentIntentStatus::RequiresCapture
        | stripe::PaymentIntentStatus::RequiresConfirmation
        | stripe::PaymentIntentStatus::RequiresPaymentMethod => ProviderStatus::Pending,
        other => {
            tracing::warn!("unknown PaymentIntentStatus: {other:?}, defaulting to Pending");
            ProviderStatus::Pending
        }
    }
}

fn map_stripe_error(err: stripe::StripeError) -> CheckoutError {
    let retryable = match &err {
        stripe::StripeError::Stripe(req) => req.http_status >= 500 || req.http_status == 429,
        stripe::StripeError::Timeout | stripe::StripeError::ClientError(_) => true,
        _ => false,
    };
    CheckoutError::provider(PROVIDER, format!("Stripe API: {err}"), retryable)
}
