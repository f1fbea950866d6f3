use {
    super::http_client::ProviderHttpClient,
    crate::{
        config::BasePayConfig,
        domain::{
            error::CheckoutError,
            payment::{Environment, PaymentMethod},
            provider::{
                Initiation, PaymentHandle, PaymentProvider, PaymentRequest, ProviderFuture,
                ProviderStatus, StatusSnapshot,
            },
        },
    },
    regex::Regex,
    reqwest::Method,
    std::{sync::LazyLock, time::Duration},
};

const PROVIDER: &str = "base_pay";

static EVM_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("static regex"));

/// USDC-on-Base payment service. Amounts go over the wire as major-unit
/// strings with exactly two decimals.
pub struct BasePayProvider {
    http: ProviderHttpClient,
    api_url: String,
}

impl BasePayProvider {
    pub fn new(config: &BasePayConfig, timeout: Duration) -> Result<Self, CheckoutError> {
        Ok(Self {
            http: ProviderHttpClient::new(PROVIDER, timeout)?,
            api_url: config.api_url.clone(),
        })
    }

    async fn initiate_inner(&self, request: &PaymentRequest) -> Result<Initiation, CheckoutError> {
        request.amount.ensure_positive()?;
        if !EVM_ADDRESS.is_match(&request.recipient) {
            return Err(CheckoutError::provider(
                PROVIDER,
                format!("invalid recipient address: {}", request.recipient),
                false,
            ));
        }

        let mut payload = serde_json::json!({
            "amount": request.amount.to_major_string(),
            "to": request.recipient,
            "testnet": request.environment.is_test(),
            "metadata": {
                "orderId": request.order_id,
                "paymentId": request.payment_id,
                "description": request.description,
            },
        });
        if let Some(payer_info) = &request.payer_info {
            payload["payerInfo"] = serde_json::to_value(payer_info)?;
        }

        let body: serde_json::Value = self
            .http
            .request_json(
                Method::POST,
                &format!("{}/payments", self.api_url),
                None,
                Some(&payload),
            )
            .await?;

        let id = body
            .get("id")
            .and_then(|v| v.as_str())
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| CheckoutError::provider(PROVIDER, "initiation response has no id", false))?;

        Ok(Initiation {
            handle: PaymentHandle::new(id),
            checkout_url: None,
            client_secret: None,
        })
    }

    async fn fetch_status_inner(
        &self,
        handle: &PaymentHandle,
        environment: Environment,
    ) -> Result<StatusSnapshot, CheckoutError> {
        let url = format!(
            "{}/payments/{}?testnet={}",
            self.api_url,
            handle.external_id,
            environment.is_test()
        );
        let body: serde_json::Value = self.http.request_json(Method::GET, &url, None, None).await?;
        Ok(snapshot_from_body(body, handle))
    }
}

/// Reads `{id, status, ...}`. Unknown statuses count as pending; the raw body
/// is kept whole for reference extraction.
pub fn snapshot_from_body(body: serde_json::Value, handle: &PaymentHandle) -> StatusSnapshot {
    let status = match body.get("status").and_then(|v| v.as_str()) {
        Some("completed") => ProviderStatus::Completed,
        Some("failed") => ProviderStatus::Failed,
        Some("pending") | None => ProviderStatus::Pending,
        Some(other) => {
            tracing::debug!(status = other, "unrecognised base pay status, treating as pending");
            ProviderStatus::Pending
        }
    };
    let failure_reason = ["/failureReason", "/error/message", "/error"]
        .iter()
        .find_map(|p| body.pointer(p)?.as_str().map(str::to_string));
    let id = body
        .get("id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| handle.external_id.clone());

    StatusSnapshot {
        id,
        status,
        failure_reason,
        body,
    }
}

impl PaymentProvider for BasePayProvider {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::BasePay
    }

    fn initiate<'a>(&'a self, request: &'a PaymentRequest) -> ProviderFuture<'a, Initiation> {
        Box::pin(self.initiate_inner(request))
    }

    fn fetch_status<'a>(
        &'a self,
        handle: &'a PaymentHandle,
        environment: Environment,
    ) -> ProviderFuture<'a, StatusSnapshot> {
        Box::pin(self.fetch_status_inner(handle, environment))
    }
}
