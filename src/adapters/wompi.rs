use {
    super::{http_client::ProviderHttpClient, signature::wompi_integrity},
    crate::{
        config::WompiConfig,
        domain::{
            error::CheckoutError,
            id::OrderId,
            money::Currency,
            payment::{Environment, PaymentMethod},
            provider::{
                Initiation, PaymentHandle, PaymentProvider, PaymentRequest, ProviderFuture,
                ProviderStatus, StatusSnapshot,
            },
        },
    },
    chrono::{Duration as ChronoDuration, Utc},
    reqwest::Method,
    std::time::Duration,
};

const PROVIDER: &str = "wompi";
const LINK_TTL_HOURS: i64 = 24;

/// Our reference for a payment link; Wompi echoes it on every transaction
/// made through the link.
pub fn link_reference(order_id: &OrderId) -> String {
    format!("ETHCALI_{order_id}")
}

/// Maps a Wompi transaction status. `None` for statuses that are not final.
pub fn terminal_status(status: &str) -> Option<ProviderStatus> {
    match status {
        "APPROVED" => Some(ProviderStatus::Completed),
        "DECLINED" | "VOIDED" | "ERROR" => Some(ProviderStatus::Failed),
        _ => None,
    }
}

/// Single-use COP payment links. The handle is the link reference; status
/// queries look up the transactions made under it.
pub struct WompiProvider {
    http: ProviderHttpClient,
    public_key: String,
    private_key: String,
    base_url: &'static str,
    app_url: String,
}

impl WompiProvider {
    pub fn new(config: &WompiConfig, app_url: &str, timeout: Duration) -> Result<Self, CheckoutError> {
        Ok(Self {
            http: ProviderHttpClient::new(PROVIDER, timeout)?,
            public_key: config.public_key.clone(),
            private_key: config.private_key.clone(),
            base_url: config.env.base_url(),
            app_url: app_url.trim_end_matches('/').to_string(),
        })
    }

    async fn initiate_inner(&self, request: &PaymentRequest) -> Result<Initiation, CheckoutError> {
        request.amount.ensure_positive()?;
        if request.amount.currency() != Currency::Cop {
            return Err(CheckoutError::Validation(format!(
                "wompi links are priced in cop, got {}",
                request.amount.currency()
            )));
        }

        let amount_in_cents = request.amount.amount().cents();
        let reference = link_reference(&request.order_id);
        let integrity = wompi_integrity(
            &self.public_key,
            &self.private_key,
            &reference,
            amount_in_cents,
            "COP",
        );

        let payload = serde_json::json!({
            "name": format!("Orden ETH Cali Swag #{}", request.order_id),
            "description": request.description,
            "single_use": true,
            "collect_shipping": false,
            "currency": "COP",
            "amount_in_cents": amount_in_cents,
            "expires_at": (Utc::now() + ChronoDuration::hours(LINK_TTL_HOURS)).to_rfc3339(),
            "redirect_url": format!("{}/order-confirmation?orderId={}", self.app_url, request.order_id),
            "reference": reference,
            "integrity": integrity,
        });

        let body: serde_json::Value = self
            .http
            .request_json(
                Method::POST,
                &format!("{}/payment_links", self.base_url),
                Some(&self.private_key),
                Some(&payload),
            )
            .await?;

        let permalink = ["/data/permalink", "/permalink"]
            .iter()
            .find_map(|p| body.pointer(p)?.as_str().map(str::to_string))
            .or_else(|| {
                body.pointer("/data/id")
                    .and_then(|v| v.as_str())
                    .map(|id| format!("https://checkout.wompi.co/l/{id}"))
            })
            .ok_or_else(|| CheckoutError::provider(PROVIDER, "payment link response has no permalink", false))?;

        Ok(Initiation {
            handle: PaymentHandle::new(reference),
            checkout_url: Some(permalink),
            client_secret: None,
        })
    }

    async fn fetch_status_inner(&self, handle: &PaymentHandle) -> Result<StatusSnapshot, CheckoutError> {
        let url = format!(
            "{}/transactions?reference={}",
            self.base_url, handle.external_id
        );
        let body: serde_json::Value = self
            .http
            .request_json(Method::GET, &url, Some(&self.private_key), None)
            .await?;
        Ok(snapshot_from_transactions(body, handle))
    }
}

/// Picks the most telling transaction under a link: an approved one if any,
/// else the latest. No transactions yet means the shopper has not paid.
pub fn snapshot_from_transactions(body: serde_json::Value, handle: &PaymentHandle) -> StatusSnapshot {
    let transactions = body
        .get("data")
        .and_then(|d| d.as_array())
        .cloned()
        .unwrap_or_default();

    let chosen = transactions
        .iter()
        .find(|t| t.get("status").and_then(|s| s.as_str()) == Some("APPROVED"))
        .or_else(|| transactions.first())
        .cloned();

    let Some(mut tx) = chosen else {
        return StatusSnapshot {
            id: handle.external_id.clone(),
            status: ProviderStatus::Pending,
            failure_reason: None,
            body,
        };
    };

    let raw_status = tx.get("status").and_then(|s| s.as_str()).unwrap_or("PENDING");
    let status = terminal_status(raw_status).unwrap_or(ProviderStatus::Pending);
    let failure_reason = (status == ProviderStatus::Failed).then(|| {
        tx.get("status_message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| raw_status.to_string())
    });
    let id = tx
        .get("id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| handle.external_id.clone());

    if let Some(obj) = tx.as_object_mut() {
        obj.insert(
            "transactionReference".to_string(),
            serde_json::Value::String(id.clone()),
        );
    }

    StatusSnapshot {
        id,
        status,
        failure_reason,
        body: tx,
    }
}

impl PaymentProvider for WompiProvider {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Wompi
    }

    fn initiate<'a>(&'a self, request: &'a PaymentRequest) -> ProviderFuture<'a, Initiation> {
        Box::pin(self.initiate_inner(request))
    }

    // Sandbox vs production is fixed by the configured base URL.
    fn fetch_status<'a>(
        &'a self,
        handle: &'a PaymentHandle,
        _environment: Environment,
    ) -> ProviderFuture<'a, StatusSnapshot> {
        Box::pin(self.fetch_status_inner(handle))
    }
}
