use {
    crate::{
        AppState,
        adapters::api_errors::ApiError,
        domain::{
            error::CheckoutError,
            id::PaymentId,
            money::{Currency, Money},
            order::{CustomerInfo, OrderItem},
            payment::{Environment, PaymentMethod, PaymentRecord, PaymentStatus},
            provider::PayerInfoRequest,
        },
        services::checkout::{CheckoutRequest, CheckoutStarted, ConfirmationReport, StatusView},
    },
    axum::{
        Json,
        extract::{Path, Query, State},
        http::StatusCode,
    },
    rust_decimal::Decimal,
    serde::Deserialize,
};

/// Cart checkout as the storefront posts it. `amount` is the USD total in
/// major units (`"1.00"` or `1.0`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    pub amount: Decimal,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub customer_info: CustomerInfo,
    #[serde(default)]
    pub testnet: Option<bool>,
    #[serde(default)]
    pub payer_info: Option<PayerInfoRequest>,
}

impl CheckoutBody {
    fn into_request(
        self,
        method: PaymentMethod,
        environment: Environment,
    ) -> Result<CheckoutRequest, CheckoutError> {
        Ok(CheckoutRequest {
            method,
            amount_usd: Money::from_major(self.amount, Currency::Usd)?,
            items: self.items,
            customer: self.customer_info,
            environment,
            payer_info: self.payer_info,
        })
    }
}

#[tracing::instrument(name = "base_pay_initiate", skip_all)]
pub async fn base_pay_initiate(
    State(state): State<AppState>,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let environment = Environment::from_testnet(body.testnet.unwrap_or(state.base_pay_testnet));
    let request = body.into_request(PaymentMethod::BasePay, environment)?;
    let started = state.checkout.start(request).await?;

    Ok(Json(serde_json::json!({
        "id": started.external_id,
        "orderId": started.order_id,
        "paymentId": started.payment_id,
        "status": PaymentStatus::Pending.as_str(),
        "amount": started.charged.to_major_string(),
        "testnet": environment.is_test(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub testnet: Option<bool>,
}

/// One status query against the crypto rail. Writes nothing.
pub async fn base_pay_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusView>, ApiError> {
    let environment = Environment::from_testnet(query.testnet.unwrap_or(state.base_pay_testnet));
    let view = state
        .checkout
        .query_status(PaymentMethod::BasePay, &id, environment)
        .await?;
    Ok(Json(view))
}

#[tracing::instrument(name = "stripe_create_payment_intent", skip_all)]
pub async fn stripe_create_payment_intent(
    State(state): State<AppState>,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request = body.into_request(PaymentMethod::Stripe, Environment::Production)?;
    let started = state.checkout.start(request).await?;

    Ok(Json(serde_json::json!({
        "clientSecret": started.client_secret,
        "paymentIntentId": started.external_id,
        "orderId": started.order_id,
        "paymentId": started.payment_id,
    })))
}

#[tracing::instrument(name = "wompi_create_payment_link", skip_all)]
pub async fn wompi_create_payment_link(
    State(state): State<AppState>,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request = body.into_request(PaymentMethod::Wompi, Environment::Production)?;
    let CheckoutStarted {
        order_id,
        payment_id,
        external_id,
        charged,
        checkout_url,
        ..
    } = state.checkout.start(request).await?;

    Ok(Json(serde_json::json!({
        "paymentLink": checkout_url,
        "orderId": order_id,
        "paymentId": payment_id,
        "reference": external_id,
        "amountCop": charged.to_major_string(),
    })))
}

/// Polls until the payment settles and records the result.
/// 200 completed, 402 failed, 202 still pending (timed out or shutting down).
/// If the client hangs up, the future is dropped and polling stops with it.
#[tracing::instrument(name = "confirm", skip_all)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<(StatusCode, Json<ConfirmationReport>), ApiError> {
    let payment_id = PaymentId::new(payment_id)?;
    let report = state
        .checkout
        .confirm(&payment_id, state.shutdown.clone())
        .await?;

    let status = match report.status {
        PaymentStatus::Completed => StatusCode::OK,
        PaymentStatus::Failed => StatusCode::PAYMENT_REQUIRED,
        PaymentStatus::Pending => StatusCode::ACCEPTED,
    };
    Ok((status, Json(report)))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<Json<PaymentRecord>, ApiError> {
    let payment_id = PaymentId::new(payment_id)?;
    Ok(Json(state.checkout.payment(&payment_id).await?))
}
