use {
    super::{checkout_api, webhooks},
    crate::AppState,
    axum::{
        Router,
        extract::DefaultBodyLimit,
        http::StatusCode,
        routing::{get, post},
    },
    std::time::Duration,
    tower_http::{timeout::TimeoutLayer, trace::TraceLayer},
};

/// Longest a confirm call may take: every attempt waiting out the interval
/// and a full provider timeout, plus slack. Must stay above
/// `ConfirmationPoller::max_run_time` so a spent budget answers 202, not 408.
pub fn request_timeout(
    poll_interval: Duration,
    max_attempts: u32,
    provider_timeout: Duration,
) -> Duration {
    (poll_interval + provider_timeout) * max_attempts + Duration::from_secs(30)
}

pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/base-pay/initiate", post(checkout_api::base_pay_initiate))
        .route("/api/base-pay/status/{id}", get(checkout_api::base_pay_status))
        .route(
            "/api/stripe/create-payment-intent",
            post(checkout_api::stripe_create_payment_intent),
        )
        .route(
            "/api/wompi/create-payment-link",
            post(checkout_api::wompi_create_payment_link),
        )
        .route(
            "/api/payments/{payment_id}/confirm",
            post(checkout_api::confirm_payment),
        )
        .route("/api/payments/{payment_id}", get(checkout_api::get_payment))
        .route("/api/base-pay/webhook", post(webhooks::base_pay_webhook))
        .route("/api/wompi/webhook", post(webhooks::wompi_webhook))
        .route("/api/stripe/webhook", post(webhooks::stripe_webhook))
        .layer(DefaultBodyLimit::max(64 * 1024)) // 64 KB, carts and provider events are far smaller
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
