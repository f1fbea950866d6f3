use {
    sqlx::postgres::PgPoolOptions,
    std::{sync::Arc, time::Duration},
    swag_pay::{
        AppState, WebhookSecrets,
        adapters::{
            base_pay::BasePayProvider,
            notifier::{HttpNotifier, LogNotifier},
            routes,
            stripe_client::StripeProvider,
            wompi::WompiProvider,
        },
        config::AppConfig,
        domain::notify::Notifier,
        infra::postgres::PgPaymentStore,
        services::{
            checkout::{CheckoutService, CheckoutSettings},
            poller::ConfirmationPoller,
            registry::ProviderRegistry,
        },
    },
    tokio::{signal, sync::watch},
    tracing_subscriber::EnvFilter,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env().expect("invalid configuration");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    let mut providers = ProviderRegistry::new();
    if let Some(base_pay) = &config.base_pay {
        providers.register(Arc::new(
            BasePayProvider::new(base_pay, config.provider_timeout).expect("base pay client"),
        ));
    }
    if let Some(stripe) = &config.stripe {
        providers.register(Arc::new(StripeProvider::new(&stripe.secret_key)));
    }
    if let Some(wompi) = &config.wompi {
        providers.register(Arc::new(
            WompiProvider::new(wompi, &config.app_url, config.provider_timeout).expect("wompi client"),
        ));
    }
    tracing::info!(rails = ?providers.enabled(), "payment rails configured");

    let notifier: Arc<dyn Notifier> =
        if config.notifications.resend.is_some() || config.notifications.twilio.is_some() {
            Arc::new(
                HttpNotifier::new(&config.notifications, config.provider_timeout)
                    .expect("notification client"),
            )
        } else {
            tracing::warn!("no notification channel configured, notifications are logged only");
            Arc::new(LogNotifier)
        };

    let poller = ConfirmationPoller::new(config.poller.interval, config.poller.max_attempts)
        .expect("invalid poller settings")
        .with_attempt_timeout(config.provider_timeout);

    let checkout = CheckoutService::new(
        Arc::new(PgPaymentStore::new(pool.clone())),
        notifier,
        providers,
        poller,
        CheckoutSettings {
            base_pay_recipient: config
                .base_pay
                .as_ref()
                .map(|b| b.recipient.clone())
                .unwrap_or_default(),
            cop_per_usd: config.cop_per_usd,
        },
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState {
        checkout,
        webhook_secrets: WebhookSecrets {
            base_pay: config
                .base_pay
                .as_ref()
                .and_then(|b| b.webhook_secret.as_deref())
                .map(Arc::from),
            wompi: config
                .wompi
                .as_ref()
                .and_then(|w| w.webhook_secret.as_deref())
                .map(Arc::from),
            stripe: config
                .stripe
                .as_ref()
                .and_then(|s| s.webhook_secret.as_deref())
                .map(Arc::from),
        },
        base_pay_testnet: config.base_pay.as_ref().is_some_and(|b| b.testnet),
        shutdown: shutdown_rx,
    };

    let app = routes::router(
        state,
        routes::request_timeout(
            config.poller.interval,
            config.poller.max_attempts,
            config.provider_timeout,
        ),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("failed to bind");
    tracing::info!("listening on {}", config.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Wake pending confirmations so they answer 202 instead of hanging.
            let _ = shutdown_tx.send(true);
        })
        .await
        .expect("server error");

    pool.close().await;
    tracing::info!("shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
