//! Service entry point: configuration, tracing, database and HTTP server.

use std::sync::Arc;

use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shuttle_subscriptions::adapters::auth::JwtSessionValidator;
use shuttle_subscriptions::adapters::http::{build_router, AppState};
use shuttle_subscriptions::adapters::paytech::{
    IpnVerifier, PaytechConfig, PaytechEnvironment, PaytechGateway,
};
use shuttle_subscriptions::adapters::postgres::{
    PostgresBillingReader, PostgresBillingStore, PostgresNotificationInbox,
};
use shuttle_subscriptions::adapters::sms::{
    LoggingMessageSender, TwilioConfig, TwilioMessageSender,
};
use shuttle_subscriptions::config::{AppConfig, PaymentConfig, SmsConfig};
use shuttle_subscriptions::domain::billing::CardTokenizer;
use shuttle_subscriptions::ports::{MessageSender, PaymentGateway};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await?;

    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("database migrations applied");
    }

    let store = Arc::new(PostgresBillingStore::new(pool.clone()));
    let reader = Arc::new(PostgresBillingReader::new(pool.clone()));
    let inbox = Arc::new(PostgresNotificationInbox::new(pool));

    let ipn_verifier = config
        .payment
        .verify_ipn
        .then(|| IpnVerifier::new(&config.payment.api_key, &config.payment.api_secret));

    let state = AppState {
        store,
        reader,
        inbox,
        gateway: payment_gateway(&config.payment),
        messages: message_sender(&config.sms),
        tokenizer: Arc::new(CardTokenizer::new(config.payment.card_token_secret.clone())),
        session_validator: Arc::new(JwtSessionValidator::new(
            &config.auth.jwt_secret,
            config.auth.issuer.as_deref(),
        )),
        cron_secret: Arc::new(config.cron.secret.clone()),
        ipn_verifier,
        currency: Arc::from(config.payment.currency.as_str()),
    };

    let app = build_router(state, &config.server);
    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        environment = %config.server.environment,
        gateway = %config.payment.environment,
        sms = config.sms.is_enabled(),
        "server ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// JSON logs in production, human-readable logs elsewhere. `RUST_LOG`
/// overrides the configured filter.
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    }
}

fn payment_gateway(payment: &PaymentConfig) -> Arc<dyn PaymentGateway> {
    let environment = if payment.is_live() {
        PaytechEnvironment::Prod
    } else {
        PaytechEnvironment::Test
    };

    let config = PaytechConfig::new(
        payment.api_key.clone(),
        payment.api_secret.clone(),
        payment.ipn_url.clone(),
    )
    .with_base_url(payment.api_base_url.clone())
    .with_environment(environment)
    .with_currency(payment.currency.clone())
    .with_return_urls(payment.success_url.clone(), payment.cancel_url.clone())
    .with_timeout(payment.request_timeout());

    Arc::new(PaytechGateway::new(config))
}

fn message_sender(sms: &SmsConfig) -> Arc<dyn MessageSender> {
    match (&sms.account_sid, &sms.auth_token, &sms.from_number) {
        (Some(sid), Some(token), Some(from)) => {
            let token: SecretString = token.clone();
            Arc::new(TwilioMessageSender::new(TwilioConfig::new(
                sid.clone(),
                token,
                from.clone(),
            )))
        }
        _ => {
            tracing::warn!("SMS not configured; payment receipts will only be logged");
            Arc::new(LoggingMessageSender::new())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C"),
        _ = terminate => tracing::info!("received terminate signal"),
    }

    tracing::info!("shutting down");
}
