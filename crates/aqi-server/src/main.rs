mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use aqi_api::federated::{DisabledVerifier, GoogleVerifier, IdentityVerifier};
use aqi_api::forecast::run_forecast_loop;
use aqi_api::mailer::{LogMailer, ResetMailer, WebhookMailer};
use aqi_api::routes::router;
use aqi_api::state::{AppState, AppStateInner};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aqi=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(aqi_db::Database::open(&config.db_path)?);

    let verifier: Arc<dyn IdentityVerifier> = match &config.google_client_id {
        Some(client_id) => Arc::new(GoogleVerifier::new(client_id.clone())),
        None => {
            info!("AQI_GOOGLE_CLIENT_ID not set, federated login disabled");
            Arc::new(DisabledVerifier)
        }
    };
    let mailer: Arc<dyn ResetMailer> = match &config.mail_webhook {
        Some(url) => Arc::new(WebhookMailer::new(url.clone())),
        None => {
            warn!("AQI_MAIL_WEBHOOK not set, reset links will only be logged");
            Arc::new(LogMailer)
        }
    };

    let app_state: AppState = Arc::new(AppStateInner::new(
        db.clone(),
        config.jwt_secret.clone(),
        verifier,
        mailer,
        config.reset_url.clone(),
    ));

    app_state.bootstrap_admin(&config.admin_password)?;
    if app_state.default_admin_password_active()? {
        warn!("The 'admin' account still uses the default password. Set AQI_ADMIN_PASSWORD or change it.");
    }

    // Daily forecast job
    tokio::spawn(run_forecast_loop(db, config.forecast_at));

    let app = router(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("AQI dashboard API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
