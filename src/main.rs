use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::{signal, sync::mpsc};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use storefront_api as api;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(&cfg.log_level, cfg.log_json);

    // Init DB
    let db = api::db::establish_connection(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db).await?;
    }
    let db = Arc::new(db);

    // Init events
    let (event_tx, event_rx) = mpsc::channel(1024);
    let event_sender = api::events::EventSender::new(event_tx);
    tokio::spawn(api::events::process_events(event_rx));

    // External collaborators
    let gateway: Arc<dyn api::services::PaymentGateway> = Arc::new(
        api::services::HttpPaymentGateway::from_config(&cfg.payment),
    );
    let mailer = api::notifications::mailer_from_config(&cfg.mail);

    let auth = Arc::new(api::auth::AuthService::new(
        cfg.jwt_secret.clone(),
        Duration::from_secs(cfg.jwt_expiration_secs),
    ));

    let config = Arc::new(cfg);
    let services = api::handlers::AppServices::new(
        db.clone(),
        Arc::new(event_sender.clone()),
        gateway,
        mailer,
        auth.clone(),
        config.clone(),
    );

    let state = Arc::new(api::AppState {
        db,
        config: config.clone(),
        event_sender,
        auth,
        services,
    });

    let app = api::handlers::api_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("Failed to install ctrl-c handler: {}", e);
        return;
    }
    info!("Shutdown signal received");
}
