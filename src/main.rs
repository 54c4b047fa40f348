use axum::routing::get;
use axum::{Json, Router};

use deploy_gate::config::AppConfig;
use deploy_gate::{app, db, docs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    let config = AppConfig::from_env()?;
    let port = config.port;
    tracing::info!(
        github_api = %config.github.api_url,
        lookup_timeout_ms = config.lookup_timeout.as_millis() as u64,
        pending_attempts = config.pending_retry.max_attempts,
        allow_mock = config.allow_mock,
        "configuration loaded"
    );

    let pool = db::init(&config.database_url).await?;
    let app = app::create_app(pool, config).await?;

    // serve the generated document so the webhook contract can be inspected
    let openapi_value = serde_json::to_value(docs::build_openapi(port)?)?;
    let docs_route = Router::new().route(
        "/api-docs/openapi.json",
        get(move || {
            let v = openapi_value.clone();
            async move { Json(v) }
        }),
    );
    let app = app.merge(docs_route);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

fn load_env() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(crate_env);
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
