use axum::middleware::from_fn;
use clap::Parser;
use collectibles_backend::api::middleware::request_id::request_id_middleware;
use collectibles_backend::config::AppConfig;
use collectibles_backend::infrastructure::{database, seed, storage};
use collectibles_backend::{AppState, create_app};
use dotenvy::dotenv;
use std::net::SocketAddr;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the API server to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port for the API server
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// Refuse to start without an explicit JWT_SECRET
    #[arg(long)]
    production: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment & logging
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "collectibles_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Collectibles Backend...");

    let config = if args.production {
        AppConfig::production()
    } else {
        AppConfig::from_env()
    };
    info!(
        "🛡️  Config: Max Size={}MB, Storage={}, Derivatives={}px/{}px",
        config.max_file_size / 1024 / 1024,
        config.storage_backend,
        config.full_image_size,
        config.thumbnail_size
    );

    // 2. Infrastructure
    let db = database::setup_database(&config.database_url).await?;
    let storage_service = storage::setup_storage(&config).await?;
    seed::seed_admin(&db, &config).await?;

    // 3. API
    let state = AppState::new(db, storage_service, config);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        })
        .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
            info!("📥 {} {}", request.method(), request.uri());
        })
        .on_response(
            |response: &axum::http::Response<_>,
             latency: std::time::Duration,
             _span: &tracing::Span| {
                info!(
                    "📤 Finished in {:?} with status {}",
                    latency,
                    response.status()
                );
            },
        );

    // request_id runs first so the trace span can see the id
    let app = create_app(state)
        .layer(trace_layer)
        .layer(from_fn(request_id_middleware));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("✅ API Server listening on: http://{}", addr);
    info!("📖 Swagger UI documentation: http://localhost:{}/swagger-ui", args.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Backend exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
