//! # shenron-proxy
//!
//! Same-origin JSON endpoint for the SHENRON web UI. The browser posts
//! `{ "action": ..., ... }` to `/` or `/api.php`; the proxy turns each
//! action into a call against the Python backend or LM Studio and relays
//! the answer.
//!
//! | action | upstream |
//! |---|---|
//! | `health`, `python_heartbeat` | `GET {backend}/health` |
//! | `metrics` | `GET {backend}/api/shenron/metrics` |
//! | `start_wish` | `POST {backend}/api/shenron/grant-wish` |
//! | `wish_status` | `GET {backend}/api/shenron/job-status/{job_id}` |
//! | `cancel_wish` | `POST {backend}/api/shenron/cancel-job/{job_id}` |
//! | `lm_health` | `GET {lm}/models` |
//! | `fast_mode` | `POST {lm}/chat/completions` |
//!
//! # Setup
//!
//! ```sh
//! SHENRON_BACKEND_URL=http://10.0.0.5:5000 \
//! SHENRON_LM_STUDIO_URL=http://10.0.0.5:1234/v1 \
//! RUST_LOG=info cargo run -p shenron-proxy
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::post,
    Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod upstream;

pub use config::Config;
pub use error::{ProxyError, Result};
pub use state::AppState;

use routes::action_handler;

/// Build the router. Split out from [`start_server`] so it can be served
/// on any listener.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/", post(action_handler))
        .route("/api.php", post(action_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading configuration...");
    let config = Config::load()?;
    info!(
        "Backend at {}, LM Studio at {}",
        config.backend_url, config.lm_studio_url
    );

    let address = format!("0.0.0.0:{}", config.port);
    let app = app(AppState::new(config));

    info!("Binding to {address}");
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
