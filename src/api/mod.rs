pub mod handlers;
pub mod routes;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::state::AppState;

/// Builds the application router over `state`
pub fn router(state: AppState, enable_cors: bool) -> Router {
    let app = Router::new()
        // General routes
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::health::get_metrics))
        // Users and configuration
        .route("/api/users/login", post(handlers::users::login))
        .route("/api/users/me", get(handlers::users::me))
        .route("/api/configs", get(handlers::configs::get_configs))
        // Profiles
        .route(
            "/api/profiles",
            get(handlers::profiles::list).post(handlers::profiles::create),
        )
        .route(
            "/api/profiles/:id",
            get(handlers::profiles::get_one)
                .patch(handlers::profiles::patch_one)
                .delete(handlers::profiles::delete_one),
        )
        // Sessions
        .route(
            "/api/sessions",
            get(handlers::sessions::list).post(handlers::sessions::create),
        )
        .route(
            "/api/sessions/:id",
            axum::routing::patch(handlers::sessions::update).delete(handlers::sessions::delete),
        )
        // Messages
        .route(
            "/api/sessions/:id/messages",
            get(handlers::messages::list)
                .post(handlers::messages::create)
                .patch(handlers::messages::update)
                .delete(handlers::messages::delete),
        )
        .route("/api/sessions/:id/consult", post(handlers::messages::consult))
        .route(
            "/api/sessions/:id/messages/:message_id/feedback",
            post(handlers::messages::feedback),
        )
        .route(
            "/api/sessions/:id/messages/:message_id/translate",
            post(handlers::messages::translate),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        app
    }
}

/// Start the API server, serving until `shutdown` resolves
pub async fn start_api_server(
    state: AppState,
    config: &ServerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = router(state, config.enable_cors);

    let addr = format!("{}:{}", config.host, config.port).parse::<SocketAddr>()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Starting API server on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("API server stopped");
    Ok(())
}
