use std::sync::Arc;

use kanban_hub::config::HubConfig;
use kanban_hub::services::permission::PgPermissionService;
use kanban_hub::services::session::PgSessionStore;
use kanban_hub::{db, routes, state};

#[tokio::main]
async fn main() {
    // A missing .env is normal in deployed environments.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = HubConfig::from_env().expect("invalid configuration");

    let pool = db::init_pool(&config.database).await.expect("database init failed");

    let state = state::AppState::new(
        Arc::new(PgPermissionService::new(pool.clone())),
        Arc::new(PgSessionStore::new(pool)),
        config.channel_capacity,
    );

    let app = routes::app(state);
    let port = config.port;
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "kanban hub listening");
    axum::serve(listener, app).await.expect("server failed");
}
