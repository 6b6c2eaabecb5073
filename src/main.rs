// Shop backend server

use anyhow::Result;
use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use shopbot_backend::database::Database;
use shopbot_backend::handlers;
use shopbot_backend::rates::{HttpBalanceSource, HttpDeliveryTransport, HttpPriceSource};
use shopbot_backend::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("shopbot_backend=info".parse().unwrap())
                .add_directive("sqlx=warn".parse().unwrap()),
        )
        .init();

    info!("Starting shop backend server");

    // Load configuration
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:shop.db".to_string());
    let gateway_url =
        std::env::var("BOT_GATEWAY_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let price_api_url = std::env::var("PRICE_API_URL")
        .unwrap_or_else(|_| "https://api.coingecko.com".to_string());
    let server_port = std::env::var("PORT")
        .unwrap_or_else(|_| "4000".to_string())
        .parse::<u16>()?;

    info!("Configuration:");
    info!("  Database: {}", database_url);
    info!("  Bot gateway: {}", gateway_url);
    info!("  Price API: {}", price_api_url);
    info!("  Server port: {}", server_port);

    // Initialize database
    let db = Database::init(&database_url).await?;

    // Create app state
    let state = Arc::new(AppState {
        db,
        transport: Arc::new(HttpDeliveryTransport::new(gateway_url.clone())),
        balance_source: Arc::new(HttpBalanceSource::new(gateway_url)),
        price_source: Arc::new(HttpPriceSource::new(price_api_url)),
    });

    // Setup CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        .route("/health", get(handlers::health_check))
        // Browsing
        .route("/api/catalog/roots", get(handlers::get_roots))
        .route("/api/catalog/:id/children", get(handlers::get_children))
        .route("/api/catalog/:id/breadcrumb", get(handlers::get_breadcrumb))
        // Purchase and balance
        .route("/api/buy", post(handlers::buy))
        .route("/api/users/:id/orders", get(handlers::order_history))
        .route("/api/balance/refresh", post(handlers::refresh_balance))
        // Admin
        .route("/api/admin/categories", post(handlers::create_category))
        .route(
            "/api/admin/categories/:id",
            patch(handlers::update_category).delete(handlers::delete_category),
        )
        .route("/api/admin/categories/:id/items", get(handlers::list_items))
        .route("/api/admin/items", post(handlers::restock))
        .route("/api/admin/announce", post(handlers::announce_restock))
        .with_state(state)
        .layer(cors);

    // Start server
    let addr = format!("0.0.0.0:{}", server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Shop backend listening on {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))
}
