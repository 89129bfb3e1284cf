//! Trade Ledger backend
//!
//! Inventory ledger and fulfilment pipelines for a trading business:
//! manufacturer orders and purchases fill warehouse stock, bookings reserve
//! it for buyers and sales deliver it.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod external;
pub mod handlers;
pub mod routes;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::{AppError, AppResult};

use external::{HistorySink, Notifier};
use store::{Repository, Store};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Open the store over `repository` and wrap it for the router
    pub async fn new(
        config: Config,
        repository: Arc<dyn Repository>,
        history_sink: Arc<dyn HistorySink>,
        notifier: Arc<dyn Notifier>,
    ) -> AppResult<Self> {
        let store = Store::open(config.store_settings(), repository, history_sink, notifier).await?;
        Ok(Self {
            store: Arc::new(store),
            config: Arc::new(config),
        })
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Trade Ledger API v1.0"
}
