use crate::config::ItemConfig;
use crate::entry::normalize_route_prefix;
use crate::handlers;
use crate::services::{connect_store, ItemStore};
use axum::{
    middleware,
    routing::get,
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics_middleware, request_id_middleware, security_headers_middleware,
};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: ItemConfig,
    pub store: Arc<dyn ItemStore>,
}

pub fn build_router(state: AppState) -> Router {
    let items = Router::new()
        .route(
            "/items",
            get(handlers::list_items).post(handlers::create_item),
        )
        .route(
            "/items/:item_id",
            get(handlers::read_item)
                .put(handlers::update_item)
                .delete(handlers::delete_item),
        )
        .route_layer(middleware::from_fn(metrics_middleware));

    let items = match normalize_route_prefix(state.config.api.route_prefix.as_deref()) {
        Some(prefix) => Router::new().nest(&prefix, items),
        None => items,
    };

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .merge(items)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
}

impl Application {
    /// Connects the configured store, then binds the listener.
    pub async fn build(config: ItemConfig) -> Result<Self, AppError> {
        let store = connect_store(&config.store).await.map_err(|e| {
            tracing::error!("Failed to connect to document store: {}", e);
            e
        })?;

        Self::build_with_store(config, store).await
    }

    pub async fn build_with_store(
        config: ItemConfig,
        store: Arc<dyn ItemStore>,
    ) -> Result<Self, AppError> {
        let state = AppState {
            config: config.clone(),
            store,
        };

        let app = build_router(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            update_mode = ?config.api.update_mode,
            route_prefix = ?config.api.route_prefix,
            "Listening on {}",
            port
        );

        let server = axum::serve(listener, app);

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}
