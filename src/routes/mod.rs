// Coordinator HTTP routes

mod auth;
mod error;
mod http;
mod miners;
mod overrides;
mod proxy;

use axum::http::{Method, header};
use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::proxy_client::ProxyClient;
use crate::store::Store;

pub use error::ApiError;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) store: Arc<Store>,
    pub(crate) proxy: Option<Arc<ProxyClient>>,
    pub(crate) agent_key: Option<Arc<str>>,
}

/// Build the coordinator router. `agent_key = None` leaves agent endpoints open.
pub fn app(store: Arc<Store>, proxy: Option<Arc<ProxyClient>>, agent_key: Option<&str>) -> Router {
    let state = AppState {
        store,
        proxy,
        agent_key: agent_key.map(Arc::from),
    };

    let agent_routes = Router::new()
        .route("/api/report", post(miners::report)) // POST /api/report
        .route("/api/miners/{id}/config/pending", get(overrides::pending)) // GET pending
        .route("/api/miners/{id}/config/ack", post(overrides::ack)) // POST ack
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_agent_key,
        ));

    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/miners", get(miners::list)) // GET /api/miners
        .route("/api/miners/{id}", get(miners::detail)) // GET /api/miners/{id}
        .route(
            "/api/miners/{id}/config",
            put(overrides::set).delete(overrides::delete),
        ) // PUT, DELETE /api/miners/{id}/config
        .route("/api/overview", get(miners::overview)) // GET /api/overview
        .route("/api/hashrate/history", get(miners::history)) // GET /api/hashrate/history
        .route("/api/proxy/summary", get(proxy::summary)) // GET /api/proxy/summary
        .route("/api/proxy/workers", get(proxy::workers)) // GET /api/proxy/workers
        .merge(agent_routes)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        )
        .with_state(state)
}
