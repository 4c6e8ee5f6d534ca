//! HTTP server for the cafeteria ordering service.
//!
//! Customer routes cover the menu, the cart, payment and order tracking.
//! Staff routes maintain the catalog and drive orders through the kitchen.
//! Requests are traced and counted with Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod session;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use session::SessionStore;
use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let admin = Router::new()
        .route(
            "/categories",
            get(routes::admin::list_categories::<S>).post(routes::admin::create_category::<S>),
        )
        .route(
            "/products",
            get(routes::admin::list_products::<S>).post(routes::admin::create_product::<S>),
        )
        .route(
            "/products/{id}",
            put(routes::admin::update_product::<S>).delete(routes::admin::delete_product::<S>),
        )
        .route(
            "/promotions",
            get(routes::admin::list_promotions::<S>).post(routes::admin::create_promotion::<S>),
        )
        .route(
            "/promotions/{id}",
            get(routes::admin::get_promotion::<S>).put(routes::admin::update_promotion::<S>),
        )
        .route(
            "/orders/{id}/status",
            post(routes::admin::change_status::<S>),
        )
        .route(
            "/orders/{id}/recalculate",
            post(routes::admin::recalculate::<S>),
        )
        .route("/orders/{id}/history", get(routes::admin::history::<S>));

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/", get(routes::menu::root))
        .route("/menu", get(routes::menu::list::<S>))
        .route(
            "/order/new",
            get(routes::cart::show::<S>).post(routes::cart::submit::<S>),
        )
        .route(
            "/order/{id}/method",
            get(routes::payment::method_form::<S>).post(routes::payment::select_method::<S>),
        )
        .route(
            "/order/{id}/pay",
            get(routes::payment::pay_form::<S>).post(routes::payment::confirm::<S>),
        )
        .route(
            "/order/{id}/confirmation",
            get(routes::payment::confirmation::<S>),
        )
        .route("/order/{id}/cancel", post(routes::orders::cancel::<S>))
        .route("/orders/mine", get(routes::orders::mine::<S>))
        .nest("/admin", admin)
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over `store`.
pub fn create_default_state<S: Store>(store: S, config: &Config) -> Arc<AppState<S>> {
    let mut state = AppState::new(store, config.login_url.clone(), config.admin_token.clone());
    state.sessions = SessionStore::with_idle_ttl(config.session_idle_ttl);
    Arc::new(state)
}
