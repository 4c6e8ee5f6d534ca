//! Prometheus scrape endpoint.

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Counters registered by the service, with their help text.
pub const COUNTERS: [(&str, &str); 5] = [
    ("cafeteria_orders_placed_total", "Orders placed from a cart"),
    ("cafeteria_orders_cancelled_total", "Orders cancelled by customers or staff"),
    ("cafeteria_payments_confirmed_total", "Payments confirmed, by method"),
    ("cafeteria_cart_actions_total", "Cart changes, by action"),
    ("cafeteria_stock_conflicts_total", "Order placements rejected for lack of stock"),
];

/// Registers descriptions for the service counters with the installed recorder.
pub fn describe() {
    for (name, help) in COUNTERS {
        metrics::describe_counter!(name, help);
    }
}

/// GET /metrics — renders the recorder in the Prometheus text format.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    ([(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], handle.render())
}
