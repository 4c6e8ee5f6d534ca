//! HTTP route handlers.

pub mod admin;
pub mod cart;
pub mod health;
pub mod menu;
pub mod metrics;
pub mod orders;
pub mod payment;

use std::str::FromStr;

use axum::response::Redirect;
use common::OrderId;
use store::Store;

use crate::auth::CurrentCustomer;
use crate::error::{ApiError, FormErrors};
use crate::session::Level;
use crate::state::AppState;

pub const MENU_PATH: &str = "/menu";
pub const CART_PATH: &str = "/order/new";
pub const MY_ORDERS_PATH: &str = "/orders/mine";

/// Queues a flash message for the customer and redirects with `303 See Other`.
pub(crate) async fn redirect_with<S: Store>(
    state: &AppState<S>,
    customer: &CurrentCustomer,
    level: Level,
    text: impl Into<String>,
    to: &str,
) -> Redirect {
    state.sessions.flash(customer.session_id, level, text).await;
    Redirect::to(to)
}

/// Parses an order id from a path segment. Malformed ids are not found.
pub(crate) fn parse_order_id(raw: &str) -> Result<OrderId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound(format!("Order {raw} not found")))
}

/// Parses a required form field, recording an error if it is missing or
/// malformed.
pub(crate) fn required_field<T: FromStr>(
    value: Option<&str>,
    name: &str,
    errors: &mut FormErrors,
) -> Option<T> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => {
            errors.add(name, "This field is required.");
            None
        }
        Some(raw) => match raw.parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                errors.add(name, format!("'{raw}' is not a valid value."));
                None
            }
        },
    }
}

pub(crate) fn order_path(order_id: OrderId, step: &str) -> String {
    format!("/order/{order_id}/{step}")
}
