//! Digital menu.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::Redirect;
use serde::Serialize;
use store::{Category, Product, Store};

use crate::auth::CurrentCustomer;
use crate::error::ApiError;
use crate::session::FlashMessage;
use crate::state::AppState;

use super::MENU_PATH;

#[derive(Serialize)]
pub struct MenuResponse {
    pub products: Vec<Product>,
    pub categories: Vec<Category>,
    pub messages: Vec<FlashMessage>,
}

/// GET / — send visitors to the menu.
pub async fn root() -> Redirect {
    Redirect::to(MENU_PATH)
}

/// GET /menu — active products that still have stock.
#[tracing::instrument(skip(state, customer), fields(customer_id = %customer.customer_id))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    customer: CurrentCustomer,
) -> Result<Json<MenuResponse>, ApiError> {
    let products = state.catalog.menu().await?;
    let categories = state.catalog.list_categories().await?;
    let messages = state.sessions.take_messages(customer.session_id).await;

    Ok(Json(MenuResponse {
        products,
        categories,
        messages,
    }))
}
