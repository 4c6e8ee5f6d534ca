//! The customer's order list and cancellation.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::Redirect;
use domain::{CancelOrder, DomainError, OrderError};
use serde::Serialize;
use store::{Order, Store};

use crate::auth::CurrentCustomer;
use crate::error::ApiError;
use crate::session::{FlashMessage, Level};
use crate::state::AppState;

use super::{MY_ORDERS_PATH, parse_order_id, redirect_with};

#[derive(Serialize)]
pub struct MyOrdersResponse {
    pub orders: Vec<Order>,
    pub messages: Vec<FlashMessage>,
}

/// GET /orders/mine — the customer's orders, newest first, cancelled ones
/// left out.
#[tracing::instrument(skip(state, customer), fields(customer_id = %customer.customer_id))]
pub async fn mine<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    customer: CurrentCustomer,
) -> Result<Json<MyOrdersResponse>, ApiError> {
    let orders = state.orders.list_for_customer(customer.customer_id).await?;
    let messages = state.sessions.take_messages(customer.session_id).await;

    Ok(Json(MyOrdersResponse { orders, messages }))
}

/// POST /order/{id}/cancel — cancel the order if it is still pending.
#[tracing::instrument(skip(state, customer), fields(customer_id = %customer.customer_id))]
pub async fn cancel<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    customer: CurrentCustomer,
    Path(id): Path<String>,
) -> Result<Redirect, ApiError> {
    let order_id = parse_order_id(&id)?;

    match state
        .orders
        .cancel(CancelOrder::new(order_id, customer.customer_id))
        .await
    {
        Ok(order) => Ok(redirect_with(
            &state,
            &customer,
            Level::Success,
            format!("Order #{} cancelled.", order.id),
            MY_ORDERS_PATH,
        )
        .await),
        Err(DomainError::Order(OrderError::CannotCancel { .. })) => Ok(redirect_with(
            &state,
            &customer,
            Level::Warning,
            format!("Order #{order_id} can no longer be cancelled."),
            MY_ORDERS_PATH,
        )
        .await),
        Err(err) => Err(err.into()),
    }
}
