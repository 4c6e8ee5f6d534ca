//! Payment steps: choose a method, confirm with a reference, see the receipt.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Form, Json};
use common::PaymentMethod;
use domain::{ConfirmPayment, DomainError, PaymentError, SelectPaymentMethod};
use serde::{Deserialize, Serialize};
use store::{Order, Payment, Store};

use crate::auth::CurrentCustomer;
use crate::error::{ApiError, FormErrors};
use crate::session::{FlashMessage, Level};
use crate::state::AppState;

use super::{MY_ORDERS_PATH, order_path, parse_order_id, redirect_with, required_field};

#[derive(Serialize)]
pub struct MethodOption {
    pub value: PaymentMethod,
    pub label: &'static str,
}

#[derive(Serialize)]
pub struct MethodResponse {
    pub order: Order,
    pub methods: Vec<MethodOption>,
    pub selected: Option<PaymentMethod>,
    pub messages: Vec<FlashMessage>,
}

#[derive(Serialize)]
pub struct PayResponse {
    pub order: Order,
    pub payment: Payment,
    pub messages: Vec<FlashMessage>,
}

#[derive(Serialize)]
pub struct ConfirmationResponse {
    pub order: Order,
    pub payment: Option<Payment>,
    pub paid: bool,
    pub messages: Vec<FlashMessage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MethodForm {
    pub method: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReferenceForm {
    pub reference: Option<String>,
}

/// GET /order/{id}/method — the order and the available methods.
#[tracing::instrument(skip(state, customer), fields(customer_id = %customer.customer_id))]
pub async fn method_form<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    customer: CurrentCustomer,
    Path(id): Path<String>,
) -> Result<Json<MethodResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let (order, payment) = state
        .payments
        .summary(order_id, customer.customer_id)
        .await?;
    let messages = state.sessions.take_messages(customer.session_id).await;

    Ok(Json(MethodResponse {
        order,
        methods: PaymentMethod::ALL
            .iter()
            .map(|m| MethodOption {
                value: *m,
                label: m.label(),
            })
            .collect(),
        selected: payment.map(|p| p.method),
        messages,
    }))
}

/// POST /order/{id}/method — store the chosen method. Choosing again after
/// a confirmation resets the payment to unpaid.
#[tracing::instrument(skip(state, customer, form), fields(customer_id = %customer.customer_id))]
pub async fn select_method<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    customer: CurrentCustomer,
    Path(id): Path<String>,
    Form(form): Form<MethodForm>,
) -> Result<Redirect, ApiError> {
    let order_id = parse_order_id(&id)?;
    let mut errors = FormErrors::default();
    let Some(method) = required_field::<PaymentMethod>(form.method.as_deref(), "method", &mut errors)
    else {
        return Err(errors.into());
    };

    let result = state
        .payments
        .select_method(SelectPaymentMethod::new(order_id, customer.customer_id, method))
        .await;

    match result {
        Ok(_) => Ok(Redirect::to(&order_path(order_id, "pay"))),
        Err(DomainError::Payment(err @ PaymentError::OrderNotPayable { .. })) => {
            Ok(redirect_with(&state, &customer, Level::Warning, err.to_string(), MY_ORDERS_PATH).await)
        }
        Err(err) => Err(err.into()),
    }
}

/// GET /order/{id}/pay — the reference form. Requires a selected method.
#[tracing::instrument(skip(state, customer), fields(customer_id = %customer.customer_id))]
pub async fn pay_form<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    customer: CurrentCustomer,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let order_id = parse_order_id(&id)?;
    let (order, payment) = state
        .payments
        .summary(order_id, customer.customer_id)
        .await?;

    let Some(payment) = payment else {
        return Ok(redirect_with(
            &state,
            &customer,
            Level::Warning,
            "Choose a payment method first.",
            &order_path(order_id, "method"),
        )
        .await
        .into_response());
    };

    let messages = state.sessions.take_messages(customer.session_id).await;
    Ok(Json(PayResponse {
        order,
        payment,
        messages,
    })
    .into_response())
}

/// POST /order/{id}/pay — confirm the payment.
#[tracing::instrument(skip(state, customer, form), fields(customer_id = %customer.customer_id))]
pub async fn confirm<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    customer: CurrentCustomer,
    Path(id): Path<String>,
    Form(form): Form<ReferenceForm>,
) -> Result<Redirect, ApiError> {
    let order_id = parse_order_id(&id)?;

    let result = state
        .payments
        .confirm(ConfirmPayment::new(
            order_id,
            customer.customer_id,
            form.reference,
        ))
        .await;

    match result {
        Ok(_) => Ok(redirect_with(
            &state,
            &customer,
            Level::Success,
            format!("Payment for order #{order_id} confirmed."),
            &order_path(order_id, "confirmation"),
        )
        .await),
        Err(DomainError::Payment(PaymentError::MethodNotSelected(_))) => Ok(redirect_with(
            &state,
            &customer,
            Level::Warning,
            "Choose a payment method first.",
            &order_path(order_id, "method"),
        )
        .await),
        Err(DomainError::Payment(PaymentError::AlreadyConfirmed(_))) => Ok(redirect_with(
            &state,
            &customer,
            Level::Info,
            format!("Order #{order_id} is already paid."),
            &order_path(order_id, "confirmation"),
        )
        .await),
        Err(DomainError::Payment(err @ PaymentError::OrderNotPayable { .. })) => {
            Ok(redirect_with(&state, &customer, Level::Warning, err.to_string(), MY_ORDERS_PATH).await)
        }
        Err(err) => Err(err.into()),
    }
}

/// GET /order/{id}/confirmation — order and payment summary.
#[tracing::instrument(skip(state, customer), fields(customer_id = %customer.customer_id))]
pub async fn confirmation<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    customer: CurrentCustomer,
    Path(id): Path<String>,
) -> Result<Json<ConfirmationResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let (order, payment) = state
        .payments
        .summary(order_id, customer.customer_id)
        .await?;
    let messages = state.sessions.take_messages(customer.session_id).await;

    Ok(Json(ConfirmationResponse {
        paid: payment.as_ref().is_some_and(|p| p.paid),
        order,
        payment,
        messages,
    }))
}
