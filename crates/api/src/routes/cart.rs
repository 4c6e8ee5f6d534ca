//! Self-service cart: view it, change it, and turn it into an order.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Redirect;
use axum::{Form, Json};
use common::ProductId;
use domain::{
    AddToCart, Cart, CartChange, CartView, DomainError, OrderError, PlaceOrder, UpdateCartItem,
};
use serde::{Deserialize, Serialize};
use store::{Product, Store};

use crate::auth::CurrentCustomer;
use crate::error::{ApiError, FormErrors};
use crate::session::{FlashMessage, Level};
use crate::state::AppState;

use super::{CART_PATH, order_path, redirect_with, required_field};

#[derive(Serialize)]
pub struct CartResponse {
    pub cart: CartView,
    /// Products that can still be added.
    pub products: Vec<Product>,
    pub messages: Vec<FlashMessage>,
}

/// Body of `POST /order/new`.
///
/// Fields are kept as raw strings so that malformed values end up as form
/// errors rather than extractor rejections.
#[derive(Debug, Default, Deserialize)]
pub struct CartForm {
    pub action: Option<String>,
    pub product_id: Option<String>,
    pub quantity: Option<String>,
}

/// GET /order/new — the cart with its resolved lines.
#[tracing::instrument(skip(state, customer), fields(customer_id = %customer.customer_id))]
pub async fn show<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    customer: CurrentCustomer,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.sessions.cart(customer.session_id).await;
    let view = state.carts.view(&cart).await?;
    let products = state.catalog.menu().await?;
    let messages = state.sessions.take_messages(customer.session_id).await;

    Ok(Json(CartResponse {
        cart: view,
        products,
        messages,
    }))
}

/// POST /order/new — `add`, `update`, `remove` or `finalize`.
#[tracing::instrument(skip(state, customer, form), fields(customer_id = %customer.customer_id))]
pub async fn submit<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    customer: CurrentCustomer,
    Form(form): Form<CartForm>,
) -> Result<Redirect, ApiError> {
    // Held until the action is done, so requests of one session never
    // overwrite each other's cart
    let mut cart = state.sessions.lock_cart(customer.session_id).await;

    match form.action.as_deref().map(str::trim) {
        Some("add") => add(&state, &customer, &mut cart, &form).await,
        Some("update") => update(&state, &customer, &mut cart, &form).await,
        Some("remove") => remove(&state, &customer, &mut cart, &form).await,
        Some("finalize") => finalize(&state, &customer, &mut cart).await,
        _ => Err(FormErrors::field("action", "Unknown cart action.").into()),
    }
}

async fn add<S: Store>(
    state: &AppState<S>,
    customer: &CurrentCustomer,
    cart: &mut Cart,
    form: &CartForm,
) -> Result<Redirect, ApiError> {
    let mut errors = FormErrors::default();
    let product_id = required_field::<ProductId>(form.product_id.as_deref(), "product_id", &mut errors);
    let quantity = required_field::<u32>(form.quantity.as_deref(), "quantity", &mut errors);
    let (Some(product_id), Some(quantity)) = (product_id, quantity) else {
        return Err(errors.into());
    };

    *cart = state
        .carts
        .add(cart.clone(), AddToCart::new(product_id, quantity))
        .await?;

    Ok(redirect_with(state, customer, Level::Success, "Product added to your cart.", CART_PATH).await)
}

async fn update<S: Store>(
    state: &AppState<S>,
    customer: &CurrentCustomer,
    cart: &mut Cart,
    form: &CartForm,
) -> Result<Redirect, ApiError> {
    let mut errors = FormErrors::default();
    let product_id = required_field::<ProductId>(form.product_id.as_deref(), "product_id", &mut errors);
    // Quantities below one clamp up to one, like quantities above stock clamp down
    let quantity = match form.quantity.as_deref().map(str::trim) {
        None | Some("") => Some(1),
        Some(_) => required_field::<i64>(form.quantity.as_deref(), "quantity", &mut errors)
            .map(|q| u32::try_from(q.max(1)).unwrap_or(u32::MAX)),
    };
    let (Some(product_id), Some(quantity)) = (product_id, quantity) else {
        return Err(errors.into());
    };

    let (updated, change) = state
        .carts
        .update(cart.clone(), UpdateCartItem::new(product_id, quantity))
        .await?;
    *cart = updated;

    let redirect = match change {
        CartChange::Updated(quantity) => {
            redirect_with(
                state,
                customer,
                Level::Info,
                format!("Quantity updated to {quantity}."),
                CART_PATH,
            )
            .await
        }
        CartChange::Removed => {
            redirect_with(
                state,
                customer,
                Level::Warning,
                "That product is no longer available and was removed from your cart.",
                CART_PATH,
            )
            .await
        }
        CartChange::Unchanged => Redirect::to(CART_PATH),
    };
    Ok(redirect)
}

async fn remove<S: Store>(
    state: &AppState<S>,
    customer: &CurrentCustomer,
    cart: &mut Cart,
    form: &CartForm,
) -> Result<Redirect, ApiError> {
    let mut errors = FormErrors::default();
    let Some(product_id) =
        required_field::<ProductId>(form.product_id.as_deref(), "product_id", &mut errors)
    else {
        return Err(errors.into());
    };

    let (remaining, removed) = state.carts.remove(cart.clone(), product_id);
    *cart = remaining;

    if removed {
        Ok(redirect_with(state, customer, Level::Info, "Product removed from your cart.", CART_PATH).await)
    } else {
        Ok(Redirect::to(CART_PATH))
    }
}

async fn finalize<S: Store>(
    state: &AppState<S>,
    customer: &CurrentCustomer,
    cart: &mut Cart,
) -> Result<Redirect, ApiError> {
    if cart.is_empty() {
        return Ok(redirect_with(state, customer, Level::Warning, "Your cart is empty.", CART_PATH).await);
    }

    match state
        .orders
        .place_order(PlaceOrder::new(customer.customer_id, cart.clone()))
        .await
    {
        Ok(order) => {
            cart.clear();
            Ok(redirect_with(
                state,
                customer,
                Level::Success,
                format!("Order #{} placed. Choose how you want to pay.", order.id),
                &order_path(order.id, "method"),
            )
            .await)
        }
        Err(DomainError::Order(OrderError::NoOrderableItems)) => {
            cart.clear();
            Err(ApiError::Domain(DomainError::Order(OrderError::NoOrderableItems)))
        }
        Err(err) => Err(err.into()),
    }
}
