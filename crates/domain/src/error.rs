//! Domain error types.

use common::{OrderId, OrderStatus, ProductId};
use rust_decimal::Decimal;
use store::StoreError;
use thiserror::Error;

use crate::cart::CartError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Errors related to placing orders and moving them through their statuses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The order does not exist or belongs to someone else.
    #[error("Order {0} not found")]
    NotFound(OrderId),

    #[error("Order cannot be cancelled while {status}")]
    CannotCancel { status: OrderStatus },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("Only {available} units of product {product_id} are left (requested {requested})")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// None of the products in the cart exist anymore.
    #[error("None of the products in the cart are available")]
    NoOrderableItems,
}

/// Errors related to the payment of an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("No payment method has been selected for order {0}")]
    MethodNotSelected(OrderId),

    #[error("Order cannot be paid while {status}")]
    OrderNotPayable { status: OrderStatus },

    #[error("Payment for order {0} was already confirmed")]
    AlreadyConfirmed(OrderId),

    #[error("Reference must be at most {max} characters")]
    ReferenceTooLong { max: usize },
}

/// Validation errors for catalog and promotion administration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("{entity} name must not be empty")]
    EmptyName { entity: &'static str },

    #[error("{field} must not be negative")]
    NegativeAmount { field: &'static str },

    #[error("Discount percent must be between 0 and 100, got {0}")]
    DiscountOutOfRange(Decimal),

    #[error("Promotion must not end before it starts")]
    InvalidDateWindow,

    #[error("Category {0} does not exist")]
    UnknownCategory(common::CategoryId),
}

impl CatalogError {
    /// Name of the submitted field the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            CatalogError::EmptyName { .. } => "name",
            CatalogError::NegativeAmount { field } => field,
            CatalogError::DiscountOutOfRange(_) => "discount_percent",
            CatalogError::InvalidDateWindow => "ends_on",
            CatalogError::UnknownCategory(_) => "category_id",
        }
    }
}
