//! Domain layer for the cafeteria.
//!
//! This crate provides:
//! - The session cart and its stock rules
//! - The pricing and promotion engine
//! - Services for orders, payments and catalog administration

pub mod cart;
pub mod catalog;
pub mod commands;
pub mod error;
pub mod order;
pub mod pricing;

pub use cart::{Cart, CartChange, CartError, CartLine, CartService, CartView};
pub use catalog::CatalogService;
pub use commands::{
    AddToCart, CancelOrder, ChangeStatus, ConfirmPayment, PlaceOrder, SelectPaymentMethod,
    UpdateCartItem,
};
pub use error::{CatalogError, DomainError, OrderError, PaymentError};
pub use order::{MAX_REFERENCE_LEN, OrderService, PaymentService};
