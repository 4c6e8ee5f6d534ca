//! Commands accepted by the domain services.

use common::{CustomerId, OrderId, OrderStatus, PaymentMethod, ProductId};

use crate::cart::Cart;

/// Command to put units of a product in the cart.
#[derive(Debug, Clone)]
pub struct AddToCart {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl AddToCart {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Command to change the quantity of a product already in the cart.
#[derive(Debug, Clone)]
pub struct UpdateCartItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl UpdateCartItem {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Command to turn a cart into a placed order.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub customer_id: CustomerId,
    pub cart: Cart,
}

impl PlaceOrder {
    pub fn new(customer_id: CustomerId, cart: Cart) -> Self {
        Self { customer_id, cart }
    }
}

/// Command for a customer to cancel one of their orders.
#[derive(Debug, Clone)]
pub struct CancelOrder {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
}

impl CancelOrder {
    pub fn new(order_id: OrderId, customer_id: CustomerId) -> Self {
        Self {
            order_id,
            customer_id,
        }
    }
}

/// Command for staff to move an order to another status.
#[derive(Debug, Clone)]
pub struct ChangeStatus {
    pub order_id: OrderId,
    pub status: OrderStatus,
}

impl ChangeStatus {
    pub fn new(order_id: OrderId, status: OrderStatus) -> Self {
        Self { order_id, status }
    }
}

/// Command to choose how an order will be paid.
#[derive(Debug, Clone)]
pub struct SelectPaymentMethod {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub method: PaymentMethod,
}

impl SelectPaymentMethod {
    pub fn new(order_id: OrderId, customer_id: CustomerId, method: PaymentMethod) -> Self {
        Self {
            order_id,
            customer_id,
            method,
        }
    }
}

/// Command to confirm the payment of an order.
#[derive(Debug, Clone)]
pub struct ConfirmPayment {
    pub order_id: OrderId,
    pub customer_id: CustomerId,

    /// Transaction reference entered by the customer, if any.
    pub reference: Option<String>,
}

impl ConfirmPayment {
    pub fn new(order_id: OrderId, customer_id: CustomerId, reference: Option<String>) -> Self {
        Self {
            order_id,
            customer_id,
            reference,
        }
    }
}
