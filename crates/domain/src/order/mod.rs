//! Order placement, status workflow and payment.

mod payment;
mod service;

pub use payment::{MAX_REFERENCE_LEN, PaymentService};
pub use service::OrderService;

use common::{CustomerId, OrderId};
use store::{Order, Store};

use crate::error::{DomainError, OrderError};

/// Loads an order, hiding orders of other customers as not found.
pub(crate) async fn owned_order<S: Store>(
    store: &S,
    order_id: OrderId,
    customer_id: CustomerId,
) -> Result<Order, DomainError> {
    match store.get_order(order_id).await? {
        Some(order) if order.belongs_to(customer_id) => Ok(order),
        _ => Err(OrderError::NotFound(order_id).into()),
    }
}
