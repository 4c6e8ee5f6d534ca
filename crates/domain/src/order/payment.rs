//! Payment workflow: `no payment -> method selected -> confirmed`.

use chrono::Utc;
use common::{CustomerId, OrderId};
use store::{Order, Payment, Store, StoreError};

use crate::commands::{ConfirmPayment, SelectPaymentMethod};
use crate::error::{DomainError, PaymentError};

use super::owned_order;

/// Longest transaction reference accepted on confirmation.
pub const MAX_REFERENCE_LEN: usize = 100;

/// Service for selecting payment methods and confirming payments.
#[derive(Clone)]
pub struct PaymentService<S: Store> {
    store: S,
}

impl<S: Store> PaymentService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Chooses (or changes) how an order will be paid.
    ///
    /// Resets the payment to unpaid, even after a confirmation, so the
    /// customer has to confirm again with the new method. The order must
    /// still be pending.
    #[tracing::instrument(skip(self))]
    pub async fn select_method(&self, cmd: SelectPaymentMethod) -> Result<Payment, DomainError> {
        let order = owned_order(&self.store, cmd.order_id, cmd.customer_id).await?;
        if !order.status.accepts_payment() {
            return Err(PaymentError::OrderNotPayable {
                status: order.status,
            }
            .into());
        }

        let payment = self
            .store
            .select_payment_method(order.id, cmd.method)
            .await?;
        tracing::info!(order_id = %order.id, method = %payment.method, "Payment method selected");

        Ok(payment)
    }

    /// Confirms the payment of an order and releases it to the kitchen as
    /// pending.
    #[tracing::instrument(skip(self))]
    pub async fn confirm(&self, cmd: ConfirmPayment) -> Result<(Payment, Order), DomainError> {
        let reference = normalize_reference(cmd.reference)?;

        let order = owned_order(&self.store, cmd.order_id, cmd.customer_id).await?;
        let payment = self
            .store
            .get_payment(order.id)
            .await?
            .ok_or(PaymentError::MethodNotSelected(order.id))?;
        if payment.paid {
            return Err(PaymentError::AlreadyConfirmed(order.id).into());
        }
        if !order.status.accepts_payment() {
            return Err(PaymentError::OrderNotPayable {
                status: order.status,
            }
            .into());
        }

        let (payment, order) = self
            .store
            .confirm_payment(order.id, reference, Utc::now())
            .await
            .map_err(|e| match e {
                StoreError::NotFound { .. } => {
                    DomainError::Payment(PaymentError::MethodNotSelected(cmd.order_id))
                }
                StoreError::AlreadyPaid(id) => {
                    DomainError::Payment(PaymentError::AlreadyConfirmed(id))
                }
                StoreError::StatusConflict { actual, .. } => {
                    DomainError::Payment(PaymentError::OrderNotPayable { status: actual })
                }
                other => DomainError::Store(other),
            })?;

        tracing::info!(order_id = %order.id, method = %payment.method, "Payment confirmed");
        metrics::counter!("cafeteria_payments_confirmed_total", "method" => payment.method.as_str())
            .increment(1);

        Ok((payment, order))
    }

    /// The order and its payment, if any, as shown on the confirmation page.
    pub async fn summary(
        &self,
        order_id: OrderId,
        customer_id: CustomerId,
    ) -> Result<(Order, Option<Payment>), DomainError> {
        let order = owned_order(&self.store, order_id, customer_id).await?;
        let payment = self.store.get_payment(order.id).await?;
        Ok((order, payment))
    }
}

/// Trims the reference; blank means none.
fn normalize_reference(reference: Option<String>) -> Result<Option<String>, PaymentError> {
    let Some(reference) = reference else {
        return Ok(None);
    };
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_REFERENCE_LEN {
        return Err(PaymentError::ReferenceTooLong {
            max: MAX_REFERENCE_LEN,
        });
    }
    Ok(Some(trimmed.to_string()))
}
