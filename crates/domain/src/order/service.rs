//! Order service: placement, repricing, cancellation and the staff workflow.

use chrono::{NaiveDate, Utc};
use common::{CustomerId, OrderId, OrderStatus};
use store::{NewOrder, Order, OrderLine, OrderQuery, StatusChange, Store, StoreError};

use crate::cart::CartError;
use crate::commands::{CancelOrder, ChangeStatus, PlaceOrder};
use crate::error::{DomainError, OrderError};
use crate::pricing;

use super::owned_order;

/// Service for managing orders.
#[derive(Clone)]
pub struct OrderService<S: Store> {
    store: S,
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service with the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Places an order from the contents of a cart.
    ///
    /// Each line snapshots the product's current name and price. Products
    /// that no longer exist are skipped. Stock is decremented in the same
    /// atomic operation that inserts the order, so a shortfall leaves
    /// nothing behind and the caller keeps its cart.
    #[tracing::instrument(skip(self, cmd), fields(customer_id = %cmd.customer_id))]
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<Order, DomainError> {
        if cmd.cart.is_empty() {
            return Err(CartError::EmptyCart.into());
        }

        let products = self.store.get_products(&cmd.cart.product_ids()).await?;
        let lines: Vec<OrderLine> = cmd
            .cart
            .iter()
            .filter_map(|(product_id, quantity)| {
                let product = products.iter().find(|p| p.id == product_id)?;
                Some(OrderLine {
                    product_id,
                    product_name: product.name.clone(),
                    quantity,
                    unit_price: product.price,
                })
            })
            .collect();

        if lines.is_empty() {
            return Err(OrderError::NoOrderableItems.into());
        }

        let promotions = self.store.list_promotions(true).await?;
        let pricing = pricing::price_lines(&lines, &promotions, today());

        let order = self
            .store
            .place_order(NewOrder {
                customer_id: cmd.customer_id,
                created_at: Utc::now(),
                lines,
                pricing,
            })
            .await
            .map_err(|e| match e {
                StoreError::InsufficientStock {
                    product_id,
                    requested,
                    available,
                } => {
                    tracing::warn!(%product_id, requested, available, "Stock conflict on order placement");
                    metrics::counter!("cafeteria_stock_conflicts_total").increment(1);
                    DomainError::Order(OrderError::InsufficientStock {
                        product_id,
                        requested,
                        available,
                    })
                }
                other => DomainError::Store(other),
            })?;

        tracing::info!(order_id = %order.id, total = %order.total(), "Order placed");
        metrics::counter!("cafeteria_orders_placed_total").increment(1);

        Ok(order)
    }

    /// Recomputes the subtotal from the order's lines and reapplies the
    /// promotion engine with today's promotions.
    #[tracing::instrument(skip(self))]
    pub async fn recalculate_total(&self, order_id: OrderId) -> Result<Order, DomainError> {
        self.recalculate_total_on(order_id, today()).await
    }

    /// Same as [`recalculate_total`](Self::recalculate_total) for a given day.
    pub async fn recalculate_total_on(
        &self,
        order_id: OrderId,
        today: NaiveDate,
    ) -> Result<Order, DomainError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))?;

        let promotions = self.store.list_promotions(true).await?;
        let pricing = pricing::price_lines(&order.lines, &promotions, today);
        if pricing == order.pricing {
            return Ok(order);
        }

        Ok(self.store.update_pricing(order_id, pricing).await?)
    }

    /// The customer's orders, newest first, without cancelled ones.
    #[tracing::instrument(skip(self))]
    pub async fn list_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Order>, DomainError> {
        Ok(self
            .store
            .query_orders(OrderQuery::for_customer(customer_id))
            .await?)
    }

    /// Cancels an order on behalf of its owner. Only pending orders can be
    /// cancelled.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, cmd: CancelOrder) -> Result<Order, DomainError> {
        let order = owned_order(&self.store, cmd.order_id, cmd.customer_id).await?;
        if !order.status.can_customer_cancel() {
            return Err(OrderError::CannotCancel {
                status: order.status,
            }
            .into());
        }

        let order = self
            .store
            .change_status(order.id, order.status, OrderStatus::Cancelled)
            .await
            .map_err(|e| match e {
                StoreError::StatusConflict { actual, .. } => {
                    DomainError::Order(OrderError::CannotCancel { status: actual })
                }
                other => DomainError::Store(other),
            })?;

        tracing::info!(order_id = %order.id, "Order cancelled by customer");
        metrics::counter!("cafeteria_orders_cancelled_total").increment(1);

        Ok(order)
    }

    /// Moves an order one step along the kitchen workflow, or cancels it.
    #[tracing::instrument(skip(self))]
    pub async fn change_status(&self, cmd: ChangeStatus) -> Result<Order, DomainError> {
        let order = self
            .store
            .get_order(cmd.order_id)
            .await?
            .ok_or(OrderError::NotFound(cmd.order_id))?;

        if !order.status.can_transition_to(cmd.status) {
            return Err(OrderError::InvalidStatusTransition {
                from: order.status,
                to: cmd.status,
            }
            .into());
        }

        let order = self
            .store
            .change_status(order.id, order.status, cmd.status)
            .await
            .map_err(|e| match e {
                StoreError::StatusConflict { actual, .. } => {
                    DomainError::Order(OrderError::InvalidStatusTransition {
                        from: actual,
                        to: cmd.status,
                    })
                }
                other => DomainError::Store(other),
            })?;

        tracing::info!(order_id = %order.id, status = %order.status, "Order status changed");
        if order.status == OrderStatus::Cancelled {
            metrics::counter!("cafeteria_orders_cancelled_total").increment(1);
        }

        Ok(order)
    }

    /// Status history of an order, oldest first.
    pub async fn history(&self, order_id: OrderId) -> Result<Vec<StatusChange>, DomainError> {
        if self.store.get_order(order_id).await?.is_none() {
            return Err(OrderError::NotFound(order_id).into());
        }
        Ok(self.store.status_history(order_id).await?)
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::Cart;
    use common::Money;
    use rust_decimal_macros::dec;
    use store::{
        CatalogStore, InMemoryStore, Product, ProductDraft, PromotionDraft, PromotionStore,
    };

    async fn product(store: &InMemoryStore, name: &str, units: i64, stock: u32) -> Product {
        store
            .create_product(ProductDraft {
                name: name.to_string(),
                category_id: None,
                price: Money::from_units(units),
                description: String::new(),
                active: true,
                stock,
            })
            .await
            .unwrap()
    }

    fn cart_of(items: &[(&Product, u32)]) -> Cart {
        let mut cart = Cart::new();
        for (product, quantity) in items {
            cart.add(product, *quantity).unwrap();
        }
        cart
    }

    #[tokio::test]
    async fn test_place_order_snapshots_lines() {
        let store = InMemoryStore::new();
        let latte = product(&store, "Latte", 6000, 5).await;
        let service = OrderService::new(store.clone());
        let customer_id = CustomerId::new();

        let order = service
            .place_order(PlaceOrder::new(customer_id, cart_of(&[(&latte, 2)])))
            .await
            .unwrap();

        assert_eq!(order.customer_id, customer_id);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.lines[0].product_name, "Latte");
        assert_eq!(order.total(), Money::from_units(12000));
        assert_eq!(
            store.get_product(latte.id).await.unwrap().unwrap().stock,
            3
        );
    }

    #[tokio::test]
    async fn test_place_order_with_empty_cart() {
        let service = OrderService::new(InMemoryStore::new());
        let result = service
            .place_order(PlaceOrder::new(CustomerId::new(), Cart::new()))
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Cart(CartError::EmptyCart))
        ));
    }

    #[tokio::test]
    async fn test_place_order_skips_deleted_products() {
        let store = InMemoryStore::new();
        let latte = product(&store, "Latte", 6000, 5).await;
        let muffin = product(&store, "Muffin", 4000, 5).await;
        let cart = cart_of(&[(&latte, 1), (&muffin, 1)]);
        store.delete_product(muffin.id).await.unwrap();

        let service = OrderService::new(store);
        let order = service
            .place_order(PlaceOrder::new(CustomerId::new(), cart))
            .await
            .unwrap();

        assert_eq!(order.lines.len(), 1);
        assert_eq!(order.lines[0].product_id, latte.id);
    }

    #[tokio::test]
    async fn test_place_order_with_only_deleted_products() {
        let store = InMemoryStore::new();
        let latte = product(&store, "Latte", 6000, 5).await;
        let cart = cart_of(&[(&latte, 1)]);
        store.delete_product(latte.id).await.unwrap();

        let service = OrderService::new(store);
        let result = service
            .place_order(PlaceOrder::new(CustomerId::new(), cart))
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::NoOrderableItems))
        ));
    }

    #[tokio::test]
    async fn test_place_order_stock_conflict() {
        let store = InMemoryStore::new();
        let latte = product(&store, "Latte", 6000, 5).await;
        let cart = cart_of(&[(&latte, 4)]);
        store
            .update_product(
                latte.id,
                ProductDraft {
                    name: "Latte".to_string(),
                    category_id: None,
                    price: latte.price,
                    description: String::new(),
                    active: true,
                    stock: 2,
                },
            )
            .await
            .unwrap();

        let service = OrderService::new(store);
        let result = service
            .place_order(PlaceOrder::new(CustomerId::new(), cart))
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::InsufficientStock {
                requested: 4,
                available: 2,
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn test_recalculate_total_is_idempotent() {
        let store = InMemoryStore::new();
        let latte = product(&store, "Latte", 5000, 5).await;
        let service = OrderService::new(store.clone());
        let order = service
            .place_order(PlaceOrder::new(CustomerId::new(), cart_of(&[(&latte, 2)])))
            .await
            .unwrap();
        assert_eq!(order.total(), Money::from_units(10000));

        store
            .create_promotion(PromotionDraft {
                name: "Diez".to_string(),
                description: String::new(),
                discount_percent: dec!(10),
                minimum_amount: Some(Money::from_units(5000)),
                active: true,
                starts_on: None,
                ends_on: None,
            })
            .await
            .unwrap();

        let once = service.recalculate_total(order.id).await.unwrap();
        let twice = service.recalculate_total(order.id).await.unwrap();

        assert_eq!(once.total(), Money::from_units(9000));
        assert_eq!(once.pricing, twice.pricing);
    }

    #[tokio::test]
    async fn test_cancel_belongs_to_customer() {
        let store = InMemoryStore::new();
        let latte = product(&store, "Latte", 5000, 5).await;
        let service = OrderService::new(store);
        let order = service
            .place_order(PlaceOrder::new(CustomerId::new(), cart_of(&[(&latte, 1)])))
            .await
            .unwrap();

        let result = service
            .cancel(CancelOrder::new(order.id, CustomerId::new()))
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_change_status_rejects_skipping_steps() {
        let store = InMemoryStore::new();
        let latte = product(&store, "Latte", 5000, 5).await;
        let service = OrderService::new(store);
        let order = service
            .place_order(PlaceOrder::new(CustomerId::new(), cart_of(&[(&latte, 1)])))
            .await
            .unwrap();

        let result = service
            .change_status(ChangeStatus::new(order.id, OrderStatus::Ready))
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::InvalidStatusTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Ready
            }))
        ));
    }

    #[tokio::test]
    async fn test_history_of_unknown_order() {
        let service = OrderService::new(InMemoryStore::new());
        let result = service.history(OrderId::new(1)).await;
        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::NotFound(_)))
        ));
    }
}
