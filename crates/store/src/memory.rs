use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CategoryId, OrderId, OrderStatus, PaymentMethod, ProductId, PromotionId};
use tokio::sync::RwLock;

use crate::{
    Category, CatalogStore, NewOrder, Order, OrderPricing, OrderQuery, OrderStore, Payment,
    PaymentStore, Product, ProductDraft, ProductFilter, Promotion, PromotionDraft, PromotionStore,
    Result, StatusChange, StoreError,
};

#[derive(Debug, Default)]
struct Sequences {
    category: i64,
    product: i64,
    promotion: i64,
    order: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[derive(Debug, Default)]
struct Tables {
    categories: BTreeMap<CategoryId, Category>,
    products: BTreeMap<ProductId, Product>,
    promotions: BTreeMap<PromotionId, Promotion>,
    orders: BTreeMap<OrderId, Order>,
    payments: HashMap<OrderId, Payment>,
    history: Vec<StatusChange>,
    sequences: Sequences,
}

impl Tables {
    fn order(&self, id: OrderId) -> Result<&Order> {
        self.orders
            .get(&id)
            .ok_or_else(|| StoreError::not_found("Order", id))
    }

    /// Compare-and-set on the order status plus the history append.
    fn change_status(
        &mut self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<Order> {
        let order = self
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Order", id))?;

        if order.status != expected {
            return Err(StoreError::StatusConflict {
                order_id: id,
                expected,
                actual: order.status,
            });
        }

        order.status = next;
        let order = order.clone();
        self.history.push(StatusChange {
            order_id: id,
            status: next,
            changed_at: at,
        });
        Ok(order)
    }
}

/// In-memory store implementation.
///
/// All tables sit behind a single lock, so multi-record operations such as
/// order placement are atomic in the same way the PostgreSQL transaction
/// makes them.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of status history entries.
    pub async fn history_len(&self) -> usize {
        self.tables.read().await.history.len()
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn create_category(&self, name: &str) -> Result<Category> {
        let mut tables = self.tables.write().await;
        let id = CategoryId::new(next(&mut tables.sequences.category));
        let category = Category {
            id,
            name: name.to_string(),
        };
        tables.categories.insert(id, category.clone());
        Ok(category)
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self
            .tables
            .read()
            .await
            .categories
            .values()
            .cloned()
            .collect())
    }

    async fn create_product(&self, draft: ProductDraft) -> Result<Product> {
        let mut tables = self.tables.write().await;
        let id = ProductId::new(next(&mut tables.sequences.product));
        let product = Product {
            id,
            name: draft.name,
            category_id: draft.category_id,
            price: draft.price,
            description: draft.description,
            active: draft.active,
            stock: draft.stock,
        };
        tables.products.insert(id, product.clone());
        Ok(product)
    }

    async fn update_product(&self, id: ProductId, draft: ProductDraft) -> Result<Product> {
        let mut tables = self.tables.write().await;
        let product = tables
            .products
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Product", id))?;

        product.name = draft.name;
        product.category_id = draft.category_id;
        product.price = draft.price;
        product.description = draft.description;
        product.active = draft.active;
        product.stock = draft.stock;
        Ok(product.clone())
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        self.tables
            .write()
            .await
            .products
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("Product", id))
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.products.get(id).cloned())
            .collect())
    }

    async fn list_products(&self, filter: ProductFilter) -> Result<Vec<Product>> {
        let tables = self.tables.read().await;
        let mut products: Vec<_> = tables
            .products
            .values()
            .filter(|p| !filter.orderable_only || p.is_orderable())
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(products)
    }
}

#[async_trait]
impl PromotionStore for InMemoryStore {
    async fn create_promotion(&self, draft: PromotionDraft) -> Result<Promotion> {
        let mut tables = self.tables.write().await;
        let id = PromotionId::new(next(&mut tables.sequences.promotion));
        let promotion = Promotion {
            id,
            name: draft.name,
            description: draft.description,
            discount_percent: draft.discount_percent,
            minimum_amount: draft.minimum_amount,
            active: draft.active,
            starts_on: draft.starts_on,
            ends_on: draft.ends_on,
        };
        tables.promotions.insert(id, promotion.clone());
        Ok(promotion)
    }

    async fn update_promotion(
        &self,
        id: PromotionId,
        draft: PromotionDraft,
    ) -> Result<Promotion> {
        let mut tables = self.tables.write().await;
        let promotion = tables
            .promotions
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Promotion", id))?;

        promotion.name = draft.name;
        promotion.description = draft.description;
        promotion.discount_percent = draft.discount_percent;
        promotion.minimum_amount = draft.minimum_amount;
        promotion.active = draft.active;
        promotion.starts_on = draft.starts_on;
        promotion.ends_on = draft.ends_on;
        Ok(promotion.clone())
    }

    async fn get_promotion(&self, id: PromotionId) -> Result<Option<Promotion>> {
        Ok(self.tables.read().await.promotions.get(&id).cloned())
    }

    async fn list_promotions(&self, active_only: bool) -> Result<Vec<Promotion>> {
        // BTreeMap iteration is already ascending by id
        Ok(self
            .tables
            .read()
            .await
            .promotions
            .values()
            .filter(|p| !active_only || p.active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn place_order(&self, new_order: NewOrder) -> Result<Order> {
        let mut tables = self.tables.write().await;

        // Check every line before touching anything
        let mut requested: BTreeMap<ProductId, u32> = BTreeMap::new();
        for line in &new_order.lines {
            *requested.entry(line.product_id).or_default() += line.quantity;
        }
        for (&product_id, &quantity) in &requested {
            let product = tables
                .products
                .get(&product_id)
                .ok_or_else(|| StoreError::not_found("Product", product_id))?;
            if product.stock < quantity {
                return Err(StoreError::InsufficientStock {
                    product_id,
                    requested: quantity,
                    available: product.stock,
                });
            }
        }

        for (product_id, quantity) in requested {
            if let Some(product) = tables.products.get_mut(&product_id) {
                product.stock -= quantity;
            }
        }

        let id = OrderId::new(next(&mut tables.sequences.order));
        let order = Order {
            id,
            customer_id: new_order.customer_id,
            created_at: new_order.created_at,
            status: OrderStatus::Pending,
            pricing: new_order.pricing,
            lines: new_order.lines,
        };
        tables.orders.insert(id, order.clone());
        tables.history.push(StatusChange {
            order_id: id,
            status: OrderStatus::Pending,
            changed_at: new_order.created_at,
        });

        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn query_orders(&self, query: OrderQuery) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<_> = tables
            .orders
            .values()
            .filter(|o| query.matches(o.customer_id, o.status))
            .cloned()
            .collect();

        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        if query.newest_first {
            orders.reverse();
        }

        let offset = query.offset.unwrap_or(0);
        let orders = orders.into_iter().skip(offset);
        let orders = match query.limit {
            Some(limit) => orders.take(limit).collect(),
            None => orders.collect(),
        };

        Ok(orders)
    }

    async fn update_pricing(&self, id: OrderId, pricing: OrderPricing) -> Result<Order> {
        let mut tables = self.tables.write().await;
        let order = tables
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Order", id))?;
        order.pricing = pricing;
        Ok(order.clone())
    }

    async fn change_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Order> {
        self.tables
            .write()
            .await
            .change_status(id, expected, next, Utc::now())
    }

    async fn status_history(&self, id: OrderId) -> Result<Vec<StatusChange>> {
        let tables = self.tables.read().await;
        tables.order(id)?;
        Ok(tables
            .history
            .iter()
            .filter(|entry| entry.order_id == id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn get_payment(&self, order_id: OrderId) -> Result<Option<Payment>> {
        Ok(self.tables.read().await.payments.get(&order_id).cloned())
    }

    async fn select_payment_method(
        &self,
        order_id: OrderId,
        method: PaymentMethod,
    ) -> Result<Payment> {
        let mut tables = self.tables.write().await;
        tables.order(order_id)?;

        let payment = tables
            .payments
            .entry(order_id)
            .and_modify(|p| {
                p.method = method;
                p.paid = false;
                p.paid_at = None;
            })
            .or_insert_with(|| Payment {
                order_id,
                method,
                reference: None,
                paid: false,
                paid_at: None,
            });
        Ok(payment.clone())
    }

    async fn confirm_payment(
        &self,
        order_id: OrderId,
        reference: Option<String>,
        paid_at: DateTime<Utc>,
    ) -> Result<(Payment, Order)> {
        let mut tables = self.tables.write().await;

        let payment = tables
            .payments
            .get(&order_id)
            .ok_or_else(|| StoreError::not_found("Payment", order_id))?;
        if payment.paid {
            return Err(StoreError::AlreadyPaid(order_id));
        }

        let order =
            tables.change_status(order_id, OrderStatus::Pending, OrderStatus::Pending, paid_at)?;

        let payment = tables
            .payments
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::not_found("Payment", order_id))?;
        payment.paid = true;
        payment.paid_at = Some(paid_at);
        payment.reference = reference;

        Ok((payment.clone(), order))
    }
}
