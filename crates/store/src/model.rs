//! Records persisted by the store and the drafts used to create them.

use chrono::{DateTime, NaiveDate, Utc};
use common::{
    CategoryId, CustomerId, Money, OrderId, OrderStatus, PaymentMethod, ProductId, PromotionId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A menu category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// A product on the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category_id: Option<CategoryId>,
    pub price: Money,
    pub description: String,
    pub active: bool,
    pub stock: u32,
}

impl Product {
    /// Returns true if the product can be shown on the menu and ordered.
    pub fn is_orderable(&self) -> bool {
        self.active && self.stock > 0
    }
}

/// Fields of a product as submitted by staff, for creation or replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    pub price: Money,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub stock: u32,
}

/// An automatic discount rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: PromotionId,
    pub name: String,
    pub description: String,
    /// Percentage taken off the order subtotal, e.g. `10.00`.
    pub discount_percent: Decimal,
    /// Subtotal the order must reach for the promotion to apply.
    pub minimum_amount: Option<Money>,
    pub active: bool,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
}

impl Promotion {
    /// Returns true if `today` falls inside the validity window.
    ///
    /// The window only restricts validity when both bounds are set.
    pub fn is_valid_on(&self, today: NaiveDate) -> bool {
        match (self.starts_on, self.ends_on) {
            (Some(start), Some(end)) => start <= today && today <= end,
            _ => true,
        }
    }
}

/// Fields of a promotion as submitted by staff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub discount_percent: Decimal,
    #[serde(default)]
    pub minimum_amount: Option<Money>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub starts_on: Option<NaiveDate>,
    #[serde(default)]
    pub ends_on: Option<NaiveDate>,
}

fn default_true() -> bool {
    true
}

/// One product line of an order, with the price snapshotted at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderLine {
    pub fn subtotal(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Amounts derived from an order's lines and the promotion applied to them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPricing {
    /// Sum of line subtotals before any discount.
    pub subtotal: Money,
    pub discount: Money,
    /// `subtotal - discount`.
    pub total: Money,
    pub promotion_id: Option<PromotionId>,
}

/// A placed order with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub pricing: OrderPricing,
    pub lines: Vec<OrderLine>,
}

impl Order {
    pub fn total(&self) -> Money {
        self.pricing.total
    }

    pub fn belongs_to(&self, customer_id: CustomerId) -> bool {
        self.customer_id == customer_id
    }
}

/// An order about to be placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub customer_id: CustomerId,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<OrderLine>,
    pub pricing: OrderPricing,
}

/// Payment record of an order (at most one per order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
}

/// One entry of an order's append-only status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub changed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn promotion(starts_on: Option<NaiveDate>, ends_on: Option<NaiveDate>) -> Promotion {
        Promotion {
            id: PromotionId::new(1),
            name: "Happy hour".to_string(),
            description: String::new(),
            discount_percent: dec!(10),
            minimum_amount: None,
            active: true,
            starts_on,
            ends_on,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn promotion_without_window_is_always_valid() {
        assert!(promotion(None, None).is_valid_on(date(2024, 1, 1)));
    }

    #[test]
    fn promotion_window_is_inclusive() {
        let promo = promotion(Some(date(2024, 3, 1)), Some(date(2024, 3, 31)));
        assert!(promo.is_valid_on(date(2024, 3, 1)));
        assert!(promo.is_valid_on(date(2024, 3, 31)));
        assert!(!promo.is_valid_on(date(2024, 2, 29)));
        assert!(!promo.is_valid_on(date(2024, 4, 1)));
    }

    #[test]
    fn half_open_window_does_not_restrict() {
        let promo = promotion(Some(date(2030, 1, 1)), None);
        assert!(promo.is_valid_on(date(2024, 1, 1)));
    }

    #[test]
    fn product_needs_stock_and_active_flag_to_be_orderable() {
        let mut product = Product {
            id: ProductId::new(1),
            name: "Latte".to_string(),
            category_id: None,
            price: Money::from_units(6000),
            description: String::new(),
            active: true,
            stock: 3,
        };
        assert!(product.is_orderable());

        product.stock = 0;
        assert!(!product.is_orderable());

        product.stock = 3;
        product.active = false;
        assert!(!product.is_orderable());
    }

    #[test]
    fn order_line_subtotal_multiplies_snapshot_price() {
        let line = OrderLine {
            product_id: ProductId::new(1),
            product_name: "Brownie".to_string(),
            quantity: 3,
            unit_price: Money::from_units(5500),
        };
        assert_eq!(line.subtotal(), Money::from_units(16500));
    }
}
