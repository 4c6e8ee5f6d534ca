//! Order totals and the promotion engine.
//!
//! Pricing always starts from the line subtotal. The stored discount is
//! derived, never an input, so repricing an order with the same promotions
//! gives the same result no matter how many times it runs.

use chrono::NaiveDate;
use common::Money;
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use store::{OrderLine, OrderPricing, Promotion};

/// Sum of `quantity * unit_price` over all lines.
pub fn calculate_subtotal(lines: &[OrderLine]) -> Money {
    lines.iter().map(OrderLine::subtotal).sum()
}

/// Returns true if `promotion` can be applied to `subtotal` on `today`.
pub fn is_applicable(promotion: &Promotion, subtotal: Money, today: NaiveDate) -> bool {
    promotion.active
        && promotion.is_valid_on(today)
        && promotion
            .minimum_amount
            .is_none_or(|minimum| subtotal >= minimum)
}

/// Picks the promotion to apply: the first applicable one in ascending id order.
pub fn select_promotion(
    promotions: &[Promotion],
    subtotal: Money,
    today: NaiveDate,
) -> Option<&Promotion> {
    promotions
        .iter()
        .filter(|p| is_applicable(p, subtotal, today))
        .min_by_key(|p| p.id)
}

/// Discount granted by `percent` on `subtotal`.
///
/// The percentage is clamped to `[0, 100]` and the result is rounded half away
/// from zero to the cent.
pub fn discount_for(percent: Decimal, subtotal: Money) -> Money {
    let percent = percent.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
    let cents = (Decimal::from(subtotal.cents()) * percent / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    Money::from_cents(cents.to_i64().unwrap_or_default())
}

/// Applies the promotion engine on top of an already computed subtotal.
///
/// Any discount recorded in `pricing` is discarded first.
pub fn apply_promotion(
    pricing: OrderPricing,
    promotions: &[Promotion],
    today: NaiveDate,
) -> OrderPricing {
    let subtotal = pricing.subtotal;

    match select_promotion(promotions, subtotal, today) {
        Some(promotion) => {
            let discount = discount_for(promotion.discount_percent, subtotal);
            OrderPricing {
                subtotal,
                discount,
                total: subtotal - discount,
                promotion_id: Some(promotion.id),
            }
        }
        None => OrderPricing {
            subtotal,
            discount: Money::zero(),
            total: subtotal,
            promotion_id: None,
        },
    }
}

/// Prices a set of lines: subtotal, then promotion.
pub fn price_lines(
    lines: &[OrderLine],
    promotions: &[Promotion],
    today: NaiveDate,
) -> OrderPricing {
    let pricing = OrderPricing {
        subtotal: calculate_subtotal(lines),
        ..OrderPricing::default()
    };
    apply_promotion(pricing, promotions, today)
}
