//! Cart Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::{PricedSnapshot, StockTarget};

/// One reservation row: a user holding `quantity` units of a product or variant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CartLine {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub snapshot: PricedSnapshot,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewCartLine {
    pub user_id: Uuid,
    pub target: StockTarget,
    pub quantity: i32,
    pub snapshot: PricedSnapshot,
}

/// What a removal does to an existing line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineChange {
    Delete,
    SetQuantity(i32),
}

impl CartLine {
    pub fn target(&self) -> StockTarget {
        StockTarget::new(self.product_id, self.variant_id)
    }

    pub fn line_total(&self) -> Decimal {
        self.snapshot.line_total(self.quantity)
    }

    /// `None` removes the whole line.
    pub fn after_removal(&self, quantity: Option<i32>) -> LineChange {
        match quantity {
            Some(q) if q < self.quantity => LineChange::SetQuantity(self.quantity - q),
            _ => LineChange::Delete,
        }
    }
}

impl NewCartLine {
    pub fn into_line(self) -> CartLine {
        CartLine {
            id: Uuid::now_v7(),
            user_id: self.user_id,
            product_id: self.target.product_id(),
            variant_id: self.target.variant_id(),
            quantity: self.quantity,
            snapshot: self.snapshot,
            created_at: Utc::now(),
        }
    }
}

/// A cart line joined with the live product's display fields.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct CartLineView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub line: CartLine,
    pub title: String,
    pub price: Decimal,
    pub image: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Cart {
    pub lines: Vec<CartLineView>,
    pub subtotal: Decimal,
    pub total_quantity: i64,
}

impl Cart {
    pub fn from_lines(lines: Vec<CartLineView>) -> Self {
        let subtotal = lines.iter().map(|v| v.line.line_total()).sum();
        let total_quantity = lines.iter().map(|v| i64::from(v.line.quantity)).sum();
        Self { lines, subtotal, total_quantity }
    }

    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i32, cents: i64) -> CartLine {
        NewCartLine {
            user_id: Uuid::now_v7(),
            target: StockTarget::new(Uuid::now_v7(), None),
            quantity,
            snapshot: PricedSnapshot {
                unit_price: Decimal::new(cents, 2),
                variant_price: None, variant_image: None, variant_color: None, variant_size: None,
            },
        }
        .into_line()
    }

    #[test]
    fn test_after_removal() {
        let l = line(5, 100);
        assert_eq!(l.after_removal(Some(2)), LineChange::SetQuantity(3));
        assert_eq!(l.after_removal(Some(5)), LineChange::Delete);
        assert_eq!(l.after_removal(Some(9)), LineChange::Delete);
        assert_eq!(l.after_removal(None), LineChange::Delete);
    }

    #[test]
    fn test_cart_totals() {
        let views = vec![
            CartLineView { line: line(2, 1050), title: "A".into(), price: Decimal::new(1050, 2), image: None },
            CartLineView { line: line(3, 199), title: "B".into(), price: Decimal::new(999, 2), image: None },
        ];
        let cart = Cart::from_lines(views);
        assert_eq!(cart.subtotal, Decimal::new(2697, 2));
        assert_eq!(cart.total_quantity, 5);
    }
}
