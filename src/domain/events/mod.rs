//! Domain events
use serde::Serialize;
use uuid::Uuid;

use crate::config::CheckoutMode;
use crate::domain::value_objects::StockTarget;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Cart(CartEvent),
    Inventory(InventoryEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartEvent {
    LineAdded { user_id: Uuid, line_id: Uuid, target: StockTarget, quantity: i32 },
    LineMerged { user_id: Uuid, line_id: Uuid, target: StockTarget, added: i32, quantity: i32 },
    QuantityChanged { user_id: Uuid, line_id: Uuid, quantity: i32 },
    LineRemoved { user_id: Uuid, line_id: Uuid },
    Cleared { user_id: Uuid, lines: usize },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InventoryEvent {
    StockDecremented { target: StockTarget, quantity: i32 },
    DecrementSkipped { target: StockTarget, quantity: i32 },
    CheckoutCompleted { user_id: Uuid, mode: CheckoutMode, lines: usize, fulfilled: usize },
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> String {
        let (aggregate, kind) = match self {
            Self::Cart(e) => ("cart", match e {
                CartEvent::LineAdded { .. } => "line_added",
                CartEvent::LineMerged { .. } => "line_merged",
                CartEvent::QuantityChanged { .. } => "quantity_changed",
                CartEvent::LineRemoved { .. } => "line_removed",
                CartEvent::Cleared { .. } => "cleared",
            }),
            Self::Inventory(e) => ("inventory", match e {
                InventoryEvent::StockDecremented { .. } => "stock_decremented",
                InventoryEvent::DecrementSkipped { .. } => "decrement_skipped",
                InventoryEvent::CheckoutCompleted { .. } => "checkout_completed",
            }),
        };
        format!("storefront.{aggregate}.{kind}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject() {
        let e = DomainEvent::Cart(CartEvent::Cleared { user_id: Uuid::nil(), lines: 2 });
        assert_eq!(e.subject(), "storefront.cart.cleared");
    }

    #[test]
    fn test_serialized_shape() {
        let e = DomainEvent::Inventory(InventoryEvent::StockDecremented {
            target: StockTarget::new(Uuid::nil(), None),
            quantity: 3,
        });
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["aggregate"], "inventory");
        assert_eq!(v["event"]["type"], "stock_decremented");
        assert_eq!(v["event"]["target"]["kind"], "product");
    }
}
