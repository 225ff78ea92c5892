//! Checkout processor.

use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::CheckoutMode;
use crate::domain::events::{CartEvent, DomainEvent, InventoryEvent};
use crate::publisher::EventPublisher;
use crate::store::{CheckoutReceipt, Store};
use crate::{Result, StorefrontError};

#[derive(Clone)]
pub struct CheckoutProcessor {
    store: Arc<dyn Store>,
    publisher: EventPublisher,
    mode: CheckoutMode,
}

impl CheckoutProcessor {
    pub fn new(store: Arc<dyn Store>, publisher: EventPublisher, mode: CheckoutMode) -> Self {
        Self { store, publisher, mode }
    }

    pub async fn checkout(&self, user_id: Uuid) -> Result<CheckoutReceipt> {
        self.checkout_with(user_id, self.mode).await
    }

    /// Decrements stock for every line in the user's cart and empties it.
    #[instrument(name = "checkout::run", skip(self))]
    pub async fn checkout_with(&self, user_id: Uuid, mode: CheckoutMode) -> Result<CheckoutReceipt> {
        let receipt = match self.store.checkout(user_id, mode).await {
            Ok(receipt) => receipt,
            Err(e @ StorefrontError::InsufficientStock { .. }) => {
                warn!(error = %e, "checkout rolled back");
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        if receipt.lines.is_empty() {
            return Err(StorefrontError::Validation("Cart is empty".into()));
        }

        let mut events: Vec<DomainEvent> = receipt
            .lines
            .iter()
            .map(|line| {
                let (target, quantity) = (line.target(), line.quantity);
                DomainEvent::Inventory(if line.applied {
                    InventoryEvent::StockDecremented { target, quantity }
                } else {
                    InventoryEvent::DecrementSkipped { target, quantity }
                })
            })
            .collect();
        events.push(DomainEvent::Cart(CartEvent::Cleared { user_id, lines: receipt.lines.len() }));
        events.push(DomainEvent::Inventory(InventoryEvent::CheckoutCompleted {
            user_id,
            mode,
            lines: receipt.lines.len(),
            fulfilled: receipt.fulfilled(),
        }));
        self.publisher.publish(events).await;

        if receipt.is_complete() {
            info!(lines = receipt.lines.len(), "checkout completed");
        } else {
            warn!(
                lines = receipt.lines.len(),
                fulfilled = receipt.fulfilled(),
                "checkout completed with skipped lines"
            );
        }
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{NewCartLine, NewProduct, NewVariant, Product, ProductPatch};
    use crate::domain::value_objects::StockTarget;
    use crate::services::{AddToCart, CartService, StockLedger};
    use crate::store::{CartStore, CatalogStore, MemoryStore};
    use rust_decimal::Decimal;
    use serde_json::json;

    struct Fixture {
        store: Arc<MemoryStore>,
        cart: CartService,
        checkout: CheckoutProcessor,
        publisher: EventPublisher,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let publisher = EventPublisher::capturing();
        let cart = CartService::new(store.clone(), StockLedger::new(store.clone()), publisher.clone());
        let checkout = CheckoutProcessor::new(store.clone(), publisher.clone(), CheckoutMode::Atomic);
        Fixture { store, cart, checkout, publisher }
    }

    async fn product(store: &MemoryStore, quantity: i32) -> Product {
        store
            .create_product(
                NewProduct {
                    title: "Kettle".into(), description: None, image: None, price: Decimal::new(3000, 2),
                    quantity, category_id: None, metadata: None, variants: vec![],
                },
                json!({}),
            )
            .await
            .unwrap()
    }

    async fn stock(store: &MemoryStore, id: Uuid) -> i32 {
        store.get_product(id).await.unwrap().unwrap().quantity
    }

    /// A product with one "L" variant holding `variant_quantity` units.
    async fn sized_product(store: &MemoryStore, quantity: i32, variant_quantity: i32) -> (Product, Uuid) {
        let p = store
            .create_product(
                NewProduct {
                    title: "Jacket".into(), description: None, image: None, price: Decimal::new(9000, 2),
                    quantity, category_id: None, metadata: None,
                    variants: vec![NewVariant {
                        variant_size: Some("L".into()), variant_color: None, variant_quantity,
                        variant_price: Decimal::new(9500, 2), variant_image: None,
                    }],
                },
                json!({}),
            )
            .await
            .unwrap();
        let variant_id = p.variants[0].variant_id;
        (p, variant_id)
    }

    async fn variant_stock(store: &MemoryStore, id: Uuid, variant_id: Uuid) -> i32 {
        store.get_product(id).await.unwrap().unwrap().variant(variant_id).unwrap().variant_quantity
    }

    /// P1 has 2 in the cart but its stock is cut to 1; P2 has plenty.
    async fn short_cart(f: &Fixture, user: Uuid) -> (Product, Product) {
        let p1 = product(&f.store, 5).await;
        let p2 = product(&f.store, 5).await;
        f.cart.add(user, AddToCart { product_id: p1.id, variant_id: None, quantity: 2 }).await.unwrap();
        f.cart.add(user, AddToCart { product_id: p2.id, variant_id: None, quantity: 3 }).await.unwrap();
        f.store
            .update_product(p1.id, ProductPatch { quantity: Some(1), ..Default::default() })
            .await
            .unwrap();
        (p1, p2)
    }

    #[tokio::test]
    async fn test_checkout_decrements_and_clears() {
        let f = fixture();
        let p = product(&f.store, 5).await;
        let user = Uuid::now_v7();
        f.cart.add(user, AddToCart { product_id: p.id, variant_id: None, quantity: 3 }).await.unwrap();

        let receipt = f.checkout.checkout(user).await.unwrap();
        assert!(receipt.is_complete());
        assert_eq!(stock(&f.store, p.id).await, 2);
        assert!(f.cart.list(user).await.unwrap().is_empty());
        let subjects: Vec<String> = f.publisher.captured().iter().map(|e| e.subject()).collect();
        assert!(subjects.contains(&"storefront.inventory.checkout_completed".to_string()));
    }

    #[tokio::test]
    async fn test_atomic_checkout_names_the_short_line() {
        let f = fixture();
        let user = Uuid::now_v7();
        let (p1, p2) = short_cart(&f, user).await;

        let err = f.checkout.checkout_with(user, CheckoutMode::Atomic).await.unwrap_err();
        assert!(matches!(err, StorefrontError::InsufficientStock { product_id, requested: 2, .. } if product_id == p1.id));
        assert_eq!(stock(&f.store, p1.id).await, 1);
        assert_eq!(stock(&f.store, p2.id).await, 5);
        assert_eq!(f.cart.list(user).await.unwrap().lines.len(), 2);
    }

    #[tokio::test]
    async fn test_best_effort_checkout_skips_short_line() {
        let f = fixture();
        let user = Uuid::now_v7();
        let (p1, p2) = short_cart(&f, user).await;

        let receipt = f.checkout.checkout_with(user, CheckoutMode::BestEffort).await.unwrap();
        assert_eq!(receipt.fulfilled(), 1);
        assert!(!receipt.lines.iter().find(|l| l.product_id == p1.id).unwrap().applied);
        assert_eq!(stock(&f.store, p1.id).await, 1);
        assert_eq!(stock(&f.store, p2.id).await, 2);
        assert!(f.cart.list(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_checkout_decrements_variant_and_base_separately() {
        let f = fixture();
        let (p, variant_id) = sized_product(&f.store, 6, 4).await;
        let user = Uuid::now_v7();
        f.cart.add(user, AddToCart { product_id: p.id, variant_id: None, quantity: 2 }).await.unwrap();
        f.cart.add(user, AddToCart { product_id: p.id, variant_id: Some(variant_id), quantity: 3 }).await.unwrap();

        let receipt = f.checkout.checkout(user).await.unwrap();
        assert!(receipt.is_complete());
        assert_eq!(stock(&f.store, p.id).await, 4);
        assert_eq!(variant_stock(&f.store, p.id, variant_id).await, 1);
        assert!(f.cart.list(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_atomic_checkout_rolls_back_on_short_variant() {
        let f = fixture();
        let (p, variant_id) = sized_product(&f.store, 6, 2).await;
        let user = Uuid::now_v7();
        f.cart.add(user, AddToCart { product_id: p.id, variant_id: None, quantity: 1 }).await.unwrap();
        // a line larger than the variant stock, as left behind by a lost add race
        let target = StockTarget::new(p.id, Some(variant_id));
        let short = f.store
            .merge_line(NewCartLine { user_id: user, target, quantity: 3, snapshot: p.snapshot_for(target).unwrap() })
            .await
            .unwrap();

        let err = f.checkout.checkout_with(user, CheckoutMode::Atomic).await.unwrap_err();
        assert!(matches!(err, StorefrontError::InsufficientStock { line_id, .. } if line_id == short.id));
        assert_eq!(stock(&f.store, p.id).await, 6);
        assert_eq!(variant_stock(&f.store, p.id, variant_id).await, 2);
        assert_eq!(f.cart.list(user).await.unwrap().lines.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected() {
        let f = fixture();
        let err = f.checkout.checkout(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, StorefrontError::Validation(ref m) if m == "Cart is empty"));
    }
}
