//! Cart line manager.

use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use super::StockLedger;
use crate::domain::aggregates::{Cart, CartLine, LineChange, NewCartLine};
use crate::domain::events::{CartEvent, DomainEvent};
use crate::domain::value_objects::{StockLevel, StockTarget};
use crate::publisher::EventPublisher;
use crate::store::Store;
use crate::{Result, StorefrontError};

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AddToCart {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct SetQuantity {
    /// Zero removes the line.
    #[validate(range(min = 0))]
    pub quantity: i32,
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct RemoveFromCart {
    /// Absent removes the whole line.
    #[validate(range(min = 1))]
    pub quantity: Option<i32>,
}

#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn Store>,
    ledger: StockLedger,
    publisher: EventPublisher,
}

impl CartService {
    pub fn new(store: Arc<dyn Store>, ledger: StockLedger, publisher: EventPublisher) -> Self {
        Self { store, ledger, publisher }
    }

    /// Adds to the user's line for the item, creating it if needed.
    ///
    /// Availability is read and then written without a lock; two users racing for
    /// the last units can both succeed, and checkout's conditional decrement is
    /// what keeps stock from going negative.
    #[instrument(name = "cart::add", skip(self, request), fields(product_id = %request.product_id, variant_id = ?request.variant_id, quantity = request.quantity))]
    pub async fn add(&self, user_id: Uuid, request: AddToCart) -> Result<CartLine> {
        request.validate()?;
        let product = self
            .store
            .get_product(request.product_id)
            .await?
            .ok_or_else(|| StorefrontError::not_found("Product", request.product_id))?;
        let target = StockTarget::new(product.id, request.variant_id);
        let level = self.ledger.level_for(&product, target).await?;

        let existing = self.store.find_line(user_id, target).await?;
        let in_cart = existing.as_ref().map_or(0, |l| i64::from(l.quantity));
        if let Err(e) = level.ensure_can_add(request.quantity, in_cart) {
            warn!(available = level.available(), in_cart, "add rejected: not enough stock");
            return Err(e);
        }

        let snapshot = product
            .snapshot_for(target)
            .ok_or_else(|| StorefrontError::not_found("Variant", request.variant_id.unwrap_or_default()))?;
        let line = self
            .store
            .merge_line(NewCartLine { user_id, target, quantity: request.quantity, snapshot })
            .await?;

        let event = match existing {
            Some(_) => CartEvent::LineMerged {
                user_id,
                line_id: line.id,
                target,
                added: request.quantity,
                quantity: line.quantity,
            },
            None => CartEvent::LineAdded { user_id, line_id: line.id, target, quantity: line.quantity },
        };
        self.publisher.publish(vec![DomainEvent::Cart(event)]).await;
        info!(line_id = %line.id, line_quantity = line.quantity, "item added to cart");
        Ok(line)
    }

    /// Overwrites a line's quantity. The new quantity is checked against what is
    /// available plus what this line already holds. `None` means the line was removed.
    #[instrument(name = "cart::update_quantity", skip(self))]
    pub async fn update_quantity(&self, user_id: Uuid, line_id: Uuid, quantity: i32) -> Result<Option<CartLine>> {
        SetQuantity { quantity }.validate()?;
        let line = self.line(user_id, line_id).await?;
        if quantity == 0 {
            self.delete(user_id, line_id).await?;
            return Ok(None);
        }

        let product = self
            .store
            .get_product(line.product_id)
            .await?
            .ok_or_else(|| StorefrontError::not_found("Product", line.product_id))?;
        let level = self.ledger.level_for(&product, line.target()).await?;
        let others = StockLevel::new(level.on_hand, level.reserved - i64::from(line.quantity));
        if let Err(e) = others.ensure_can_add(quantity, i64::from(line.quantity)) {
            warn!(available = others.available(), "quantity update rejected: not enough stock");
            return Err(e);
        }

        let updated = self
            .store
            .set_line_quantity(user_id, line_id, quantity)
            .await?
            .ok_or_else(|| StorefrontError::not_found("Cart item", line_id))?;
        self.publisher
            .publish(vec![DomainEvent::Cart(CartEvent::QuantityChanged { user_id, line_id, quantity })])
            .await;
        Ok(Some(updated))
    }

    /// Removes `quantity` units, or the whole line when it is absent or covers
    /// everything. `None` means the line is gone.
    #[instrument(name = "cart::remove", skip(self))]
    pub async fn remove(&self, user_id: Uuid, line_id: Uuid, quantity: Option<i32>) -> Result<Option<CartLine>> {
        RemoveFromCart { quantity }.validate()?;
        let line = self.line(user_id, line_id).await?;
        match line.after_removal(quantity) {
            LineChange::Delete => {
                self.delete(user_id, line_id).await?;
                Ok(None)
            }
            LineChange::SetQuantity(remaining) => {
                let updated = self
                    .store
                    .set_line_quantity(user_id, line_id, remaining)
                    .await?
                    .ok_or_else(|| StorefrontError::not_found("Cart item", line_id))?;
                self.publisher
                    .publish(vec![DomainEvent::Cart(CartEvent::QuantityChanged {
                        user_id,
                        line_id,
                        quantity: remaining,
                    })])
                    .await;
                Ok(Some(updated))
            }
        }
    }

    #[instrument(name = "cart::list", skip(self))]
    pub async fn list(&self, user_id: Uuid) -> Result<Cart> {
        Ok(Cart::from_lines(self.store.list_lines(user_id).await?))
    }

    async fn line(&self, user_id: Uuid, line_id: Uuid) -> Result<CartLine> {
        self.store
            .get_line(user_id, line_id)
            .await?
            .ok_or_else(|| StorefrontError::not_found("Cart item", line_id))
    }

    async fn delete(&self, user_id: Uuid, line_id: Uuid) -> Result<()> {
        if !self.store.delete_line(user_id, line_id).await? {
            return Err(StorefrontError::not_found("Cart item", line_id));
        }
        self.publisher
            .publish(vec![DomainEvent::Cart(CartEvent::LineRemoved { user_id, line_id })])
            .await;
        Ok(())
    }
}
