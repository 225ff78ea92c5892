//! Stock ledger reads.

use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::aggregates::Product;
use crate::domain::value_objects::{StockLevel, StockTarget};
use crate::store::Store;
use crate::{Result, StorefrontError};

/// Remaining purchasable quantity: on-hand stock minus what every cart holds
/// of exactly that product or variant.
#[derive(Clone)]
pub struct StockLedger {
    store: Arc<dyn Store>,
}

impl StockLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    #[instrument(name = "stock_ledger::level", skip(self, target), fields(stock = %target))]
    pub async fn level(&self, target: StockTarget) -> Result<StockLevel> {
        let product = self
            .store
            .get_product(target.product_id())
            .await?
            .ok_or_else(|| StorefrontError::not_found("Product", target.product_id()))?;
        self.level_for(&product, target).await
    }

    /// Same as [`level`](Self::level) for a product the caller already loaded.
    pub async fn level_for(&self, product: &Product, target: StockTarget) -> Result<StockLevel> {
        let on_hand = product.stock_on_hand(target).ok_or_else(|| {
            StorefrontError::not_found("Variant", target.variant_id().unwrap_or_default())
        })?;
        let reserved = self.store.reserved_quantity(target).await?;
        Ok(StockLevel::new(on_hand, reserved))
    }

    /// Signed; negative when stock was cut below what carts already hold.
    pub async fn available(&self, product_id: Uuid, variant_id: Option<Uuid>) -> Result<i64> {
        Ok(self.level(StockTarget::new(product_id, variant_id)).await?.available())
    }
}
