//! Value Objects for the storefront

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::aggregates::{Product, ProductVariant};
use crate::{Result, StorefrontError};

/// The stock counter a cart line draws from: the base product, or one variant of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StockTarget {
    Product { product_id: Uuid },
    Variant { product_id: Uuid, variant_id: Uuid },
}

impl StockTarget {
    pub fn new(product_id: Uuid, variant_id: Option<Uuid>) -> Self {
        match variant_id {
            Some(variant_id) => Self::Variant { product_id, variant_id },
            None => Self::Product { product_id },
        }
    }

    pub fn product_id(&self) -> Uuid {
        match *self {
            Self::Product { product_id } | Self::Variant { product_id, .. } => product_id,
        }
    }

    pub fn variant_id(&self) -> Option<Uuid> {
        match *self {
            Self::Product { .. } => None,
            Self::Variant { variant_id, .. } => Some(variant_id),
        }
    }
}

impl fmt::Display for StockTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Product { product_id } => write!(f, "product {product_id}"),
            Self::Variant { product_id, variant_id } => {
                write!(f, "product {product_id} variant {variant_id}")
            }
        }
    }
}

/// On-hand stock of one counter against the quantity currently held in carts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StockLevel {
    pub on_hand: i32,
    pub reserved: i64,
}

impl StockLevel {
    pub fn new(on_hand: i32, reserved: i64) -> Self {
        Self { on_hand, reserved }
    }

    /// May be negative when stock was lowered below what carts already hold.
    pub fn available(&self) -> i64 {
        i64::from(self.on_hand) - self.reserved
    }

    /// Rejects `requested` units when they exceed what is left. `in_cart` is what
    /// the requesting user already holds and is only reported back.
    pub fn ensure_can_add(&self, requested: i32, in_cart: i64) -> Result<()> {
        let available = self.available();
        if i64::from(requested) > available {
            return Err(StorefrontError::QuantityExceeded {
                requested,
                available: available.max(0),
                in_cart,
            });
        }
        Ok(())
    }
}

/// Price and display attributes frozen into a cart line when it is first added.
///
/// Later catalog edits do not reach lines that already exist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PricedSnapshot {
    pub unit_price: Decimal,
    pub variant_price: Option<Decimal>,
    pub variant_image: Option<String>,
    pub variant_color: Option<String>,
    pub variant_size: Option<String>,
}

impl PricedSnapshot {
    pub fn of_product(product: &Product) -> Self {
        Self {
            unit_price: product.price,
            variant_price: None,
            variant_image: None,
            variant_color: None,
            variant_size: None,
        }
    }

    pub fn of_variant(variant: &ProductVariant) -> Self {
        Self {
            unit_price: variant.variant_price,
            variant_price: Some(variant.variant_price),
            variant_image: variant.variant_image.clone(),
            variant_color: variant.variant_color.clone(),
            variant_size: variant.variant_size.clone(),
        }
    }

    pub fn line_total(&self, quantity: i32) -> Decimal {
        self.unit_price * Decimal::from(quantity)
    }
}
