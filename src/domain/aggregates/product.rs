//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::domain::value_objects::{PricedSnapshot, StockTarget};

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
    pub category_id: Option<Uuid>,
    /// Category-dependent attributes (author, brand, model, ...).
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(default)]
    pub variants: Vec<ProductVariant>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductVariant {
    pub variant_id: Uuid,
    pub product_id: Uuid,
    pub variant_size: Option<String>,
    pub variant_color: Option<String>,
    pub variant_quantity: i32,
    pub variant_price: Decimal,
    pub variant_image: Option<String>,
}

impl Product {
    pub fn variant(&self, variant_id: Uuid) -> Option<&ProductVariant> {
        self.variants.iter().find(|v| v.variant_id == variant_id)
    }

    /// `None` when the target names a variant this product does not have.
    pub fn stock_on_hand(&self, target: StockTarget) -> Option<i32> {
        match target.variant_id() {
            None => Some(self.quantity),
            Some(id) => self.variant(id).map(|v| v.variant_quantity),
        }
    }

    pub fn snapshot_for(&self, target: StockTarget) -> Option<PricedSnapshot> {
        match target.variant_id() {
            None => Some(PricedSnapshot::of_product(self)),
            Some(id) => self.variant(id).map(PricedSnapshot::of_variant),
        }
    }

    pub fn apply(&mut self, patch: &ProductPatch) {
        if let Some(title) = &patch.title { self.title = title.clone(); }
        if let Some(description) = &patch.description { self.description = Some(description.clone()); }
        if let Some(image) = &patch.image { self.image = Some(image.clone()); }
        if let Some(price) = patch.price { self.price = price; }
        if let Some(quantity) = patch.quantity { self.quantity = quantity; }
        if let Some(category_id) = patch.category_id { self.category_id = Some(category_id); }
        if let Some(metadata) = &patch.metadata { self.metadata = metadata.clone(); }
        self.updated_at = Utc::now();
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct NewProduct {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
    pub image: Option<String>,
    #[validate(custom = "non_negative")]
    pub price: Decimal,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub quantity: i32,
    pub category_id: Option<Uuid>,
    #[validate(custom = "json_object")]
    pub metadata: Option<Value>,
    #[validate]
    #[serde(default)]
    pub variants: Vec<NewVariant>,
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct ProductPatch {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    #[validate(custom = "non_negative")]
    pub price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub quantity: Option<i32>,
    pub category_id: Option<Uuid>,
    #[validate(custom = "json_object")]
    pub metadata: Option<Value>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.image.is_none()
            && self.price.is_none()
            && self.quantity.is_none()
            && self.category_id.is_none()
            && self.metadata.is_none()
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct NewVariant {
    pub variant_size: Option<String>,
    pub variant_color: Option<String>,
    #[validate(range(min = 0))]
    pub variant_quantity: i32,
    #[validate(custom = "non_negative")]
    pub variant_price: Decimal,
    pub variant_image: Option<String>,
}

impl NewVariant {
    pub fn into_variant(self, product_id: Uuid) -> ProductVariant {
        ProductVariant {
            variant_id: Uuid::now_v7(),
            product_id,
            variant_size: self.variant_size,
            variant_color: self.variant_color,
            variant_quantity: self.variant_quantity,
            variant_price: self.variant_price,
            variant_image: self.variant_image,
        }
    }
}

/// Category defaults first, then supplied keys on top.
pub fn merge_metadata(defaults: Option<&Value>, supplied: Option<&Value>) -> Value {
    let mut merged = Map::new();
    for source in [defaults, supplied].into_iter().flatten() {
        if let Value::Object(map) = source {
            merged.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }
    Value::Object(merged)
}

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("negative_price"));
    }
    Ok(())
}

fn json_object(value: &Value) -> Result<(), ValidationError> {
    if !value.is_object() {
        return Err(ValidationError::new("metadata_not_object"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product() -> Product {
        let id = Uuid::now_v7();
        Product {
            id, title: "Shirt".into(), description: None, image: None,
            price: Decimal::new(2000, 2), quantity: 4, category_id: None,
            metadata: json!({}), created_at: Utc::now(), updated_at: Utc::now(),
            variants: vec![ProductVariant {
                variant_id: Uuid::now_v7(), product_id: id, variant_size: Some("M".into()),
                variant_color: Some("red".into()), variant_quantity: 7,
                variant_price: Decimal::new(2500, 2), variant_image: None,
            }],
        }
    }

    #[test]
    fn test_stock_on_hand() {
        let p = product();
        let v = p.variants[0].variant_id;
        assert_eq!(p.stock_on_hand(StockTarget::new(p.id, None)), Some(4));
        assert_eq!(p.stock_on_hand(StockTarget::new(p.id, Some(v))), Some(7));
        assert_eq!(p.stock_on_hand(StockTarget::new(p.id, Some(Uuid::now_v7()))), None);
    }

    #[test]
    fn test_variant_snapshot_uses_variant_price() {
        let p = product();
        let snap = p.snapshot_for(StockTarget::new(p.id, Some(p.variants[0].variant_id))).unwrap();
        assert_eq!(snap.unit_price, Decimal::new(2500, 2));
        assert_eq!(snap.variant_color.as_deref(), Some("red"));
    }

    #[test]
    fn test_merge_metadata_overrides_defaults() {
        let merged = merge_metadata(
            Some(&json!({"author": "", "pages": 0})),
            Some(&json!({"author": "Le Guin"})),
        );
        assert_eq!(merged, json!({"author": "Le Guin", "pages": 0}));
    }

    #[test]
    fn test_new_product_validation() {
        let bad: NewProduct = serde_json::from_value(json!({
            "title": "", "price": "-1", "quantity": -2, "metadata": [1]
        })).unwrap();
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        for f in ["title", "price", "quantity", "metadata"] {
            assert!(fields.contains_key(f), "missing error for {f}");
        }
    }

    #[test]
    fn test_empty_patch() {
        assert!(ProductPatch::default().is_empty());
        let patch = ProductPatch { quantity: Some(3), ..Default::default() };
        assert!(!patch.is_empty());
    }
}
