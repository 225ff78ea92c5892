//! In-process store.
//!
//! One mutex guards the whole state, so every method is atomic with respect to
//! every other. The guard is never held across an await.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

use super::{CartStore, CatalogStore, CheckoutReceipt, LineOutcome, UserStore};
use crate::config::CheckoutMode;
use crate::domain::aggregates::{
    CartLine, CartLineView, Category, CategoryUpdate, NewCartLine, NewCategory, NewProduct,
    NewUser, NewVariant, Product, ProductPatch, ProductVariant, User,
};
use crate::domain::value_objects::StockTarget;
use crate::{Result, StorefrontError};

#[derive(Debug, Default)]
struct Inner {
    products: Vec<Product>,
    categories: Vec<Category>,
    lines: Vec<CartLine>,
    users: Vec<User>,
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Conditional decrement: only applies when the counter covers `quantity`.
fn decrement(products: &mut [Product], target: StockTarget, quantity: i32) -> bool {
    let counter = products
        .iter_mut()
        .find(|p| p.id == target.product_id())
        .and_then(|p| match target.variant_id() {
            None => Some(&mut p.quantity),
            Some(id) => p
                .variants
                .iter_mut()
                .find(|v| v.variant_id == id)
                .map(|v| &mut v.variant_quantity),
        });
    match counter {
        Some(stock) if *stock >= quantity => {
            *stock -= quantity;
            true
        }
        _ => false,
    }
}

fn holds(line: &CartLine, target: StockTarget) -> bool {
    line.product_id == target.product_id() && line.variant_id == target.variant_id()
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_products(&self, category_id: Option<Uuid>) -> Result<Vec<Product>> {
        let inner = self.inner.lock();
        Ok(inner
            .products
            .iter()
            .filter(|p| category_id.is_none() || p.category_id == category_id)
            .cloned()
            .collect())
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.inner.lock().products.iter().find(|p| p.id == id).cloned())
    }

    async fn create_product(&self, new: NewProduct, metadata: serde_json::Value) -> Result<Product> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let product = Product {
            id,
            title: new.title,
            description: new.description,
            image: new.image,
            price: new.price,
            quantity: new.quantity,
            category_id: new.category_id,
            metadata,
            created_at: now,
            updated_at: now,
            variants: new.variants.into_iter().map(|v| v.into_variant(id)).collect(),
        };
        self.inner.lock().products.push(product.clone());
        Ok(product)
    }

    async fn update_product(&self, id: Uuid, patch: ProductPatch) -> Result<Option<Product>> {
        let mut inner = self.inner.lock();
        Ok(inner.products.iter_mut().find(|p| p.id == id).map(|p| {
            p.apply(&patch);
            p.clone()
        }))
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock();
        let before = inner.products.len();
        inner.products.retain(|p| p.id != id);
        inner.lines.retain(|l| l.product_id != id);
        Ok(inner.products.len() < before)
    }

    async fn add_variant(&self, product_id: Uuid, variant: NewVariant) -> Result<Option<ProductVariant>> {
        let mut inner = self.inner.lock();
        Ok(inner.products.iter_mut().find(|p| p.id == product_id).map(|p| {
            let variant = variant.into_variant(product_id);
            p.variants.push(variant.clone());
            variant
        }))
    }

    async fn delete_variant(&self, product_id: Uuid, variant_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock();
        let Some(product) = inner.products.iter_mut().find(|p| p.id == product_id) else {
            return Ok(false);
        };
        let before = product.variants.len();
        product.variants.retain(|v| v.variant_id != variant_id);
        let removed = product.variants.len() < before;
        if removed {
            inner.lines.retain(|l| l.variant_id != Some(variant_id));
        }
        Ok(removed)
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self.inner.lock().categories.clone())
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>> {
        Ok(self.inner.lock().categories.iter().find(|c| c.id == id).cloned())
    }

    async fn create_category(&self, new: NewCategory) -> Result<Category> {
        let category = Category {
            id: Uuid::now_v7(),
            name: new.name,
            parent_id: new.parent_id,
            default_metadata: new.default_metadata.unwrap_or_else(|| serde_json::json!({})),
            created_at: Utc::now(),
        };
        self.inner.lock().categories.push(category.clone());
        Ok(category)
    }

    async fn update_category(&self, id: Uuid, update: CategoryUpdate) -> Result<Option<Category>> {
        let mut inner = self.inner.lock();
        Ok(inner.categories.iter_mut().find(|c| c.id == id).map(|c| {
            c.name = update.name;
            c.parent_id = update.parent_id;
            if let Some(metadata) = update.default_metadata {
                c.default_metadata = metadata;
            }
            c.clone()
        }))
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock();
        let before = inner.categories.len();
        inner.categories.retain(|c| c.id != id);
        if inner.categories.len() == before {
            return Ok(false);
        }
        for child in inner.categories.iter_mut().filter(|c| c.parent_id == Some(id)) {
            child.parent_id = None;
        }
        for product in inner.products.iter_mut().filter(|p| p.category_id == Some(id)) {
            product.category_id = None;
        }
        Ok(true)
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn reserved_quantity(&self, target: StockTarget) -> Result<i64> {
        let inner = self.inner.lock();
        Ok(inner
            .lines
            .iter()
            .filter(|l| holds(l, target))
            .map(|l| i64::from(l.quantity))
            .sum())
    }

    async fn find_line(&self, user_id: Uuid, target: StockTarget) -> Result<Option<CartLine>> {
        let inner = self.inner.lock();
        Ok(inner.lines.iter().find(|l| l.user_id == user_id && holds(l, target)).cloned())
    }

    async fn get_line(&self, user_id: Uuid, line_id: Uuid) -> Result<Option<CartLine>> {
        let inner = self.inner.lock();
        Ok(inner.lines.iter().find(|l| l.user_id == user_id && l.id == line_id).cloned())
    }

    async fn merge_line(&self, new: NewCartLine) -> Result<CartLine> {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner
            .lines
            .iter_mut()
            .find(|l| l.user_id == new.user_id && holds(l, new.target))
        {
            existing.quantity += new.quantity;
            return Ok(existing.clone());
        }
        let line = new.into_line();
        inner.lines.push(line.clone());
        Ok(line)
    }

    async fn set_line_quantity(&self, user_id: Uuid, line_id: Uuid, quantity: i32) -> Result<Option<CartLine>> {
        let mut inner = self.inner.lock();
        Ok(inner
            .lines
            .iter_mut()
            .find(|l| l.user_id == user_id && l.id == line_id)
            .map(|l| {
                l.quantity = quantity;
                l.clone()
            }))
    }

    async fn delete_line(&self, user_id: Uuid, line_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock();
        let before = inner.lines.len();
        inner.lines.retain(|l| !(l.user_id == user_id && l.id == line_id));
        Ok(inner.lines.len() < before)
    }

    async fn list_lines(&self, user_id: Uuid) -> Result<Vec<CartLineView>> {
        let inner = self.inner.lock();
        Ok(inner
            .lines
            .iter()
            .filter(|l| l.user_id == user_id)
            .filter_map(|l| {
                let product = inner.products.iter().find(|p| p.id == l.product_id)?;
                Some(CartLineView {
                    line: l.clone(),
                    title: product.title.clone(),
                    price: product.price,
                    image: product.image.clone(),
                })
            })
            .collect())
    }

    async fn checkout(&self, user_id: Uuid, mode: CheckoutMode) -> Result<CheckoutReceipt> {
        let mut inner = self.inner.lock();
        let lines: Vec<CartLine> = inner.lines.iter().filter(|l| l.user_id == user_id).cloned().collect();

        // Decrement a scratch copy; it replaces the live catalog only on success.
        let mut products = inner.products.clone();
        let mut outcomes = Vec::with_capacity(lines.len());
        for line in &lines {
            let applied = decrement(&mut products, line.target(), line.quantity);
            if !applied && mode == CheckoutMode::Atomic {
                return Err(StorefrontError::InsufficientStock {
                    line_id: line.id,
                    product_id: line.product_id,
                    variant_id: line.variant_id,
                    requested: line.quantity,
                });
            }
            outcomes.push(LineOutcome::new(line, applied));
        }

        inner.products = products;
        inner.lines.retain(|l| l.user_id != user_id);
        Ok(CheckoutReceipt::new(user_id, mode, outcomes))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, new: NewUser) -> Result<Option<User>> {
        let mut inner = self.inner.lock();
        if inner.users.iter().any(|u| u.username == new.username) {
            return Ok(None);
        }
        let user = new.into_user();
        inner.users.push(user.clone());
        Ok(Some(user))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self.inner.lock().users.iter().find(|u| u.username == username).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn new_product(quantity: i32) -> NewProduct {
        NewProduct {
            title: "Mug".into(), description: None, image: None, price: Decimal::new(800, 2),
            quantity, category_id: None, metadata: None, variants: vec![],
        }
    }

    #[tokio::test]
    async fn test_atomic_checkout_leaves_state_untouched_on_shortfall() {
        let store = MemoryStore::new();
        let plenty = store.create_product(new_product(10), json!({})).await.unwrap();
        let scarce = store.create_product(new_product(1), json!({})).await.unwrap();
        let user = Uuid::now_v7();
        for (p, q) in [(&plenty, 2), (&scarce, 1)] {
            store.merge_line(NewCartLine {
                user_id: user,
                target: StockTarget::new(p.id, None),
                quantity: q,
                snapshot: crate::PricedSnapshot::of_product(p),
            }).await.unwrap();
        }
        // stock drops below what the cart holds
        store.update_product(scarce.id, ProductPatch { quantity: Some(0), ..Default::default() }).await.unwrap();

        let err = store.checkout(user, CheckoutMode::Atomic).await.unwrap_err();
        assert!(matches!(err, StorefrontError::InsufficientStock { product_id, .. } if product_id == scarce.id));
        assert_eq!(store.get_product(plenty.id).await.unwrap().unwrap().quantity, 10);
        assert_eq!(store.list_lines(user).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_product_drops_cart_lines() {
        let store = MemoryStore::new();
        let p = store.create_product(new_product(3), json!({})).await.unwrap();
        let user = Uuid::now_v7();
        store.merge_line(NewCartLine {
            user_id: user, target: StockTarget::new(p.id, None), quantity: 1,
            snapshot: crate::PricedSnapshot::of_product(&p),
        }).await.unwrap();
        assert!(store.delete_product(p.id).await.unwrap());
        assert_eq!(store.reserved_quantity(StockTarget::new(p.id, None)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_variant_of_other_product_keeps_lines() {
        let store = MemoryStore::new();
        let a = store.create_product(new_product(3), json!({})).await.unwrap();
        let mut with_variant = new_product(3);
        with_variant.variants = vec![NewVariant {
            variant_size: Some("L".into()), variant_color: None, variant_quantity: 4,
            variant_price: Decimal::new(900, 2), variant_image: None,
        }];
        let b = store.create_product(with_variant, json!({})).await.unwrap();
        let target = StockTarget::new(b.id, Some(b.variants[0].variant_id));
        store.merge_line(NewCartLine {
            user_id: Uuid::now_v7(), target, quantity: 2,
            snapshot: crate::PricedSnapshot::of_product(&b),
        }).await.unwrap();

        assert!(!store.delete_variant(a.id, b.variants[0].variant_id).await.unwrap());
        assert_eq!(store.reserved_quantity(target).await.unwrap(), 2);

        assert!(store.delete_variant(b.id, b.variants[0].variant_id).await.unwrap());
        assert_eq!(store.reserved_quantity(target).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let store = MemoryStore::new();
        let new = || NewUser { username: "sam".into(), email: "s@example.com".into(), password_hash: "x".into(), role: Default::default() };
        assert!(store.create_user(new()).await.unwrap().is_some());
        assert!(store.create_user(new()).await.unwrap().is_none());
    }
}
