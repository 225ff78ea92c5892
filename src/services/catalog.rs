//! Catalog administration and browsing.

use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::product::merge_metadata;
use crate::domain::aggregates::{
    Category, CategoryTree, CategoryUpdate, NestedCategory, NewCategory, NewProduct, NewVariant,
    Product, ProductPatch, ProductVariant,
};
use crate::store::Store;
use crate::{Result, StorefrontError};

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list_products(&self, category_id: Option<Uuid>) -> Result<Vec<Product>> {
        self.store.list_products(category_id).await
    }

    pub async fn get_product(&self, id: Uuid) -> Result<Product> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| StorefrontError::not_found("Product", id))
    }

    /// The category's default metadata is the base; supplied keys win.
    #[instrument(name = "catalog::create_product", skip(self, product), fields(title = %product.title))]
    pub async fn create_product(&self, product: NewProduct) -> Result<Product> {
        product.validate()?;
        let defaults = match product.category_id {
            Some(id) => Some(self.category(id).await?.default_metadata),
            None => None,
        };
        let metadata = merge_metadata(defaults.as_ref(), product.metadata.as_ref());
        let created = self.store.create_product(product, metadata).await?;
        info!(product_id = %created.id, "product created");
        Ok(created)
    }

    #[instrument(name = "catalog::update_product", skip(self, patch))]
    pub async fn update_product(&self, id: Uuid, patch: ProductPatch) -> Result<Product> {
        patch.validate()?;
        if patch.is_empty() {
            return Err(StorefrontError::Validation("No updates were recorded".into()));
        }
        if let Some(category_id) = patch.category_id {
            self.category(category_id).await?;
        }
        self.store
            .update_product(id, patch)
            .await?
            .ok_or_else(|| StorefrontError::not_found("Product", id))
    }

    #[instrument(name = "catalog::delete_product", skip(self))]
    pub async fn delete_product(&self, id: Uuid) -> Result<()> {
        if !self.store.delete_product(id).await? {
            return Err(StorefrontError::not_found("Product", id));
        }
        info!("product deleted");
        Ok(())
    }

    #[instrument(name = "catalog::add_variant", skip(self, variant))]
    pub async fn add_variant(&self, product_id: Uuid, variant: NewVariant) -> Result<ProductVariant> {
        variant.validate()?;
        self.store
            .add_variant(product_id, variant)
            .await?
            .ok_or_else(|| StorefrontError::not_found("Product", product_id))
    }

    #[instrument(name = "catalog::delete_variant", skip(self))]
    pub async fn delete_variant(&self, product_id: Uuid, variant_id: Uuid) -> Result<()> {
        if !self.store.delete_variant(product_id, variant_id).await? {
            return Err(StorefrontError::not_found("Variant", variant_id));
        }
        Ok(())
    }

    pub async fn category_tree(&self) -> Result<Vec<NestedCategory>> {
        Ok(CategoryTree::build(self.store.list_categories().await?).nested())
    }

    #[instrument(name = "catalog::create_category", skip(self, category), fields(name = %category.name))]
    pub async fn create_category(&self, category: NewCategory) -> Result<Category> {
        category.validate()?;
        ensure_object(category.default_metadata.as_ref())?;
        if let Some(parent_id) = category.parent_id {
            self.category(parent_id).await?;
        }
        self.store.create_category(category).await
    }

    /// Rejects a parent that is the category itself or sits below it.
    #[instrument(name = "catalog::update_category", skip(self, update))]
    pub async fn update_category(&self, id: Uuid, update: CategoryUpdate) -> Result<Category> {
        update.validate()?;
        ensure_object(update.default_metadata.as_ref())?;
        if let Some(parent_id) = update.parent_id {
            let tree = CategoryTree::build(self.store.list_categories().await?);
            if tree.get(id).is_none() {
                return Err(StorefrontError::not_found("Category", id));
            }
            if tree.get(parent_id).is_none() {
                return Err(StorefrontError::not_found("Category", parent_id));
            }
            if tree.would_cycle(id, parent_id) {
                warn!(%parent_id, "category re-parent would create a cycle");
                return Err(StorefrontError::Validation(
                    "A category cannot be moved under itself or one of its subcategories".into(),
                ));
            }
        }
        self.store
            .update_category(id, update)
            .await?
            .ok_or_else(|| StorefrontError::not_found("Category", id))
    }

    #[instrument(name = "catalog::delete_category", skip(self))]
    pub async fn delete_category(&self, id: Uuid) -> Result<()> {
        if !self.store.delete_category(id).await? {
            return Err(StorefrontError::not_found("Category", id));
        }
        Ok(())
    }

    async fn category(&self, id: Uuid) -> Result<Category> {
        self.store
            .get_category(id)
            .await?
            .ok_or_else(|| StorefrontError::not_found("Category", id))
    }
}

fn ensure_object(metadata: Option<&serde_json::Value>) -> Result<()> {
    match metadata {
        Some(value) if !value.is_object() => {
            Err(StorefrontError::Validation("default_metadata must be a JSON object".into()))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn service() -> CatalogService {
        CatalogService::new(Arc::new(MemoryStore::new()))
    }

    fn new_category(name: &str, parent_id: Option<Uuid>) -> NewCategory {
        NewCategory { name: name.into(), parent_id, default_metadata: None }
    }

    fn new_product(category_id: Option<Uuid>, metadata: Option<serde_json::Value>) -> NewProduct {
        NewProduct {
            title: "Dune".into(), description: None, image: None, price: Decimal::new(1200, 2),
            quantity: 3, category_id, metadata, variants: vec![],
        }
    }

    #[tokio::test]
    async fn test_product_inherits_category_metadata() {
        let catalog = service();
        let books = catalog
            .create_category(NewCategory {
                name: "Books".into(),
                parent_id: None,
                default_metadata: Some(json!({"author": "", "isbn": ""})),
            })
            .await
            .unwrap();
        let p = catalog
            .create_product(new_product(Some(books.id), Some(json!({"author": "Herbert"}))))
            .await
            .unwrap();
        assert_eq!(p.metadata, json!({"author": "Herbert", "isbn": ""}));
    }

    #[tokio::test]
    async fn test_unknown_category_is_rejected() {
        let catalog = service();
        let err = catalog.create_product(new_product(Some(Uuid::now_v7()), None)).await.unwrap_err();
        assert!(matches!(err, StorefrontError::NotFound { entity: "Category", .. }));
    }

    #[tokio::test]
    async fn test_empty_patch_records_nothing() {
        let catalog = service();
        let p = catalog.create_product(new_product(None, None)).await.unwrap();
        let err = catalog.update_product(p.id, ProductPatch::default()).await.unwrap_err();
        assert!(matches!(err, StorefrontError::Validation(ref m) if m == "No updates were recorded"));
    }

    #[tokio::test]
    async fn test_reparent_under_descendant_is_rejected() {
        let catalog = service();
        let root = catalog.create_category(new_category("Root", None)).await.unwrap();
        let child = catalog.create_category(new_category("Child", Some(root.id))).await.unwrap();
        let update = CategoryUpdate { name: "Root".into(), parent_id: Some(child.id), default_metadata: None };
        let err = catalog.update_category(root.id, update).await.unwrap_err();
        assert!(matches!(err, StorefrontError::Validation(_)));

        let moved = catalog
            .update_category(child.id, CategoryUpdate { name: "Child".into(), parent_id: None, default_metadata: None })
            .await
            .unwrap();
        assert_eq!(moved.parent_id, None);
        assert_eq!(catalog.category_tree().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_category_promotes_children() {
        let catalog = service();
        let root = catalog.create_category(new_category("Root", None)).await.unwrap();
        let child = catalog.create_category(new_category("Child", Some(root.id))).await.unwrap();
        let p = catalog.create_product(new_product(Some(root.id), None)).await.unwrap();

        catalog.delete_category(root.id).await.unwrap();
        let tree = catalog.category_tree().await.unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].category.id, child.id);
        assert_eq!(catalog.get_product(p.id).await.unwrap().category_id, None);
    }

    #[tokio::test]
    async fn test_variant_lifecycle() {
        let catalog = service();
        let p = catalog.create_product(new_product(None, None)).await.unwrap();
        let v = catalog
            .add_variant(p.id, NewVariant {
                variant_size: Some("XL".into()), variant_color: None, variant_quantity: 2,
                variant_price: Decimal::new(1300, 2), variant_image: None,
            })
            .await
            .unwrap();
        assert_eq!(catalog.get_product(p.id).await.unwrap().variants.len(), 1);
        catalog.delete_variant(p.id, v.variant_id).await.unwrap();
        let err = catalog.delete_variant(p.id, v.variant_id).await.unwrap_err();
        assert!(matches!(err, StorefrontError::NotFound { entity: "Variant", .. }));
    }
}
