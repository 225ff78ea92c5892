//! Persistence.
//!
//! Services talk to storage through the traits below. [`PgStore`] backs them with
//! Postgres; [`MemoryStore`] keeps everything in process for tests and local runs.
//! Every method that changes stock must be a conditional write that cannot take
//! a counter below zero.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::CheckoutMode;
use crate::domain::aggregates::{
    CartLine, CartLineView, Category, CategoryUpdate, NewCartLine, NewCategory, NewProduct,
    NewUser, NewVariant, Product, ProductPatch, ProductVariant, User,
};
use crate::domain::value_objects::StockTarget;
use crate::Result;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_products(&self, category_id: Option<Uuid>) -> Result<Vec<Product>>;
    /// Product with its variants.
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>>;
    /// `metadata` is already merged with the category defaults.
    async fn create_product(&self, product: NewProduct, metadata: serde_json::Value) -> Result<Product>;
    async fn update_product(&self, id: Uuid, patch: ProductPatch) -> Result<Option<Product>>;
    /// Also drops the product's variants and any cart lines pointing at it.
    async fn delete_product(&self, id: Uuid) -> Result<bool>;
    async fn add_variant(&self, product_id: Uuid, variant: NewVariant) -> Result<Option<ProductVariant>>;
    async fn delete_variant(&self, product_id: Uuid, variant_id: Uuid) -> Result<bool>;

    async fn list_categories(&self) -> Result<Vec<Category>>;
    async fn get_category(&self, id: Uuid) -> Result<Option<Category>>;
    async fn create_category(&self, category: NewCategory) -> Result<Category>;
    async fn update_category(&self, id: Uuid, update: CategoryUpdate) -> Result<Option<Category>>;
    /// Children become roots; products lose their category.
    async fn delete_category(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// Σ quantity over every user's cart lines holding exactly `target`.
    async fn reserved_quantity(&self, target: StockTarget) -> Result<i64>;
    async fn find_line(&self, user_id: Uuid, target: StockTarget) -> Result<Option<CartLine>>;
    async fn get_line(&self, user_id: Uuid, line_id: Uuid) -> Result<Option<CartLine>>;
    /// Inserts, or adds `quantity` to the user's existing line for the same target.
    /// An existing line keeps its original snapshot.
    async fn merge_line(&self, line: NewCartLine) -> Result<CartLine>;
    async fn set_line_quantity(&self, user_id: Uuid, line_id: Uuid, quantity: i32) -> Result<Option<CartLine>>;
    async fn delete_line(&self, user_id: Uuid, line_id: Uuid) -> Result<bool>;
    /// Lines in insertion order, joined with live product fields.
    async fn list_lines(&self, user_id: Uuid) -> Result<Vec<CartLineView>>;
    /// Decrements stock for every line and clears the cart as one unit of work.
    ///
    /// In [`CheckoutMode::Atomic`] the first line without enough stock aborts the
    /// whole operation with `InsufficientStock` and nothing changes.
    async fn checkout(&self, user_id: Uuid, mode: CheckoutMode) -> Result<CheckoutReceipt>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// `None` when the username is taken.
    async fn create_user(&self, user: NewUser) -> Result<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;
}

pub trait Store: CatalogStore + CartStore + UserStore {}

impl<T: CatalogStore + CartStore + UserStore> Store for T {}

/// Per-line result of a checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LineOutcome {
    pub line_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
    /// Whether the conditional decrement took effect.
    pub applied: bool,
}

impl LineOutcome {
    pub fn new(line: &CartLine, applied: bool) -> Self {
        Self {
            line_id: line.id,
            product_id: line.product_id,
            variant_id: line.variant_id,
            quantity: line.quantity,
            applied,
        }
    }

    pub fn target(&self) -> StockTarget {
        StockTarget::new(self.product_id, self.variant_id)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CheckoutReceipt {
    pub user_id: Uuid,
    pub mode: CheckoutMode,
    pub lines: Vec<LineOutcome>,
    pub completed_at: DateTime<Utc>,
}

impl CheckoutReceipt {
    pub fn new(user_id: Uuid, mode: CheckoutMode, lines: Vec<LineOutcome>) -> Self {
        Self { user_id, mode, lines, completed_at: Utc::now() }
    }

    pub fn fulfilled(&self) -> usize {
        self.lines.iter().filter(|l| l.applied).count()
    }

    pub fn is_complete(&self) -> bool {
        self.fulfilled() == self.lines.len()
    }
}
