//! Storefront service
//!
//! Catalog, shopping cart and session authentication for a small online store.
//!
//! ## Features
//! - Product catalog with variants (size / color / price / stock)
//! - Nested category tree with per-category metadata templates
//! - Inventory-aware cart that never reserves more than remaining stock
//! - Transactional checkout that decrements inventory and empties the cart
//! - Cookie sessions with TTL eviction

pub mod config;
pub mod domain;
pub mod http;
pub mod publisher;
pub mod services;
pub mod session;
pub mod store;

use thiserror::Error;
use uuid::Uuid;

pub use config::{AppConfig, CheckoutMode};
pub use domain::aggregates::{
    Cart, CartLine, CartLineView, Category, CategoryTree, Product, ProductVariant,
};
pub use domain::value_objects::{PricedSnapshot, StockLevel, StockTarget};
pub use http::{router, AppState};
pub use session::{Role, SessionContext, SessionStore};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Validation(String),

    #[error("Requested quantity exceeds available stock")]
    QuantityExceeded {
        requested: i32,
        available: i64,
        in_cart: i64,
    },

    #[error("Insufficient stock for cart line {line_id}")]
    InsufficientStock {
        line_id: Uuid,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        requested: i32,
    },

    #[error("Unauthorized: Please log in")]
    Unauthorized,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Access denied. You do not have permission to perform this action.")]
    Forbidden,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StorefrontError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }
}

impl From<validator::ValidationErrors> for StorefrontError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
