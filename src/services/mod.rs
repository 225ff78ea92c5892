//! Application services.
//!
//! Each service holds the shared store and applies the business rules on top
//! of it; HTTP handlers only translate requests and responses.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod stock;

pub use auth::{AuthService, Credentials};
pub use cart::{AddToCart, CartService, RemoveFromCart, SetQuantity};
pub use catalog::CatalogService;
pub use checkout::CheckoutProcessor;
pub use stock::StockLedger;
