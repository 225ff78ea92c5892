//! Aggregates module
pub mod cart;
pub mod category;
pub mod product;
pub mod user;

pub use cart::{Cart, CartLine, CartLineView, LineChange, NewCartLine};
pub use category::{Category, CategoryTree, CategoryUpdate, NestedCategory, NewCategory};
pub use product::{NewProduct, NewVariant, Product, ProductPatch, ProductVariant};
pub use user::{NewUser, Registration, Role, User};
