//! Catalog domain module: categories and sellable products.
//!
//! Pure domain logic (no IO, no HTTP, no storage).

pub mod category;
pub mod product;

pub use category::Category;
pub use product::{Product, ProductDraft};
