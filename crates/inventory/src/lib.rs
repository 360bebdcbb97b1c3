//! Raw-material inventory: suppliers, ingredients and the kardex ledger.
//!
//! Every change to an ingredient's stock produces a [`StockMovement`]; callers
//! persist the ingredient and its movement in the same transaction.

pub mod ingredient;
pub mod movement;
pub mod supplier;
pub mod unit;

pub use ingredient::{DEFAULT_MIN_STOCK, Ingredient, IngredientDraft};
pub use movement::{MovementKind, StockMovement};
pub use supplier::{Supplier, SupplierDraft};
pub use unit::Unit;
