//! Production domain: recipes, production orders and ingredient backflush.

pub mod backflush;
pub mod order;
pub mod recipe;

pub use backflush::{BackflushLine, backflush_plan, production_note};
pub use order::{
    ChangeProductionStatus, NewProductionOrder, ProductionCommand, ProductionEvent,
    ProductionFinished, ProductionOrder, ProductionStatus, ProductionStatusChanged,
};
pub use recipe::{RecipeLine, ensure_ingredient_not_in_recipe};
