//! `bakery-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod error;
pub mod id;
pub mod money;
pub mod quantity;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot};
pub use error::{DomainError, DomainResult};
pub use id::{
    CategoryId, DeliveryId, IngredientId, MovementId, OrderId, PaymentId, ProductId,
    ProductionOrderId, RecipeLineId, SupplierId, UserId,
};
pub use money::Money;
pub use quantity::Quantity;
pub use value_object::ValueObject;
