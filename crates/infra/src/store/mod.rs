//! Transactional persistence for the bakery tables.
//!
//! ## Units of work
//!
//! [`Store::begin`] opens a [`UnitOfWork`]. All reads and writes made through
//! it are isolated until [`UnitOfWork::commit`]; dropping it without
//! committing rolls everything back. Services rely on this for the
//! multi-table flows (placing an order, finishing production, delivery
//! progress).
//!
//! Reads of rows that are about to be modified (`product`, `ingredient`,
//! `order`, `delivery`, ...) lock those rows in backends that support it, so
//! check-then-update sequences inside one unit of work are race-free.
//!
//! ## Backends
//!
//! | Backend | Isolation |
//! |---|---|
//! | [`memory::InMemoryStore`] | one writer at a time over a snapshot copy |
//! | `postgres::PgStore` (feature `postgres`) | SQL transaction + `SELECT ... FOR UPDATE` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use bakery_auth::User;
use bakery_catalog::{Category, Product};
use bakery_core::{
    CategoryId, DeliveryId, IngredientId, OrderId, ProductId, ProductionOrderId, RecipeLineId,
    SupplierId, UserId,
};
use bakery_delivery::Delivery;
use bakery_inventory::{Ingredient, StockMovement, Supplier};
use bakery_production::{ProductionOrder, RecipeLine};
use bakery_sales::{Fulfillment, Order, Payment};

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique or referential constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored row could not be mapped back to a domain value.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(String),
}

/// Order listing filter. Empty means every order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub user_id: Option<UserId>,
    pub fulfillment: Option<Fulfillment>,
    pub scheduled_from: Option<DateTime<Utc>>,
    pub scheduled_to: Option<DateTime<Utc>>,
    pub placed_from: Option<DateTime<Utc>>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        self.user_id.is_none_or(|u| order.user_id == Some(u))
            && self.fulfillment.is_none_or(|f| order.fulfillment == f)
            && self.scheduled_from.is_none_or(|t| order.scheduled_for >= t)
            && self.scheduled_to.is_none_or(|t| order.scheduled_for <= t)
            && self.placed_from.is_none_or(|t| order.placed_at >= t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFilter {
    /// No driver and not cancelled.
    Available,
    Driver(UserId),
}

impl DeliveryFilter {
    pub fn matches(&self, delivery: &Delivery) -> bool {
        match self {
            DeliveryFilter::Available => delivery.is_available(),
            DeliveryFilter::Driver(id) => delivery.driver_id == Some(*id),
        }
    }
}

/// Entry point for a backend.
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>>;
}

/// One transaction over every table.
///
/// Listing methods return rows in a stable backend-independent order noted
/// on each method; services re-sort when they need a different one.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn commit(self: Box<Self>) -> StoreResult<()>;

    // -- users
    /// Ordered by `created_at`.
    async fn users(&mut self) -> StoreResult<Vec<User>>;
    async fn user(&mut self, id: UserId) -> StoreResult<Option<User>>;
    async fn user_by_email(&mut self, email: &str) -> StoreResult<Option<User>>;
    async fn insert_user(&mut self, user: &User) -> StoreResult<()>;
    async fn update_user(&mut self, user: &User) -> StoreResult<()>;

    // -- catalog
    /// Ordered by name.
    async fn categories(&mut self) -> StoreResult<Vec<Category>>;
    async fn category(&mut self, id: CategoryId) -> StoreResult<Option<Category>>;
    async fn insert_category(&mut self, category: &Category) -> StoreResult<()>;
    /// Ordered by name.
    async fn products(&mut self) -> StoreResult<Vec<Product>>;
    async fn product(&mut self, id: ProductId) -> StoreResult<Option<Product>>;
    async fn insert_product(&mut self, product: &Product) -> StoreResult<()>;
    async fn update_product(&mut self, product: &Product) -> StoreResult<()>;

    // -- suppliers
    /// Ordered by business name.
    async fn suppliers(&mut self) -> StoreResult<Vec<Supplier>>;
    async fn supplier(&mut self, id: SupplierId) -> StoreResult<Option<Supplier>>;
    async fn insert_supplier(&mut self, supplier: &Supplier) -> StoreResult<()>;
    async fn update_supplier(&mut self, supplier: &Supplier) -> StoreResult<()>;
    async fn delete_supplier(&mut self, id: SupplierId) -> StoreResult<bool>;
    /// Whether any ingredient names this supplier as preferred.
    async fn supplier_in_use(&mut self, id: SupplierId) -> StoreResult<bool>;

    // -- ingredients and kardex
    /// Ordered by name.
    async fn ingredients(&mut self) -> StoreResult<Vec<Ingredient>>;
    async fn ingredient(&mut self, id: IngredientId) -> StoreResult<Option<Ingredient>>;
    async fn insert_ingredient(&mut self, ingredient: &Ingredient) -> StoreResult<()>;
    async fn update_ingredient(&mut self, ingredient: &Ingredient) -> StoreResult<()>;
    async fn delete_ingredient(&mut self, id: IngredientId) -> StoreResult<bool>;
    /// Whether recipe lines or kardex movements reference the ingredient.
    async fn ingredient_in_use(&mut self, id: IngredientId) -> StoreResult<bool>;
    async fn insert_movement(&mut self, movement: &StockMovement) -> StoreResult<()>;
    /// Newest first.
    async fn movements(&mut self, ingredient: Option<IngredientId>) -> StoreResult<Vec<StockMovement>>;

    // -- recipes
    /// Lines of one product in insertion order.
    async fn recipe(&mut self, product_id: ProductId) -> StoreResult<Vec<RecipeLine>>;
    async fn insert_recipe_line(&mut self, line: &RecipeLine) -> StoreResult<()>;
    async fn delete_recipe_line(&mut self, id: RecipeLineId) -> StoreResult<bool>;

    // -- production
    /// Newest first.
    async fn production_orders(&mut self) -> StoreResult<Vec<ProductionOrder>>;
    async fn production_order(&mut self, id: ProductionOrderId) -> StoreResult<Option<ProductionOrder>>;
    async fn insert_production_order(&mut self, order: &ProductionOrder) -> StoreResult<()>;
    async fn update_production_order(&mut self, order: &ProductionOrder) -> StoreResult<()>;
    async fn delete_production_order(&mut self, id: ProductionOrderId) -> StoreResult<bool>;

    // -- orders and payments
    /// Newest placed first.
    async fn orders(&mut self, filter: &OrderFilter) -> StoreResult<Vec<Order>>;
    async fn order(&mut self, id: OrderId) -> StoreResult<Option<Order>>;
    /// Inserts the order with its lines.
    async fn insert_order(&mut self, order: &Order) -> StoreResult<()>;
    /// Persists the order status (lines are immutable).
    async fn update_order(&mut self, order: &Order) -> StoreResult<()>;
    /// Oldest first.
    async fn payments(&mut self, order_id: OrderId) -> StoreResult<Vec<Payment>>;
    async fn insert_payment(&mut self, payment: &Payment) -> StoreResult<()>;
    async fn update_payment(&mut self, payment: &Payment) -> StoreResult<()>;

    // -- deliveries
    async fn delivery(&mut self, id: DeliveryId) -> StoreResult<Option<Delivery>>;
    /// Locks the row for the rest of the unit of work.
    async fn delivery_for_order(&mut self, order_id: OrderId) -> StoreResult<Option<Delivery>>;
    /// Same lookup without a row lock, for assembling views.
    async fn peek_delivery_for_order(&mut self, order_id: OrderId) -> StoreResult<Option<Delivery>>;
    async fn deliveries(&mut self, filter: DeliveryFilter) -> StoreResult<Vec<Delivery>>;
    async fn insert_delivery(&mut self, delivery: &Delivery) -> StoreResult<()>;
    async fn update_delivery(&mut self, delivery: &Delivery) -> StoreResult<()>;
    /// Conditionally hand an available delivery to `driver_id`.
    ///
    /// Returns `false` when the delivery already has a driver or was cancelled.
    async fn claim_delivery(&mut self, id: DeliveryId, driver_id: UserId) -> StoreResult<bool>;
}
