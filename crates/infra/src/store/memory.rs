//! In-memory store for development and tests.
//!
//! A unit of work holds the table lock for its whole lifetime and mutates a
//! private copy of the tables; `commit` swaps the copy in. Units of work are
//! therefore fully serialized, and a dropped unit leaves no trace.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use bakery_auth::User;
use bakery_catalog::{Category, Product};
use bakery_core::{
    CategoryId, DeliveryId, IngredientId, OrderId, ProductId, ProductionOrderId, RecipeLineId,
    SupplierId, UserId,
};
use bakery_delivery::{Delivery, DeliveryStatus};
use bakery_inventory::{Ingredient, StockMovement, Supplier};
use bakery_production::{ProductionOrder, RecipeLine};
use bakery_sales::{Order, Payment};

use super::{DeliveryFilter, OrderFilter, Store, StoreError, StoreResult, UnitOfWork};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    categories: BTreeMap<CategoryId, Category>,
    products: BTreeMap<ProductId, Product>,
    suppliers: BTreeMap<SupplierId, Supplier>,
    ingredients: BTreeMap<IngredientId, Ingredient>,
    movements: Vec<StockMovement>,
    recipe_lines: Vec<RecipeLine>,
    production_orders: BTreeMap<ProductionOrderId, ProductionOrder>,
    orders: BTreeMap<OrderId, Order>,
    payments: Vec<Payment>,
    deliveries: BTreeMap<DeliveryId, Delivery>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryUnit { guard, work }))
    }
}

struct MemoryUnit {
    guard: OwnedMutexGuard<Tables>,
    work: Tables,
}

fn insert_new<K: Ord, V>(map: &mut BTreeMap<K, V>, key: K, value: V, what: &str) -> StoreResult<()> {
    if map.contains_key(&key) {
        return Err(StoreError::Conflict(format!("{what} already exists")));
    }
    map.insert(key, value);
    Ok(())
}

fn replace<K: Ord, V>(map: &mut BTreeMap<K, V>, key: K, value: V, what: &str) -> StoreResult<()> {
    match map.get_mut(&key) {
        Some(slot) => {
            *slot = value;
            Ok(())
        }
        None => Err(StoreError::Conflict(format!("{what} does not exist"))),
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnit {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryUnit { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }

    async fn users(&mut self) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self.work.users.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn user(&mut self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.work.users.get(&id).cloned())
    }

    async fn user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.work.users.values().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&mut self, user: &User) -> StoreResult<()> {
        if self.work.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!(
                "email '{}' is already registered",
                user.email
            )));
        }
        insert_new(&mut self.work.users, user.id, user.clone(), "user")
    }

    async fn update_user(&mut self, user: &User) -> StoreResult<()> {
        replace(&mut self.work.users, user.id, user.clone(), "user")
    }

    async fn categories(&mut self) -> StoreResult<Vec<Category>> {
        let mut rows: Vec<Category> = self.work.categories.values().cloned().collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn category(&mut self, id: CategoryId) -> StoreResult<Option<Category>> {
        Ok(self.work.categories.get(&id).cloned())
    }

    async fn insert_category(&mut self, category: &Category) -> StoreResult<()> {
        insert_new(&mut self.work.categories, category.id, category.clone(), "category")
    }

    async fn products(&mut self) -> StoreResult<Vec<Product>> {
        let mut rows: Vec<Product> = self.work.products.values().cloned().collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn product(&mut self, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self.work.products.get(&id).cloned())
    }

    async fn insert_product(&mut self, product: &Product) -> StoreResult<()> {
        insert_new(&mut self.work.products, product.id, product.clone(), "product")
    }

    async fn update_product(&mut self, product: &Product) -> StoreResult<()> {
        replace(&mut self.work.products, product.id, product.clone(), "product")
    }

    async fn suppliers(&mut self) -> StoreResult<Vec<Supplier>> {
        let mut rows: Vec<Supplier> = self.work.suppliers.values().cloned().collect();
        rows.sort_by(|a, b| a.business_name.cmp(&b.business_name));
        Ok(rows)
    }

    async fn supplier(&mut self, id: SupplierId) -> StoreResult<Option<Supplier>> {
        Ok(self.work.suppliers.get(&id).cloned())
    }

    async fn insert_supplier(&mut self, supplier: &Supplier) -> StoreResult<()> {
        insert_new(&mut self.work.suppliers, supplier.id, supplier.clone(), "supplier")
    }

    async fn update_supplier(&mut self, supplier: &Supplier) -> StoreResult<()> {
        replace(&mut self.work.suppliers, supplier.id, supplier.clone(), "supplier")
    }

    async fn delete_supplier(&mut self, id: SupplierId) -> StoreResult<bool> {
        if self.supplier_in_use(id).await? {
            return Err(StoreError::Conflict("supplier is referenced by ingredients".into()));
        }
        Ok(self.work.suppliers.remove(&id).is_some())
    }

    async fn supplier_in_use(&mut self, id: SupplierId) -> StoreResult<bool> {
        Ok(self
            .work
            .ingredients
            .values()
            .any(|i| i.preferred_supplier_id == Some(id)))
    }

    async fn ingredients(&mut self) -> StoreResult<Vec<Ingredient>> {
        let mut rows: Vec<Ingredient> = self.work.ingredients.values().cloned().collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn ingredient(&mut self, id: IngredientId) -> StoreResult<Option<Ingredient>> {
        Ok(self.work.ingredients.get(&id).cloned())
    }

    async fn insert_ingredient(&mut self, ingredient: &Ingredient) -> StoreResult<()> {
        insert_new(&mut self.work.ingredients, ingredient.id, ingredient.clone(), "ingredient")
    }

    async fn update_ingredient(&mut self, ingredient: &Ingredient) -> StoreResult<()> {
        replace(&mut self.work.ingredients, ingredient.id, ingredient.clone(), "ingredient")
    }

    async fn delete_ingredient(&mut self, id: IngredientId) -> StoreResult<bool> {
        if self.ingredient_in_use(id).await? {
            return Err(StoreError::Conflict(
                "ingredient is referenced by recipes or movements".into(),
            ));
        }
        Ok(self.work.ingredients.remove(&id).is_some())
    }

    async fn ingredient_in_use(&mut self, id: IngredientId) -> StoreResult<bool> {
        Ok(self.work.recipe_lines.iter().any(|l| l.ingredient_id == id)
            || self.work.movements.iter().any(|m| m.ingredient_id == id))
    }

    async fn insert_movement(&mut self, movement: &StockMovement) -> StoreResult<()> {
        self.work.movements.push(movement.clone());
        Ok(())
    }

    async fn movements(&mut self, ingredient: Option<IngredientId>) -> StoreResult<Vec<StockMovement>> {
        let mut rows: Vec<StockMovement> = self
            .work
            .movements
            .iter()
            .filter(|m| ingredient.is_none_or(|id| m.ingredient_id == id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn recipe(&mut self, product_id: ProductId) -> StoreResult<Vec<RecipeLine>> {
        Ok(self
            .work
            .recipe_lines
            .iter()
            .filter(|l| l.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn insert_recipe_line(&mut self, line: &RecipeLine) -> StoreResult<()> {
        if self
            .work
            .recipe_lines
            .iter()
            .any(|l| l.product_id == line.product_id && l.ingredient_id == line.ingredient_id)
        {
            return Err(StoreError::Conflict(
                "ingredient is already part of this recipe".into(),
            ));
        }
        self.work.recipe_lines.push(line.clone());
        Ok(())
    }

    async fn delete_recipe_line(&mut self, id: RecipeLineId) -> StoreResult<bool> {
        let before = self.work.recipe_lines.len();
        self.work.recipe_lines.retain(|l| l.id != id);
        Ok(self.work.recipe_lines.len() != before)
    }

    async fn production_orders(&mut self) -> StoreResult<Vec<ProductionOrder>> {
        let mut rows: Vec<ProductionOrder> = self.work.production_orders.values().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn production_order(&mut self, id: ProductionOrderId) -> StoreResult<Option<ProductionOrder>> {
        Ok(self.work.production_orders.get(&id).cloned())
    }

    async fn insert_production_order(&mut self, order: &ProductionOrder) -> StoreResult<()> {
        insert_new(&mut self.work.production_orders, order.id, order.clone(), "production order")
    }

    async fn update_production_order(&mut self, order: &ProductionOrder) -> StoreResult<()> {
        replace(&mut self.work.production_orders, order.id, order.clone(), "production order")
    }

    async fn delete_production_order(&mut self, id: ProductionOrderId) -> StoreResult<bool> {
        Ok(self.work.production_orders.remove(&id).is_some())
    }

    async fn orders(&mut self, filter: &OrderFilter) -> StoreResult<Vec<Order>> {
        let mut rows: Vec<Order> = self
            .work
            .orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.placed_at.cmp(&a.placed_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn order(&mut self, id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.work.orders.get(&id).cloned())
    }

    async fn insert_order(&mut self, order: &Order) -> StoreResult<()> {
        insert_new(&mut self.work.orders, order.id, order.clone(), "order")
    }

    async fn update_order(&mut self, order: &Order) -> StoreResult<()> {
        match self.work.orders.get_mut(&order.id) {
            Some(existing) => {
                existing.status = order.status;
                Ok(())
            }
            None => Err(StoreError::Conflict("order does not exist".into())),
        }
    }

    async fn payments(&mut self, order_id: OrderId) -> StoreResult<Vec<Payment>> {
        Ok(self
            .work
            .payments
            .iter()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> StoreResult<()> {
        self.work.payments.push(payment.clone());
        Ok(())
    }

    async fn update_payment(&mut self, payment: &Payment) -> StoreResult<()> {
        match self.work.payments.iter_mut().find(|p| p.id == payment.id) {
            Some(slot) => {
                *slot = payment.clone();
                Ok(())
            }
            None => Err(StoreError::Conflict("payment does not exist".into())),
        }
    }

    async fn delivery(&mut self, id: DeliveryId) -> StoreResult<Option<Delivery>> {
        Ok(self.work.deliveries.get(&id).cloned())
    }

    async fn delivery_for_order(&mut self, order_id: OrderId) -> StoreResult<Option<Delivery>> {
        Ok(self
            .work
            .deliveries
            .values()
            .find(|d| d.order_id == order_id)
            .cloned())
    }

    async fn peek_delivery_for_order(&mut self, order_id: OrderId) -> StoreResult<Option<Delivery>> {
        self.delivery_for_order(order_id).await
    }

    async fn deliveries(&mut self, filter: DeliveryFilter) -> StoreResult<Vec<Delivery>> {
        Ok(self
            .work
            .deliveries
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect())
    }

    async fn insert_delivery(&mut self, delivery: &Delivery) -> StoreResult<()> {
        if self
            .work
            .deliveries
            .values()
            .any(|d| d.order_id == delivery.order_id)
        {
            return Err(StoreError::Conflict(
                "order already has a delivery".into(),
            ));
        }
        insert_new(&mut self.work.deliveries, delivery.id, delivery.clone(), "delivery")
    }

    async fn update_delivery(&mut self, delivery: &Delivery) -> StoreResult<()> {
        replace(&mut self.work.deliveries, delivery.id, delivery.clone(), "delivery")
    }

    async fn claim_delivery(&mut self, id: DeliveryId, driver_id: UserId) -> StoreResult<bool> {
        match self.work.deliveries.get_mut(&id) {
            Some(d) if d.is_available() => {
                d.driver_id = Some(driver_id);
                d.status = DeliveryStatus::Assigned;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
