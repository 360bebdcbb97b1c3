//! PostgreSQL store.
//!
//! One unit of work is one SQL transaction. Rows a service is about to modify
//! are read with `SELECT ... FOR UPDATE`; services take those locks in id
//! order. Claiming a delivery is a single
//! conditional `UPDATE` whose affected-row count decides the winner.
//!
//! ## Error mapping
//!
//! | SQLSTATE | StoreError | Scenario |
//! |---|---|---|
//! | `23505` | `Conflict` | unique email, duplicate recipe line, second delivery for an order |
//! | `23503` | `Conflict` | deleting a referenced supplier or ingredient |
//! | `23514` | `Conflict` | a CHECK guard such as `stock >= 0` |
//! | `40P01`, `40001` | `Conflict` | deadlock or serialization failure; the client may retry |
//! | other | `Database` | anything else the server reports |
//! | pool closed / timed out, IO | `Unavailable` | |

use std::fmt::Display;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use bakery_auth::User;
use bakery_catalog::{Category, Product};
use bakery_core::{
    CategoryId, DeliveryId, IngredientId, Money, OrderId, ProductId, ProductionOrderId, Quantity,
    RecipeLineId, SupplierId, UserId,
};
use bakery_delivery::Delivery;
use bakery_inventory::{Ingredient, StockMovement, Supplier, Unit};
use bakery_production::{ProductionOrder, RecipeLine};
use bakery_sales::{Order, OrderLine, Payment};

use super::{DeliveryFilter, OrderFilter, Store, StoreError, StoreResult, UnitOfWork};

/// Idempotent schema, applied by [`PgStore::migrate`].
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id UUID PRIMARY KEY,
    full_name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL,
    phone TEXT,
    default_address TEXT,
    status TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS categories (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    image_url TEXT,
    active BOOLEAN NOT NULL DEFAULT TRUE
);

CREATE TABLE IF NOT EXISTS products (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    base_price BIGINT NOT NULL CHECK (base_price >= 0),
    category_id UUID NOT NULL REFERENCES categories(id),
    image_url TEXT,
    customizable BOOLEAN NOT NULL DEFAULT FALSE,
    showcase_stock BIGINT NOT NULL DEFAULT 0 CHECK (showcase_stock >= 0),
    active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS suppliers (
    id UUID PRIMARY KEY,
    business_name TEXT NOT NULL,
    tax_id TEXT,
    contact_name TEXT,
    phone TEXT,
    email TEXT
);

CREATE TABLE IF NOT EXISTS ingredients (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    unit TEXT NOT NULL,
    min_stock_milli BIGINT NOT NULL CHECK (min_stock_milli >= 0),
    preferred_supplier_id UUID REFERENCES suppliers(id),
    stock_milli BIGINT NOT NULL CHECK (stock_milli >= 0),
    avg_cost BIGINT NOT NULL CHECK (avg_cost >= 0),
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS stock_movements (
    id UUID PRIMARY KEY,
    ingredient_id UUID NOT NULL REFERENCES ingredients(id),
    kind TEXT NOT NULL,
    quantity_milli BIGINT NOT NULL,
    unit_cost BIGINT NOT NULL,
    note TEXT,
    responsible_user_id UUID REFERENCES users(id),
    occurred_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS recipe_lines (
    id UUID PRIMARY KEY,
    product_id UUID NOT NULL REFERENCES products(id),
    ingredient_id UUID NOT NULL REFERENCES ingredients(id),
    quantity_required_milli BIGINT NOT NULL CHECK (quantity_required_milli > 0),
    usage_unit TEXT,
    UNIQUE (product_id, ingredient_id)
);

CREATE TABLE IF NOT EXISTS production_orders (
    id UUID PRIMARY KEY,
    product_id UUID NOT NULL REFERENCES products(id),
    quantity BIGINT NOT NULL CHECK (quantity > 0),
    status TEXT NOT NULL,
    batch_code TEXT NOT NULL,
    assigned_baker_id UUID REFERENCES users(id),
    estimated_finish TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL,
    finished_at TIMESTAMPTZ
);

CREATE TABLE IF NOT EXISTS orders (
    id UUID PRIMARY KEY,
    user_id UUID REFERENCES users(id),
    fulfillment TEXT NOT NULL,
    scheduled_for TIMESTAMPTZ NOT NULL,
    delivery_address TEXT,
    address_reference TEXT,
    notes TEXT,
    products_total BIGINT NOT NULL,
    shipping_cost BIGINT NOT NULL,
    total BIGINT NOT NULL,
    status TEXT NOT NULL,
    placed_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS order_lines (
    order_id UUID NOT NULL REFERENCES orders(id),
    position INT NOT NULL,
    product_id UUID NOT NULL REFERENCES products(id),
    quantity BIGINT NOT NULL CHECK (quantity > 0),
    unit_price BIGINT NOT NULL,
    subtotal BIGINT NOT NULL,
    customization TEXT,
    PRIMARY KEY (order_id, position)
);

CREATE TABLE IF NOT EXISTS payments (
    id UUID PRIMARY KEY,
    order_id UUID NOT NULL REFERENCES orders(id),
    method TEXT NOT NULL,
    amount BIGINT NOT NULL,
    status TEXT NOT NULL,
    paid_at TIMESTAMPTZ NOT NULL,
    receipt_url TEXT
);

CREATE TABLE IF NOT EXISTS deliveries (
    id UUID PRIMARY KEY,
    order_id UUID NOT NULL UNIQUE REFERENCES orders(id),
    driver_id UUID REFERENCES users(id),
    status TEXT NOT NULL,
    departed_at TIMESTAMPTZ,
    delivered_at TIMESTAMPTZ,
    evidence_url TEXT
);

CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id);
CREATE INDEX IF NOT EXISTS idx_orders_scheduled ON orders(scheduled_for);
CREATE INDEX IF NOT EXISTS idx_movements_ingredient ON stock_movements(ingredient_id, occurred_at DESC);
CREATE INDEX IF NOT EXISTS idx_deliveries_driver ON deliveries(driver_id);
"#;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create missing tables and indexes.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        tracing::info!("database schema ready");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin", e))?;
        Ok(Box::new(PgUnit { tx }))
    }
}

struct PgUnit {
    tx: Transaction<'static, Postgres>,
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("{operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") => StoreError::Conflict(format!("{msg} (row is referenced)")),
                Some("23514") => StoreError::Conflict(msg),
                Some("40P01") | Some("40001") => StoreError::Conflict(format!("{msg} (concurrent update, retry)")),
                _ => StoreError::Database(msg),
            }
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
            StoreError::Unavailable(format!("{operation}: {err}"))
        }
        other => StoreError::Database(format!("{operation}: {other}")),
    }
}

fn col<'r, T>(row: &'r PgRow, name: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Corrupt(format!("column {name}: {e}")))
}

fn parsed<T>(row: &PgRow, name: &str) -> StoreResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw: String = col(row, name)?;
    raw.parse()
        .map_err(|e| StoreError::Corrupt(format!("column {name}: {e}")))
}

fn parsed_opt<T>(row: &PgRow, name: &str) -> StoreResult<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    let raw: Option<String> = col(row, name)?;
    raw.map(|r| r.parse())
        .transpose()
        .map_err(|e| StoreError::Corrupt(format!("column {name}: {e}")))
}

fn id<T: From<Uuid>>(row: &PgRow, name: &str) -> StoreResult<T> {
    Ok(T::from(col::<Uuid>(row, name)?))
}

fn id_opt<T: From<Uuid>>(row: &PgRow, name: &str) -> StoreResult<Option<T>> {
    Ok(col::<Option<Uuid>>(row, name)?.map(T::from))
}

fn money(row: &PgRow, name: &str) -> StoreResult<Money> {
    Ok(Money::from_cents(col(row, name)?))
}

fn quantity(row: &PgRow, name: &str) -> StoreResult<Quantity> {
    Ok(Quantity::from_milli(col(row, name)?))
}

fn user_row(row: &PgRow) -> StoreResult<User> {
    Ok(User {
        id: id(row, "id")?,
        full_name: col(row, "full_name")?,
        email: col(row, "email")?,
        password_hash: col(row, "password_hash")?,
        role: parsed(row, "role")?,
        phone: col(row, "phone")?,
        default_address: col(row, "default_address")?,
        status: parsed(row, "status")?,
        created_at: col(row, "created_at")?,
    })
}

fn category_row(row: &PgRow) -> StoreResult<Category> {
    Ok(Category {
        id: id(row, "id")?,
        name: col(row, "name")?,
        image_url: col(row, "image_url")?,
        active: col(row, "active")?,
    })
}

fn product_row(row: &PgRow) -> StoreResult<Product> {
    Ok(Product {
        id: id(row, "id")?,
        name: col(row, "name")?,
        description: col(row, "description")?,
        base_price: money(row, "base_price")?,
        category_id: id(row, "category_id")?,
        image_url: col(row, "image_url")?,
        customizable: col(row, "customizable")?,
        showcase_stock: col(row, "showcase_stock")?,
        active: col(row, "active")?,
        created_at: col(row, "created_at")?,
    })
}

fn supplier_row(row: &PgRow) -> StoreResult<Supplier> {
    Ok(Supplier {
        id: id(row, "id")?,
        business_name: col(row, "business_name")?,
        tax_id: col(row, "tax_id")?,
        contact_name: col(row, "contact_name")?,
        phone: col(row, "phone")?,
        email: col(row, "email")?,
    })
}

fn ingredient_row(row: &PgRow) -> StoreResult<Ingredient> {
    Ok(Ingredient {
        id: id(row, "id")?,
        name: col(row, "name")?,
        description: col(row, "description")?,
        unit: parsed(row, "unit")?,
        min_stock: quantity(row, "min_stock_milli")?,
        preferred_supplier_id: id_opt(row, "preferred_supplier_id")?,
        stock: quantity(row, "stock_milli")?,
        avg_cost: money(row, "avg_cost")?,
        created_at: col(row, "created_at")?,
    })
}

fn movement_row(row: &PgRow) -> StoreResult<StockMovement> {
    Ok(StockMovement {
        id: id(row, "id")?,
        ingredient_id: id(row, "ingredient_id")?,
        kind: parsed(row, "kind")?,
        quantity: quantity(row, "quantity_milli")?,
        unit_cost: money(row, "unit_cost")?,
        note: col(row, "note")?,
        responsible_user_id: id_opt(row, "responsible_user_id")?,
        occurred_at: col(row, "occurred_at")?,
    })
}

fn recipe_line_row(row: &PgRow) -> StoreResult<RecipeLine> {
    Ok(RecipeLine {
        id: id(row, "id")?,
        product_id: id(row, "product_id")?,
        ingredient_id: id(row, "ingredient_id")?,
        quantity_required: quantity(row, "quantity_required_milli")?,
        usage_unit: parsed_opt::<Unit>(row, "usage_unit")?,
    })
}

fn production_order_row(row: &PgRow) -> StoreResult<ProductionOrder> {
    Ok(ProductionOrder {
        id: id(row, "id")?,
        product_id: id(row, "product_id")?,
        quantity: col(row, "quantity")?,
        status: parsed(row, "status")?,
        batch_code: col(row, "batch_code")?,
        assigned_baker_id: id_opt(row, "assigned_baker_id")?,
        estimated_finish: col(row, "estimated_finish")?,
        created_at: col(row, "created_at")?,
        finished_at: col(row, "finished_at")?,
    })
}

/// Order header; lines are attached separately.
fn order_row(row: &PgRow) -> StoreResult<Order> {
    Ok(Order {
        id: id(row, "id")?,
        user_id: id_opt(row, "user_id")?,
        fulfillment: parsed(row, "fulfillment")?,
        scheduled_for: col(row, "scheduled_for")?,
        delivery_address: col(row, "delivery_address")?,
        address_reference: col(row, "address_reference")?,
        notes: col(row, "notes")?,
        lines: Vec::new(),
        products_total: money(row, "products_total")?,
        shipping_cost: money(row, "shipping_cost")?,
        total: money(row, "total")?,
        status: parsed(row, "status")?,
        placed_at: col(row, "placed_at")?,
    })
}

fn order_line_row(row: &PgRow) -> StoreResult<OrderLine> {
    Ok(OrderLine {
        product_id: id(row, "product_id")?,
        quantity: col(row, "quantity")?,
        unit_price: money(row, "unit_price")?,
        subtotal: money(row, "subtotal")?,
        customization: col(row, "customization")?,
    })
}

fn payment_row(row: &PgRow) -> StoreResult<Payment> {
    Ok(Payment {
        id: id(row, "id")?,
        order_id: id(row, "order_id")?,
        method: parsed(row, "method")?,
        amount: money(row, "amount")?,
        status: parsed(row, "status")?,
        paid_at: col(row, "paid_at")?,
        receipt_url: col(row, "receipt_url")?,
    })
}

fn delivery_row(row: &PgRow) -> StoreResult<Delivery> {
    Ok(Delivery {
        id: id(row, "id")?,
        order_id: id(row, "order_id")?,
        driver_id: id_opt(row, "driver_id")?,
        status: parsed(row, "status")?,
        departed_at: col(row, "departed_at")?,
        delivered_at: col(row, "delivered_at")?,
        evidence_url: col(row, "evidence_url")?,
    })
}

fn rows<T>(rows: Vec<PgRow>, map: fn(&PgRow) -> StoreResult<T>) -> StoreResult<Vec<T>> {
    rows.iter().map(map).collect()
}

const ORDER_COLUMNS: &str = "id, user_id, fulfillment, scheduled_for, delivery_address, \
    address_reference, notes, products_total, shipping_cost, total, status, placed_at";

impl PgUnit {
    async fn attach_lines(&mut self, orders: &mut [Order]) -> StoreResult<()> {
        if orders.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = orders.iter().map(|o| *o.id.as_uuid()).collect();
        let found = sqlx::query(
            "SELECT order_id, product_id, quantity, unit_price, subtotal, customization \
             FROM order_lines WHERE order_id = ANY($1) ORDER BY order_id, position",
        )
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("order_lines", e))?;

        for row in &found {
            let order_id: OrderId = id(row, "order_id")?;
            if let Some(order) = orders.iter_mut().find(|o| o.id == order_id) {
                order.lines.push(order_line_row(row)?);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for PgUnit {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await.map_err(|e| map_sqlx_error("commit", e))
    }

    async fn users(&mut self) -> StoreResult<Vec<User>> {
        let found = sqlx::query("SELECT * FROM users ORDER BY created_at, id")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("users", e))?;
        rows(found, user_row)
    }

    async fn user(&mut self, id: UserId) -> StoreResult<Option<User>> {
        sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("user", e))?
            .as_ref()
            .map(user_row)
            .transpose()
    }

    async fn user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        sqlx::query("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("user_by_email", e))?
            .as_ref()
            .map(user_row)
            .transpose()
    }

    async fn insert_user(&mut self, user: &User) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO users (id, full_name, email, password_hash, role, phone, default_address, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(*user.id.as_uuid())
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.phone)
        .bind(&user.default_address)
        .bind(user.status.as_str())
        .bind(user.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(())
    }

    async fn update_user(&mut self, user: &User) -> StoreResult<()> {
        sqlx::query(
            "UPDATE users SET full_name = $2, email = $3, password_hash = $4, role = $5, \
             phone = $6, default_address = $7, status = $8 WHERE id = $1",
        )
        .bind(*user.id.as_uuid())
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.phone)
        .bind(&user.default_address)
        .bind(user.status.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?;
        Ok(())
    }

    async fn categories(&mut self) -> StoreResult<Vec<Category>> {
        let found = sqlx::query("SELECT * FROM categories ORDER BY name")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("categories", e))?;
        rows(found, category_row)
    }

    async fn category(&mut self, id: CategoryId) -> StoreResult<Option<Category>> {
        sqlx::query("SELECT * FROM categories WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("category", e))?
            .as_ref()
            .map(category_row)
            .transpose()
    }

    async fn insert_category(&mut self, category: &Category) -> StoreResult<()> {
        sqlx::query("INSERT INTO categories (id, name, image_url, active) VALUES ($1, $2, $3, $4)")
            .bind(*category.id.as_uuid())
            .bind(&category.name)
            .bind(&category.image_url)
            .bind(category.active)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_category", e))?;
        Ok(())
    }

    async fn products(&mut self) -> StoreResult<Vec<Product>> {
        let found = sqlx::query("SELECT * FROM products ORDER BY name")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("products", e))?;
        rows(found, product_row)
    }

    async fn product(&mut self, id: ProductId) -> StoreResult<Option<Product>> {
        sqlx::query("SELECT * FROM products WHERE id = $1 FOR UPDATE")
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("product", e))?
            .as_ref()
            .map(product_row)
            .transpose()
    }

    async fn insert_product(&mut self, product: &Product) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO products (id, name, description, base_price, category_id, image_url, \
             customizable, showcase_stock, active, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(*product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.base_price.cents())
        .bind(*product.category_id.as_uuid())
        .bind(&product.image_url)
        .bind(product.customizable)
        .bind(product.showcase_stock)
        .bind(product.active)
        .bind(product.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> StoreResult<()> {
        sqlx::query(
            "UPDATE products SET name = $2, description = $3, base_price = $4, category_id = $5, \
             image_url = $6, customizable = $7, showcase_stock = $8, active = $9 WHERE id = $1",
        )
        .bind(*product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.base_price.cents())
        .bind(*product.category_id.as_uuid())
        .bind(&product.image_url)
        .bind(product.customizable)
        .bind(product.showcase_stock)
        .bind(product.active)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_product", e))?;
        Ok(())
    }

    async fn suppliers(&mut self) -> StoreResult<Vec<Supplier>> {
        let found = sqlx::query("SELECT * FROM suppliers ORDER BY business_name")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("suppliers", e))?;
        rows(found, supplier_row)
    }

    async fn supplier(&mut self, id: SupplierId) -> StoreResult<Option<Supplier>> {
        sqlx::query("SELECT * FROM suppliers WHERE id = $1 FOR UPDATE")
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("supplier", e))?
            .as_ref()
            .map(supplier_row)
            .transpose()
    }

    async fn insert_supplier(&mut self, supplier: &Supplier) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO suppliers (id, business_name, tax_id, contact_name, phone, email) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(*supplier.id.as_uuid())
        .bind(&supplier.business_name)
        .bind(&supplier.tax_id)
        .bind(&supplier.contact_name)
        .bind(&supplier.phone)
        .bind(&supplier.email)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_supplier", e))?;
        Ok(())
    }

    async fn update_supplier(&mut self, supplier: &Supplier) -> StoreResult<()> {
        sqlx::query(
            "UPDATE suppliers SET business_name = $2, tax_id = $3, contact_name = $4, phone = $5, \
             email = $6 WHERE id = $1",
        )
        .bind(*supplier.id.as_uuid())
        .bind(&supplier.business_name)
        .bind(&supplier.tax_id)
        .bind(&supplier.contact_name)
        .bind(&supplier.phone)
        .bind(&supplier.email)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_supplier", e))?;
        Ok(())
    }

    async fn delete_supplier(&mut self, id: SupplierId) -> StoreResult<bool> {
        let done = sqlx::query("DELETE FROM suppliers WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_supplier", e))?;
        Ok(done.rows_affected() > 0)
    }

    async fn supplier_in_use(&mut self, id: SupplierId) -> StoreResult<bool> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM ingredients WHERE preferred_supplier_id = $1) AS used",
        )
        .bind(*id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("supplier_in_use", e))?;
        col(&row, "used")
    }

    async fn ingredients(&mut self) -> StoreResult<Vec<Ingredient>> {
        let found = sqlx::query("SELECT * FROM ingredients ORDER BY name")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("ingredients", e))?;
        rows(found, ingredient_row)
    }

    async fn ingredient(&mut self, id: IngredientId) -> StoreResult<Option<Ingredient>> {
        sqlx::query("SELECT * FROM ingredients WHERE id = $1 FOR UPDATE")
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("ingredient", e))?
            .as_ref()
            .map(ingredient_row)
            .transpose()
    }

    async fn insert_ingredient(&mut self, ingredient: &Ingredient) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO ingredients (id, name, description, unit, min_stock_milli, \
             preferred_supplier_id, stock_milli, avg_cost, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(*ingredient.id.as_uuid())
        .bind(&ingredient.name)
        .bind(&ingredient.description)
        .bind(ingredient.unit.as_str())
        .bind(ingredient.min_stock.milli())
        .bind(ingredient.preferred_supplier_id.map(Uuid::from))
        .bind(ingredient.stock.milli())
        .bind(ingredient.avg_cost.cents())
        .bind(ingredient.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_ingredient", e))?;
        Ok(())
    }

    async fn update_ingredient(&mut self, ingredient: &Ingredient) -> StoreResult<()> {
        sqlx::query(
            "UPDATE ingredients SET name = $2, description = $3, unit = $4, min_stock_milli = $5, \
             preferred_supplier_id = $6, stock_milli = $7, avg_cost = $8 WHERE id = $1",
        )
        .bind(*ingredient.id.as_uuid())
        .bind(&ingredient.name)
        .bind(&ingredient.description)
        .bind(ingredient.unit.as_str())
        .bind(ingredient.min_stock.milli())
        .bind(ingredient.preferred_supplier_id.map(Uuid::from))
        .bind(ingredient.stock.milli())
        .bind(ingredient.avg_cost.cents())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_ingredient", e))?;
        Ok(())
    }

    async fn delete_ingredient(&mut self, id: IngredientId) -> StoreResult<bool> {
        let done = sqlx::query("DELETE FROM ingredients WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_ingredient", e))?;
        Ok(done.rows_affected() > 0)
    }

    async fn ingredient_in_use(&mut self, id: IngredientId) -> StoreResult<bool> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM recipe_lines WHERE ingredient_id = $1) \
             OR EXISTS (SELECT 1 FROM stock_movements WHERE ingredient_id = $1) AS used",
        )
        .bind(*id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("ingredient_in_use", e))?;
        col(&row, "used")
    }

    async fn insert_movement(&mut self, movement: &StockMovement) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO stock_movements (id, ingredient_id, kind, quantity_milli, unit_cost, note, \
             responsible_user_id, occurred_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(*movement.id.as_uuid())
        .bind(*movement.ingredient_id.as_uuid())
        .bind(movement.kind.as_str())
        .bind(movement.quantity.milli())
        .bind(movement.unit_cost.cents())
        .bind(&movement.note)
        .bind(movement.responsible_user_id.map(Uuid::from))
        .bind(movement.occurred_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_movement", e))?;
        Ok(())
    }

    async fn movements(&mut self, ingredient: Option<IngredientId>) -> StoreResult<Vec<StockMovement>> {
        let found = sqlx::query(
            "SELECT * FROM stock_movements WHERE ($1::uuid IS NULL OR ingredient_id = $1) \
             ORDER BY occurred_at DESC, id DESC",
        )
        .bind(ingredient.map(Uuid::from))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("movements", e))?;
        rows(found, movement_row)
    }

    async fn recipe(&mut self, product_id: ProductId) -> StoreResult<Vec<RecipeLine>> {
        let found = sqlx::query("SELECT * FROM recipe_lines WHERE product_id = $1 ORDER BY id")
            .bind(*product_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("recipe", e))?;
        rows(found, recipe_line_row)
    }

    async fn insert_recipe_line(&mut self, line: &RecipeLine) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO recipe_lines (id, product_id, ingredient_id, quantity_required_milli, usage_unit) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(*line.id.as_uuid())
        .bind(*line.product_id.as_uuid())
        .bind(*line.ingredient_id.as_uuid())
        .bind(line.quantity_required.milli())
        .bind(line.usage_unit.map(|u| u.as_str()))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_recipe_line", e))?;
        Ok(())
    }

    async fn delete_recipe_line(&mut self, id: RecipeLineId) -> StoreResult<bool> {
        let done = sqlx::query("DELETE FROM recipe_lines WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_recipe_line", e))?;
        Ok(done.rows_affected() > 0)
    }

    async fn production_orders(&mut self) -> StoreResult<Vec<ProductionOrder>> {
        let found = sqlx::query("SELECT * FROM production_orders ORDER BY created_at DESC, id DESC")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("production_orders", e))?;
        rows(found, production_order_row)
    }

    async fn production_order(&mut self, id: ProductionOrderId) -> StoreResult<Option<ProductionOrder>> {
        sqlx::query("SELECT * FROM production_orders WHERE id = $1 FOR UPDATE")
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("production_order", e))?
            .as_ref()
            .map(production_order_row)
            .transpose()
    }

    async fn insert_production_order(&mut self, order: &ProductionOrder) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO production_orders (id, product_id, quantity, status, batch_code, \
             assigned_baker_id, estimated_finish, created_at, finished_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(*order.id.as_uuid())
        .bind(*order.product_id.as_uuid())
        .bind(order.quantity)
        .bind(order.status.as_str())
        .bind(&order.batch_code)
        .bind(order.assigned_baker_id.map(Uuid::from))
        .bind(order.estimated_finish)
        .bind(order.created_at)
        .bind(order.finished_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_production_order", e))?;
        Ok(())
    }

    async fn update_production_order(&mut self, order: &ProductionOrder) -> StoreResult<()> {
        sqlx::query(
            "UPDATE production_orders SET status = $2, assigned_baker_id = $3, estimated_finish = $4, \
             finished_at = $5 WHERE id = $1",
        )
        .bind(*order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.assigned_baker_id.map(Uuid::from))
        .bind(order.estimated_finish)
        .bind(order.finished_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_production_order", e))?;
        Ok(())
    }

    async fn delete_production_order(&mut self, id: ProductionOrderId) -> StoreResult<bool> {
        let done = sqlx::query("DELETE FROM production_orders WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_production_order", e))?;
        Ok(done.rows_affected() > 0)
    }

    async fn orders(&mut self, filter: &OrderFilter) -> StoreResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE ($1::uuid IS NULL OR user_id = $1) \
             AND ($2::text IS NULL OR fulfillment = $2) \
             AND ($3::timestamptz IS NULL OR scheduled_for >= $3) \
             AND ($4::timestamptz IS NULL OR scheduled_for <= $4) \
             AND ($5::timestamptz IS NULL OR placed_at >= $5) \
             ORDER BY placed_at DESC, id DESC"
        );
        let found = sqlx::query(&sql)
            .bind(filter.user_id.map(Uuid::from))
            .bind(filter.fulfillment.map(|f| f.as_str()))
            .bind(filter.scheduled_from)
            .bind(filter.scheduled_to)
            .bind(filter.placed_from)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("orders", e))?;
        let mut orders = rows(found, order_row)?;
        self.attach_lines(&mut orders).await?;
        Ok(orders)
    }

    async fn order(&mut self, id: OrderId) -> StoreResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
        let found = sqlx::query(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("order", e))?;
        let Some(row) = found else {
            return Ok(None);
        };
        let mut orders = vec![order_row(&row)?];
        self.attach_lines(&mut orders).await?;
        Ok(orders.pop())
    }

    async fn insert_order(&mut self, order: &Order) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO orders ({ORDER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        );
        sqlx::query(&sql)
            .bind(*order.id.as_uuid())
            .bind(order.user_id.map(Uuid::from))
            .bind(order.fulfillment.as_str())
            .bind(order.scheduled_for)
            .bind(&order.delivery_address)
            .bind(&order.address_reference)
            .bind(&order.notes)
            .bind(order.products_total.cents())
            .bind(order.shipping_cost.cents())
            .bind(order.total.cents())
            .bind(order.status.as_str())
            .bind(order.placed_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order", e))?;

        for (position, line) in order.lines.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_lines (order_id, position, product_id, quantity, unit_price, \
                 subtotal, customization) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(*order.id.as_uuid())
            .bind(position as i32)
            .bind(*line.product_id.as_uuid())
            .bind(line.quantity)
            .bind(line.unit_price.cents())
            .bind(line.subtotal.cents())
            .bind(&line.customization)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order_line", e))?;
        }
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> StoreResult<()> {
        sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(*order.id.as_uuid())
            .bind(order.status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_order", e))?;
        Ok(())
    }

    async fn payments(&mut self, order_id: OrderId) -> StoreResult<Vec<Payment>> {
        let found = sqlx::query("SELECT * FROM payments WHERE order_id = $1 ORDER BY paid_at, id")
            .bind(*order_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("payments", e))?;
        rows(found, payment_row)
    }

    async fn insert_payment(&mut self, payment: &Payment) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO payments (id, order_id, method, amount, status, paid_at, receipt_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(*payment.id.as_uuid())
        .bind(*payment.order_id.as_uuid())
        .bind(payment.method.as_str())
        .bind(payment.amount.cents())
        .bind(payment.status.as_str())
        .bind(payment.paid_at)
        .bind(&payment.receipt_url)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_payment", e))?;
        Ok(())
    }

    async fn update_payment(&mut self, payment: &Payment) -> StoreResult<()> {
        sqlx::query("UPDATE payments SET status = $2, paid_at = $3, receipt_url = $4 WHERE id = $1")
            .bind(*payment.id.as_uuid())
            .bind(payment.status.as_str())
            .bind(payment.paid_at)
            .bind(&payment.receipt_url)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_payment", e))?;
        Ok(())
    }

    async fn delivery(&mut self, id: DeliveryId) -> StoreResult<Option<Delivery>> {
        sqlx::query("SELECT * FROM deliveries WHERE id = $1 FOR UPDATE")
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delivery", e))?
            .as_ref()
            .map(delivery_row)
            .transpose()
    }

    async fn delivery_for_order(&mut self, order_id: OrderId) -> StoreResult<Option<Delivery>> {
        sqlx::query("SELECT * FROM deliveries WHERE order_id = $1 FOR UPDATE")
            .bind(*order_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delivery_for_order", e))?
            .as_ref()
            .map(delivery_row)
            .transpose()
    }

    async fn peek_delivery_for_order(&mut self, order_id: OrderId) -> StoreResult<Option<Delivery>> {
        sqlx::query("SELECT * FROM deliveries WHERE order_id = $1")
            .bind(*order_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("peek_delivery_for_order", e))?
            .as_ref()
            .map(delivery_row)
            .transpose()
    }

    async fn deliveries(&mut self, filter: DeliveryFilter) -> StoreResult<Vec<Delivery>> {
        let query = match filter {
            DeliveryFilter::Available => {
                sqlx::query("SELECT * FROM deliveries WHERE driver_id IS NULL AND status <> 'cancelled'")
            }
            DeliveryFilter::Driver(driver_id) => {
                sqlx::query("SELECT * FROM deliveries WHERE driver_id = $1").bind(*driver_id.as_uuid())
            }
        };
        let found = query
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("deliveries", e))?;
        rows(found, delivery_row)
    }

    async fn insert_delivery(&mut self, delivery: &Delivery) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO deliveries (id, order_id, driver_id, status, departed_at, delivered_at, evidence_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(*delivery.id.as_uuid())
        .bind(*delivery.order_id.as_uuid())
        .bind(delivery.driver_id.map(Uuid::from))
        .bind(delivery.status.as_str())
        .bind(delivery.departed_at)
        .bind(delivery.delivered_at)
        .bind(&delivery.evidence_url)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_delivery", e))?;
        Ok(())
    }

    async fn update_delivery(&mut self, delivery: &Delivery) -> StoreResult<()> {
        sqlx::query(
            "UPDATE deliveries SET driver_id = $2, status = $3, departed_at = $4, delivered_at = $5, \
             evidence_url = $6 WHERE id = $1",
        )
        .bind(*delivery.id.as_uuid())
        .bind(delivery.driver_id.map(Uuid::from))
        .bind(delivery.status.as_str())
        .bind(delivery.departed_at)
        .bind(delivery.delivered_at)
        .bind(&delivery.evidence_url)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_delivery", e))?;
        Ok(())
    }

    async fn claim_delivery(&mut self, id: DeliveryId, driver_id: UserId) -> StoreResult<bool> {
        let done = sqlx::query(
            "UPDATE deliveries SET driver_id = $2, status = 'assigned' \
             WHERE id = $1 AND driver_id IS NULL AND status <> 'cancelled'",
        )
        .bind(*id.as_uuid())
        .bind(*driver_id.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("claim_delivery", e))?;
        Ok(done.rows_affected() == 1)
    }
}
