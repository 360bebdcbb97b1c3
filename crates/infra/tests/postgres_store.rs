#![cfg(feature = "postgres")]

use std::sync::Arc;

use chrono::{Duration, Utc};

use bakery_auth::{Hs256Jwt, Principal, Role};
use bakery_catalog::ProductDraft;
use bakery_core::{DomainError, Money};
use bakery_delivery::DeliveryStatus;
use bakery_infra::services::{PlaceOrder, PlaceOrderLine, Registration};
use bakery_infra::store::PgStore;
use bakery_infra::{NoopPublisher, ServiceError, Services};
use bakery_sales::Fulfillment;

async fn maybe_store() -> Option<PgStore> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let store = PgStore::connect(&url, 4).await.ok()?;
    store.migrate().await.expect("schema should apply");
    sqlx::query(
        "TRUNCATE deliveries, payments, order_lines, orders, production_orders, recipe_lines, \
         stock_movements, ingredients, suppliers, products, categories, users",
    )
    .execute(store.pool())
    .await
    .expect("truncate should succeed");
    Some(store)
}

fn services(store: PgStore) -> Services {
    let jwt = Arc::new(Hs256Jwt::new(b"pg-test-secret", Duration::hours(1)));
    Services::new(Arc::new(store), Arc::new(NoopPublisher), jwt).with_password_cost(4)
}

async fn account(services: &Services, email: &str) -> Principal {
    let id = services
        .register(Registration {
            full_name: email.to_string(),
            email: email.to_string(),
            password: "secret1".to_string(),
            phone: None,
            default_address: None,
        })
        .await
        .expect("register");
    Principal::new(id, Role::Customer)
}

#[tokio::test]
async fn postgres_order_flow_is_atomic_and_claims_once() {
    let Some(store) = maybe_store().await else {
        eprintln!("Skipping postgres_order_flow_is_atomic_and_claims_once: TEST_DATABASE_URL is not set or unreachable.");
        return;
    };
    let services = services(store);

    let customer = account(&services, "pg-customer@bakery.test").await;
    let dup = services
        .register(Registration {
            full_name: "Again".into(),
            email: "PG-customer@bakery.test".into(),
            password: "secret1".into(),
            phone: None,
            default_address: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(dup, ServiceError::Domain(DomainError::Conflict(_))));

    let category = services.create_category("Panes", None).await.expect("category");
    let bread = services
        .create_product(ProductDraft {
            name: "Pan".into(),
            description: None,
            base_price: Money::from_cents(50),
            category_id: category.id,
            image_url: None,
            customizable: false,
            showcase_stock: 5,
        })
        .await
        .expect("product");

    let order = |quantity| PlaceOrder {
        user_id: None,
        fulfillment: Fulfillment::Delivery,
        scheduled_for: Utc::now(),
        delivery_address: Some("Av. Sol 1".into()),
        address_reference: None,
        lines: vec![PlaceOrderLine {
            product_id: bread.id,
            quantity,
            customization: None,
        }],
        notes: None,
        shipping_cost: Some(Money::from_cents(300)),
        payment_method: None,
        driver_id: None,
    };

    let err = services.place_order(&customer, order(6)).await.unwrap_err();
    assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));
    assert_eq!(services.get_product(bread.id).await.unwrap().product.showcase_stock, 5);

    let placed = services.place_order(&customer, order(3)).await.expect("place");
    assert_eq!(placed.order.total, Money::from_cents(450));
    assert_eq!(placed.order.lines.len(), 1);
    assert_eq!(services.get_product(bread.id).await.unwrap().product.showcase_stock, 2);

    let admin_email = "pg-admin@bakery.test";
    services.ensure_admin(admin_email, "admin123").await.expect("admin");
    let first = services
        .create_user(bakery_auth::NewUser {
            full_name: "Driver One".into(),
            email: "d1@bakery.test".into(),
            password: "secret1".into(),
            role: Role::Driver,
            phone: None,
            default_address: None,
        })
        .await
        .expect("driver");
    let second = services
        .create_user(bakery_auth::NewUser {
            full_name: "Driver Two".into(),
            email: "d2@bakery.test".into(),
            password: "secret1".into(),
            role: Role::Driver,
            phone: None,
            default_address: None,
        })
        .await
        .expect("driver");

    let delivery_id = placed.delivery.expect("delivery").id;
    let first = Principal::new(first.id, Role::Driver);
    let second = Principal::new(second.id, Role::Driver);
    let claimed = services.claim_delivery(&first, delivery_id).await.expect("claim");
    assert_eq!(claimed.status, DeliveryStatus::Assigned);
    let lost = services.claim_delivery(&second, delivery_id).await.unwrap_err();
    assert!(matches!(lost, ServiceError::Domain(DomainError::Conflict(_))));
}
