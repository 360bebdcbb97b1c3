//! Shared fixtures for service tests: an in-memory store, a cheap bcrypt
//! cost and a publisher that records what was sent.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Duration;

use bakery_auth::{Hs256Jwt, NewUser, Principal, Role};
use bakery_catalog::ProductDraft;
use bakery_core::{IngredientId, Money, ProductId, Quantity};
use bakery_events::EventEnvelope;
use bakery_inventory::{IngredientDraft, Unit};

use super::Services;
use crate::publish::EventPublisher;
use crate::store::memory::InMemoryStore;

#[derive(Default)]
pub(crate) struct RecordingPublisher {
    sent: Mutex<Vec<EventEnvelope>>,
}

impl RecordingPublisher {
    pub(crate) fn types(&self) -> Vec<String> {
        self.sent
            .lock()
            .map(|sent| sent.iter().map(|e| e.event_type().to_string()).collect())
            .unwrap_or_default()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, envelope: EventEnvelope) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(envelope);
        }
    }
}

pub(crate) struct TestEnv {
    pub services: Services,
    pub events: Arc<RecordingPublisher>,
    seq: AtomicUsize,
}

impl TestEnv {
    pub(crate) fn new() -> Self {
        let events = Arc::new(RecordingPublisher::default());
        let jwt = Arc::new(Hs256Jwt::new(b"test-secret", Duration::hours(1)));
        let services = Services::new(Arc::new(InMemoryStore::new()), events.clone(), jwt)
            .with_password_cost(4);
        Self {
            services,
            events,
            seq: AtomicUsize::new(0),
        }
    }

    fn next(&self) -> usize {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    /// A fresh active account with the given role.
    pub(crate) async fn user(&self, role: Role) -> Principal {
        let n = self.next();
        let profile = self
            .services
            .create_user(new_user(
                &format!("{} {n}", role.as_str()),
                &format!("{}{n}@bakery.test", role.as_str()),
                role,
            ))
            .await
            .unwrap();
        Principal::new(profile.id, role)
    }

    /// An active product in its own category.
    pub(crate) async fn product(&self, name: &str, stock: i64, price_cents: i64) -> ProductId {
        let category = self
            .services
            .create_category(&format!("Category {}", self.next()), None)
            .await
            .unwrap();
        self.services
            .create_product(ProductDraft {
                name: name.to_string(),
                description: None,
                base_price: Money::from_cents(price_cents),
                category_id: category.id,
                image_url: None,
                customizable: false,
                showcase_stock: stock,
            })
            .await
            .unwrap()
            .id
    }

    /// An ingredient measured in kilograms.
    pub(crate) async fn ingredient(&self, name: &str, stock: Quantity) -> IngredientId {
        let admin = self.user(Role::Admin).await;
        self.services
            .create_ingredient(
                &admin,
                IngredientDraft {
                    name: name.to_string(),
                    description: None,
                    unit: Unit::Kg,
                    min_stock: None,
                    preferred_supplier_id: None,
                    stock: Some(stock),
                    avg_cost: None,
                },
            )
            .await
            .unwrap()
            .id
    }
}

pub(crate) fn new_user(full_name: &str, email: &str, role: Role) -> NewUser {
    NewUser {
        full_name: full_name.to_string(),
        email: email.to_string(),
        password: "secret1".to_string(),
        role,
        phone: None,
        default_address: None,
    }
}
