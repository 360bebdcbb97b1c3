//! Application services: one method per use case.
//!
//! Each state-changing method opens a unit of work, runs domain logic,
//! commits, and only then publishes the resulting event envelopes. Callers
//! are expected to have checked route-level permissions already; services
//! enforce the rules that depend on the data (ownership, assignment,
//! acting on behalf of another user).

use std::sync::Arc;

use bakery_auth::{DEFAULT_COST, Hs256Jwt};
use bakery_events::EventEnvelope;

use crate::error::ServiceResult;
use crate::publish::EventPublisher;
use crate::store::{Store, UnitOfWork};

mod auth;
mod catalog;
mod deliveries;
mod inventory;
mod orders;
mod production;
mod recipes;
mod reports;
mod users;

pub use auth::{LoginResult, Registration, SessionUser};
pub use catalog::{ProductDetail, ProductView};
pub use deliveries::{DeliveryView, DispatchDelivery, DispatchEntry};
pub use inventory::IngredientView;
pub use orders::{OrderView, PlaceOrder, PlaceOrderLine};
pub use production::ProductionOrderView;
pub use recipes::{NewRecipeLine, RecipeLineView};
pub use users::{CustomerSummary, UserProfile};

pub struct Services {
    store: Arc<dyn Store>,
    events: Arc<dyn EventPublisher>,
    jwt: Arc<Hs256Jwt>,
    password_cost: u32,
}

impl Services {
    pub fn new(store: Arc<dyn Store>, events: Arc<dyn EventPublisher>, jwt: Arc<Hs256Jwt>) -> Self {
        Self {
            store,
            events,
            jwt,
            password_cost: DEFAULT_COST,
        }
    }

    /// Override the bcrypt cost (tests use the minimum).
    pub fn with_password_cost(mut self, cost: u32) -> Self {
        self.password_cost = cost;
        self
    }

    pub fn jwt(&self) -> Arc<Hs256Jwt> {
        Arc::clone(&self.jwt)
    }

    async fn begin(&self) -> ServiceResult<Box<dyn UnitOfWork>> {
        Ok(self.store.begin().await?)
    }

    fn publish(&self, envelopes: Vec<EventEnvelope>) {
        for envelope in envelopes {
            self.events.publish(envelope);
        }
    }
}

#[cfg(test)]
pub(crate) mod testkit;
