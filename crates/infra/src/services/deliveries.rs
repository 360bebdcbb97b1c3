use chrono::{DateTime, Utc};
use serde::Serialize;

use bakery_auth::{Principal, Role};
use bakery_core::{Aggregate, DeliveryId, OrderId, UserId};
use bakery_delivery::{Delivery, DeliveryCommand, DeliveryStatus, UpdateDeliveryStatus};
use bakery_events::EventEnvelope;
use bakery_sales::{ChangeOrderStatus, Fulfillment, Order, OrderCommand, OrderStatus};

use super::orders::{OrderView, order_view};
use super::{CustomerSummary, Services};
use crate::error::{ServiceError, ServiceResult};
use crate::store::{DeliveryFilter, OrderFilter, UnitOfWork};

/// Delivery side of a dispatch row. Orders without a delivery yet show
/// `id: null` and status `pending`.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchDelivery {
    pub id: Option<DeliveryId>,
    pub status: String,
    pub driver_id: Option<UserId>,
    pub driver_name: Option<String>,
    pub departed_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub evidence_url: Option<String>,
}

impl DispatchDelivery {
    fn pending() -> Self {
        Self {
            id: None,
            status: "pending".to_string(),
            driver_id: None,
            driver_name: None,
            departed_at: None,
            delivered_at: None,
            evidence_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchEntry {
    #[serde(flatten)]
    pub order: Order,
    pub customer: Option<CustomerSummary>,
    pub delivery: DispatchDelivery,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryView {
    #[serde(flatten)]
    pub delivery: Delivery,
    pub order: OrderView,
}

async fn delivery_views(
    uow: &mut dyn UnitOfWork,
    deliveries: Vec<Delivery>,
) -> ServiceResult<Vec<DeliveryView>> {
    let mut views = Vec::with_capacity(deliveries.len());
    for delivery in deliveries {
        let Some(order) = uow.order(delivery.order_id).await? else {
            tracing::warn!(delivery_id = %delivery.id, order_id = %delivery.order_id, "delivery without order");
            continue;
        };
        let order = order_view(uow, order).await?;
        views.push(DeliveryView { delivery, order });
    }
    views.sort_by_key(|v| (v.order.order.scheduled_for, v.delivery.id));
    Ok(views)
}

fn delivery_envelope(delivery: &Delivery, event: &bakery_delivery::DeliveryEvent) -> EventEnvelope {
    EventEnvelope::wrap("delivery", *delivery.id.as_uuid(), event)
}

impl Services {
    /// Every delivery-type order in the scheduled window, newest scheduled first.
    pub async fn list_dispatch(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> ServiceResult<Vec<DispatchEntry>> {
        let mut uow = self.begin().await?;
        let mut orders = uow
            .orders(&OrderFilter {
                fulfillment: Some(Fulfillment::Delivery),
                scheduled_from: from,
                scheduled_to: to,
                ..OrderFilter::default()
            })
            .await?;
        orders.sort_by(|a, b| b.scheduled_for.cmp(&a.scheduled_for));

        let users = uow.users().await?;
        let mut entries = Vec::with_capacity(orders.len());
        for order in orders {
            let delivery = match uow.peek_delivery_for_order(order.id).await? {
                Some(d) => DispatchDelivery {
                    id: Some(d.id),
                    status: d.status.as_str().to_string(),
                    driver_name: d
                        .driver_id
                        .and_then(|id| users.iter().find(|u| u.id == id))
                        .map(|u| u.full_name.clone()),
                    driver_id: d.driver_id,
                    departed_at: d.departed_at,
                    delivered_at: d.delivered_at,
                    evidence_url: d.evidence_url,
                },
                None => DispatchDelivery::pending(),
            };
            let customer = order
                .user_id
                .and_then(|id| users.iter().find(|u| u.id == id))
                .map(CustomerSummary::from);
            entries.push(DispatchEntry {
                order,
                customer,
                delivery,
            });
        }
        Ok(entries)
    }

    /// Assign (or reassign) a driver, opening the delivery when the order has none.
    pub async fn assign_delivery(&self, order_id: OrderId, driver_id: UserId) -> ServiceResult<Delivery> {
        let mut uow = self.begin().await?;
        let order = uow.order(order_id).await?.ok_or_else(|| ServiceError::not_found("order"))?;
        if !order.is_delivery() {
            return Err(ServiceError::validation("only delivery orders can be assigned"));
        }
        let is_driver = uow
            .user(driver_id)
            .await?
            .is_some_and(|u| u.is_active_with_role(Role::Driver));
        if !is_driver {
            return Err(ServiceError::validation("driver must be an active driver"));
        }

        let existing = uow.delivery_for_order(order_id).await?;
        let is_new = existing.is_none();
        let mut delivery = existing.unwrap_or_else(|| Delivery::open(order_id, None));
        let events = delivery.execute(&DeliveryCommand::Assign {
            driver_id,
            occurred_at: Utc::now(),
        })?;
        if is_new {
            uow.insert_delivery(&delivery).await?;
        } else {
            uow.update_delivery(&delivery).await?;
        }
        uow.commit().await?;

        tracing::info!(delivery_id = %delivery.id, order_id = %order_id, driver_id = %driver_id, "delivery assigned");
        self.publish(events.iter().map(|e| delivery_envelope(&delivery, e)).collect());
        Ok(delivery)
    }

    /// Unassigned deliveries any driver may claim, earliest scheduled first.
    pub async fn available_deliveries(&self) -> ServiceResult<Vec<DeliveryView>> {
        let mut uow = self.begin().await?;
        let deliveries = uow.deliveries(DeliveryFilter::Available).await?;
        delivery_views(uow.as_mut(), deliveries).await
    }

    /// Deliveries held by the caller, earliest scheduled first.
    pub async fn my_deliveries(&self, actor: &Principal) -> ServiceResult<Vec<DeliveryView>> {
        let mut uow = self.begin().await?;
        let deliveries = uow.deliveries(DeliveryFilter::Driver(actor.user_id)).await?;
        delivery_views(uow.as_mut(), deliveries).await
    }

    /// Take an unassigned delivery. Only one of several racing drivers wins.
    pub async fn claim_delivery(&self, actor: &Principal, id: DeliveryId) -> ServiceResult<Delivery> {
        let mut uow = self.begin().await?;
        let mut delivery = uow.delivery(id).await?.ok_or_else(|| ServiceError::not_found("delivery"))?;
        let events = delivery.handle(&DeliveryCommand::Claim {
            driver_id: actor.user_id,
            occurred_at: Utc::now(),
        })?;
        if !uow.claim_delivery(id, actor.user_id).await? {
            return Err(ServiceError::conflict("delivery already taken"));
        }
        for event in &events {
            delivery.apply(event);
        }
        uow.commit().await?;

        tracing::info!(delivery_id = %id, driver_id = %actor.user_id, "delivery claimed");
        self.publish(events.iter().map(|e| delivery_envelope(&delivery, e)).collect());
        Ok(delivery)
    }

    /// Driver progress report. The order follows the delivery to `on_route`
    /// or `delivered` in the same unit of work.
    pub async fn update_delivery_status(
        &self,
        actor: &Principal,
        id: DeliveryId,
        status: DeliveryStatus,
        evidence_url: Option<String>,
    ) -> ServiceResult<Delivery> {
        let now = Utc::now();
        let mut uow = self.begin().await?;
        let mut delivery = uow.delivery(id).await?.ok_or_else(|| ServiceError::not_found("delivery"))?;
        let events = delivery.execute(&DeliveryCommand::UpdateStatus(UpdateDeliveryStatus {
            actor: actor.user_id,
            actor_is_admin: actor.is_admin(),
            status,
            evidence_url,
            occurred_at: now,
        }))?;
        if events.is_empty() {
            return Ok(delivery);
        }
        let mut envelopes: Vec<EventEnvelope> =
            events.iter().map(|e| delivery_envelope(&delivery, e)).collect();
        uow.update_delivery(&delivery).await?;

        let order_status = match delivery.status {
            DeliveryStatus::OnRoute => Some(OrderStatus::OnRoute),
            DeliveryStatus::Delivered => Some(OrderStatus::Delivered),
            _ => None,
        };
        if let Some(order_status) = order_status {
            let mut order = uow
                .order(delivery.order_id)
                .await?
                .ok_or_else(|| ServiceError::not_found("order"))?;
            let order_events = order.execute(&OrderCommand::ChangeStatus(ChangeOrderStatus {
                status: order_status,
                occurred_at: now,
            }))?;
            if !order_events.is_empty() {
                uow.update_order(&order).await?;
            }
            envelopes.extend(
                order_events
                    .iter()
                    .map(|e| EventEnvelope::wrap("order", *order.id.as_uuid(), e)),
            );
        }
        uow.commit().await?;

        tracing::info!(delivery_id = %id, status = %delivery.status, driver_id = %actor.user_id, "delivery status changed");
        self.publish(envelopes);
        Ok(delivery)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use bakery_core::{DomainError, Money};
    use crate::services::testkit::TestEnv;
    use crate::services::{PlaceOrder, PlaceOrderLine};

    async fn delivery_order(env: &TestEnv, customer: &Principal) -> OrderView {
        let bread = env.product("Pan", 20, 50).await;
        env.services
            .place_order(
                customer,
                PlaceOrder {
                    user_id: None,
                    fulfillment: Fulfillment::Delivery,
                    scheduled_for: Utc::now(),
                    delivery_address: Some("Calle Real 12".into()),
                    address_reference: None,
                    lines: vec![PlaceOrderLine {
                        product_id: bread,
                        quantity: 2,
                        customization: None,
                    }],
                    notes: None,
                    shipping_cost: Some(Money::from_cents(500)),
                    payment_method: None,
                    driver_id: None,
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn only_one_driver_wins_a_claim() {
        let env = TestEnv::new();
        let customer = env.user(Role::Customer).await;
        let first = env.user(Role::Driver).await;
        let second = env.user(Role::Driver).await;
        let order = delivery_order(&env, &customer).await;
        let delivery_id = order.delivery.unwrap().id;

        assert_eq!(env.services.available_deliveries().await.unwrap().len(), 1);
        let claimed = env.services.claim_delivery(&first, delivery_id).await.unwrap();
        assert_eq!(claimed.driver_id, Some(first.user_id));
        assert_eq!(claimed.status, DeliveryStatus::Assigned);

        let err = env.services.claim_delivery(&second, delivery_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));
        assert!(env.services.available_deliveries().await.unwrap().is_empty());
        assert_eq!(env.services.my_deliveries(&first).await.unwrap().len(), 1);
        assert!(env.services.my_deliveries(&second).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_drivers_produce_one_assignment() {
        let env = Arc::new(TestEnv::new());
        let customer = env.user(Role::Customer).await;
        let order = delivery_order(&env, &customer).await;
        let delivery_id = order.delivery.unwrap().id;
        let mut drivers = Vec::new();
        for _ in 0..8 {
            drivers.push(env.user(Role::Driver).await);
        }

        let handles: Vec<_> = drivers
            .iter()
            .copied()
            .map(|driver| {
                let env = Arc::clone(&env);
                tokio::spawn(async move { env.services.claim_delivery(&driver, delivery_id).await })
            })
            .collect();

        let mut winners = Vec::new();
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(delivery) => winners.push(delivery.driver_id),
                Err(ServiceError::Domain(DomainError::Conflict(_))) => conflicts += 1,
                Err(other) => panic!("unexpected claim error: {other}"),
            }
        }
        assert_eq!(winners.len(), 1);
        assert_eq!(conflicts, drivers.len() - 1);

        let mut owners = Vec::new();
        for driver in &drivers {
            if !env.services.my_deliveries(driver).await.unwrap().is_empty() {
                owners.push(Some(driver.user_id));
            }
        }
        assert_eq!(owners, winners);
        assert!(env.services.available_deliveries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn driver_progress_moves_the_order() {
        let env = TestEnv::new();
        let customer = env.user(Role::Customer).await;
        let driver = env.user(Role::Driver).await;
        let order = delivery_order(&env, &customer).await;
        let delivery_id = order.delivery.unwrap().id;
        env.services.claim_delivery(&driver, delivery_id).await.unwrap();

        let on_route = env
            .services
            .update_delivery_status(&driver, delivery_id, DeliveryStatus::OnRoute, None)
            .await
            .unwrap();
        assert!(on_route.departed_at.is_some());

        let done = env
            .services
            .update_delivery_status(
                &driver,
                delivery_id,
                DeliveryStatus::Delivered,
                Some("/uploads/proof.jpg".into()),
            )
            .await
            .unwrap();
        assert!(done.delivered_at.is_some());
        assert_eq!(done.evidence_url.as_deref(), Some("/uploads/proof.jpg"));

        let mine = env.services.list_my_orders(&customer).await.unwrap();
        assert_eq!(mine[0].order.status, OrderStatus::Delivered);
        assert_eq!(
            env.events.types(),
            vec![
                "order.placed",
                "delivery.claimed",
                "delivery.status_changed",
                "order.status_changed",
                "delivery.status_changed",
                "order.status_changed",
            ]
        );
    }

    #[tokio::test]
    async fn other_drivers_cannot_report_progress() {
        let env = TestEnv::new();
        let customer = env.user(Role::Customer).await;
        let driver = env.user(Role::Driver).await;
        let intruder = env.user(Role::Driver).await;
        let order = delivery_order(&env, &customer).await;
        let delivery_id = order.delivery.unwrap().id;
        env.services.claim_delivery(&driver, delivery_id).await.unwrap();

        let err = env
            .services
            .update_delivery_status(&intruder, delivery_id, DeliveryStatus::OnRoute, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Unauthorized)));
    }

    #[tokio::test]
    async fn assign_requires_an_active_driver_and_blocks_on_route() {
        let env = TestEnv::new();
        let customer = env.user(Role::Customer).await;
        let baker = env.user(Role::Baker).await;
        let driver = env.user(Role::Driver).await;
        let order = delivery_order(&env, &customer).await;

        let err = env
            .services
            .assign_delivery(order.order.id, baker.user_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));

        let delivery = env.services.assign_delivery(order.order.id, driver.user_id).await.unwrap();
        assert_eq!(delivery.status, DeliveryStatus::Assigned);
        env.services
            .update_delivery_status(&driver, delivery.id, DeliveryStatus::OnRoute, None)
            .await
            .unwrap();

        let other = env.user(Role::Driver).await;
        let err = env
            .services
            .assign_delivery(order.order.id, other.user_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn dispatch_lists_delivery_orders_with_their_delivery() {
        let env = TestEnv::new();
        let customer = env.user(Role::Customer).await;
        let order = delivery_order(&env, &customer).await;

        let entries = env.services.list_dispatch(None, None).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].order.id, order.order.id);
        assert_eq!(entries[0].delivery.status, "preparing");
        assert_eq!(entries[0].customer.as_ref().map(|c| c.id), Some(customer.user_id));

        let future = Utc::now() + chrono::Duration::days(2);
        assert!(env.services.list_dispatch(Some(future), None).await.unwrap().is_empty());
    }
}
