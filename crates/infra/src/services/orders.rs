use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bakery_auth::{Permission, Principal, Role, authorize};
use bakery_core::{Aggregate, DomainError, Money, OrderId, ProductId, UserId};
use bakery_delivery::{Delivery, DeliveryCommand};
use bakery_events::EventEnvelope;
use bakery_sales::{
    ChangeOrderStatus, Fulfillment, Order, OrderCommand, OrderDraft, OrderLine, OrderStatus,
    Payment, PaymentMethod, PaymentStatus,
};

use super::{CustomerSummary, Services};
use crate::error::{ServiceError, ServiceResult};
use crate::store::{OrderFilter, UnitOfWork};

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub customization: Option<String>,
}

/// Checkout request. Line prices always come from the catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrder {
    /// Customer the order is for; defaults to the caller.
    pub user_id: Option<UserId>,
    pub fulfillment: Fulfillment,
    pub scheduled_for: DateTime<Utc>,
    pub delivery_address: Option<String>,
    pub address_reference: Option<String>,
    pub lines: Vec<PlaceOrderLine>,
    pub notes: Option<String>,
    pub shipping_cost: Option<Money>,
    pub payment_method: Option<PaymentMethod>,
    /// Pre-assign a driver to the delivery.
    pub driver_id: Option<UserId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub customer: Option<CustomerSummary>,
    pub payments: Vec<Payment>,
    pub delivery: Option<Delivery>,
}

pub(super) async fn order_view(uow: &mut dyn UnitOfWork, order: Order) -> ServiceResult<OrderView> {
    let customer = match order.user_id {
        Some(id) => uow.user(id).await?.as_ref().map(CustomerSummary::from),
        None => None,
    };
    let payments = uow.payments(order.id).await?;
    let delivery = uow.peek_delivery_for_order(order.id).await?;
    Ok(OrderView {
        order,
        customer,
        payments,
        delivery,
    })
}

async fn order_views(uow: &mut dyn UnitOfWork, orders: Vec<Order>) -> ServiceResult<Vec<OrderView>> {
    let mut views = Vec::with_capacity(orders.len());
    for order in orders {
        views.push(order_view(uow, order).await?);
    }
    Ok(views)
}

fn order_envelope(order_id: OrderId, event: &bakery_sales::OrderEvent) -> EventEnvelope {
    EventEnvelope::wrap("order", *order_id.as_uuid(), event)
}

impl Services {
    /// Place an order: price lines from the catalog, take showcase stock,
    /// open the delivery and record a pending payment, all or nothing.
    pub async fn place_order(&self, actor: &Principal, input: PlaceOrder) -> ServiceResult<OrderView> {
        let customer_id = input.user_id.unwrap_or(actor.user_id);
        if customer_id != actor.user_id || input.driver_id.is_some() {
            authorize(actor, &Permission::ORDERS_PLACE_FOR_OTHERS)?;
        }
        if input.lines.is_empty() {
            return Err(ServiceError::validation("an order needs at least one line"));
        }

        let now = Utc::now();
        let mut uow = self.begin().await?;

        if customer_id != actor.user_id && uow.user(customer_id).await?.is_none() {
            return Err(ServiceError::validation("customer does not exist"));
        }
        if let Some(driver_id) = input.driver_id {
            if input.fulfillment != Fulfillment::Delivery {
                return Err(ServiceError::validation("only delivery orders take a driver"));
            }
            let is_driver = uow
                .user(driver_id)
                .await?
                .is_some_and(|u| u.is_active_with_role(Role::Driver));
            if !is_driver {
                return Err(ServiceError::validation("driver must be an active driver"));
            }
        }

        // Rows are locked in id order so concurrent checkouts never deadlock.
        let mut wanted: BTreeMap<ProductId, i64> = BTreeMap::new();
        for requested in &input.lines {
            if requested.quantity <= 0 {
                return Err(ServiceError::validation("line quantity must be positive"));
            }
            let total = wanted.entry(requested.product_id).or_insert(0);
            *total = total
                .checked_add(requested.quantity)
                .ok_or_else(|| DomainError::invariant("line quantity overflow"))?;
        }
        let mut prices = BTreeMap::new();
        for (&product_id, &quantity) in &wanted {
            let mut product = uow
                .product(product_id)
                .await?
                .ok_or_else(|| ServiceError::validation(format!("product {product_id} does not exist")))?;
            product.ensure_sellable()?;
            product.withdraw(quantity).inspect_err(|e| {
                tracing::warn!(product_id = %product_id, requested = quantity, error = %e, "order rejected");
            })?;
            uow.update_product(&product).await?;
            prices.insert(product_id, product.base_price);
        }

        let mut lines = Vec::with_capacity(input.lines.len());
        for requested in input.lines {
            let unit_price = prices
                .get(&requested.product_id)
                .copied()
                .ok_or_else(|| DomainError::invariant("line priced without its product"))?;
            lines.push(OrderLine::priced(
                requested.product_id,
                requested.quantity,
                unit_price,
                requested.customization,
            )?);
        }

        let (order, placed) = Order::place(
            OrderDraft {
                user_id: Some(customer_id),
                fulfillment: input.fulfillment,
                scheduled_for: input.scheduled_for,
                delivery_address: input.delivery_address,
                address_reference: input.address_reference,
                notes: input.notes,
                shipping_cost: input.shipping_cost.unwrap_or(Money::ZERO),
                lines,
            },
            now,
        )?;
        uow.insert_order(&order).await?;

        if order.is_delivery() {
            uow.insert_delivery(&Delivery::open(order.id, input.driver_id)).await?;
        }

        let payment = Payment::pending(
            order.id,
            input.payment_method.unwrap_or_default(),
            order.total,
            now,
        );
        uow.insert_payment(&payment).await?;

        let view = order_view(uow.as_mut(), order).await?;
        uow.commit().await?;

        tracing::info!(
            order_id = %view.order.id,
            customer_id = %customer_id,
            total = %view.order.total,
            fulfillment = view.order.fulfillment.as_str(),
            "order placed"
        );
        self.publish(vec![order_envelope(view.order.id, &placed)]);
        Ok(view)
    }

    /// Every order, newest first.
    pub async fn list_orders(&self) -> ServiceResult<Vec<OrderView>> {
        let mut uow = self.begin().await?;
        let orders = uow.orders(&OrderFilter::default()).await?;
        order_views(uow.as_mut(), orders).await
    }

    /// Orders placed for the caller, newest first.
    pub async fn list_my_orders(&self, actor: &Principal) -> ServiceResult<Vec<OrderView>> {
        let mut uow = self.begin().await?;
        let orders = uow
            .orders(&OrderFilter {
                user_id: Some(actor.user_id),
                ..OrderFilter::default()
            })
            .await?;
        order_views(uow.as_mut(), orders).await
    }

    /// Change the order status. Cancelling returns the units to the showcase
    /// and cancels the delivery in the same unit of work.
    pub async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> ServiceResult<OrderView> {
        let now = Utc::now();
        let mut uow = self.begin().await?;
        let mut order = uow.order(id).await?.ok_or_else(|| ServiceError::not_found("order"))?;

        let events = order.execute(&OrderCommand::ChangeStatus(ChangeOrderStatus {
            status,
            occurred_at: now,
        }))?;
        let mut envelopes: Vec<EventEnvelope> = events.iter().map(|e| order_envelope(id, e)).collect();

        if !events.is_empty() && order.status == OrderStatus::Cancelled {
            let mut returned: BTreeMap<ProductId, i64> = BTreeMap::new();
            for (product_id, quantity) in order.quantities() {
                *returned.entry(product_id).or_insert(0) += quantity;
            }
            for (product_id, quantity) in returned {
                if let Some(mut product) = uow.product(product_id).await? {
                    product.restock(quantity)?;
                    uow.update_product(&product).await?;
                }
            }
            if let Some(mut delivery) = uow.delivery_for_order(id).await? {
                let delivery_events = delivery.execute(&DeliveryCommand::Cancel { occurred_at: now })?;
                uow.update_delivery(&delivery).await?;
                envelopes.extend(
                    delivery_events
                        .iter()
                        .map(|e| EventEnvelope::wrap("delivery", *delivery.id.as_uuid(), e)),
                );
            }
        }

        if !events.is_empty() {
            uow.update_order(&order).await?;
        }
        let view = order_view(uow.as_mut(), order).await?;
        uow.commit().await?;

        if !events.is_empty() {
            tracing::info!(order_id = %id, status = %status, "order status changed");
        }
        self.publish(envelopes);
        Ok(view)
    }

    /// Confirm the pending payment; a `pending_payment` order becomes `paid`.
    pub async fn confirm_payment(&self, id: OrderId) -> ServiceResult<OrderView> {
        let now = Utc::now();
        let mut uow = self.begin().await?;
        let mut order = uow.order(id).await?.ok_or_else(|| ServiceError::not_found("order"))?;

        let mut payment = uow
            .payments(id)
            .await?
            .into_iter()
            .find(|p| p.status == PaymentStatus::Pending)
            .ok_or_else(|| ServiceError::conflict("order has no pending payment"))?;

        let events = order.execute(&OrderCommand::MarkPaid { occurred_at: now })?;
        payment.confirm(now)?;
        uow.update_payment(&payment).await?;
        if !events.is_empty() {
            uow.update_order(&order).await?;
        }
        let view = order_view(uow.as_mut(), order).await?;
        uow.commit().await?;

        tracing::info!(order_id = %id, payment_id = %payment.id, amount = %payment.amount, "payment confirmed");
        self.publish(events.iter().map(|e| order_envelope(id, e)).collect());
        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use bakery_core::DomainError;
    use bakery_delivery::DeliveryStatus;
    use crate::services::testkit::TestEnv;

    fn pickup(lines: Vec<(ProductId, i64)>) -> PlaceOrder {
        PlaceOrder {
            user_id: None,
            fulfillment: Fulfillment::Pickup,
            scheduled_for: Utc::now(),
            delivery_address: None,
            address_reference: None,
            lines: lines
                .into_iter()
                .map(|(product_id, quantity)| PlaceOrderLine {
                    product_id,
                    quantity,
                    customization: None,
                })
                .collect(),
            notes: None,
            shipping_cost: Some(Money::from_cents(700)),
            payment_method: None,
            driver_id: None,
        }
    }

    fn delivery(lines: Vec<(ProductId, i64)>) -> PlaceOrder {
        PlaceOrder {
            fulfillment: Fulfillment::Delivery,
            delivery_address: Some("Av. Arequipa 100".into()),
            ..pickup(lines)
        }
    }

    #[tokio::test]
    async fn placing_prices_from_catalog_and_takes_stock() {
        let env = TestEnv::new();
        let customer = env.user(Role::Customer).await;
        let bread = env.product("Pan", 10, 50).await;
        let cake = env.product("Torta", 2, 4500).await;

        let view = env
            .services
            .place_order(&customer, delivery(vec![(bread, 4), (cake, 1)]))
            .await
            .unwrap();

        assert_eq!(view.order.products_total, Money::from_cents(4700));
        assert_eq!(view.order.shipping_cost, Money::from_cents(700));
        assert_eq!(view.order.total, Money::from_cents(5400));
        assert_eq!(view.order.user_id, Some(customer.user_id));
        assert_eq!(view.payments.len(), 1);
        assert_eq!(view.payments[0].status, PaymentStatus::Pending);
        assert_eq!(view.payments[0].method, PaymentMethod::Cash);
        assert_eq!(view.payments[0].amount, view.order.total);
        assert_eq!(view.delivery.as_ref().map(|d| d.status), Some(DeliveryStatus::Preparing));

        assert_eq!(env.services.get_product(bread).await.unwrap().product.showcase_stock, 6);
        assert_eq!(env.services.get_product(cake).await.unwrap().product.showcase_stock, 1);
        assert_eq!(env.events.types(), vec!["order.placed"]);
    }

    #[tokio::test]
    async fn insufficient_stock_persists_nothing() {
        let env = TestEnv::new();
        let customer = env.user(Role::Customer).await;
        let bread = env.product("Pan", 10, 50).await;
        let cake = env.product("Torta", 1, 4500).await;

        let err = env
            .services
            .place_order(&customer, pickup(vec![(bread, 3), (cake, 2)]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));

        assert_eq!(env.services.get_product(bread).await.unwrap().product.showcase_stock, 10);
        assert!(env.services.list_orders().await.unwrap().is_empty());
        assert!(env.events.types().is_empty());
    }

    #[tokio::test]
    async fn repeated_product_lines_draw_stock_together() {
        let env = TestEnv::new();
        let customer = env.user(Role::Customer).await;
        let bread = env.product("Pan", 5, 50).await;
        let cake = env.product("Torta", 3, 4500).await;

        let err = env
            .services
            .place_order(&customer, pickup(vec![(bread, 3), (cake, 1), (bread, 3)]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));
        assert_eq!(env.services.get_product(cake).await.unwrap().product.showcase_stock, 3);

        let view = env
            .services
            .place_order(&customer, pickup(vec![(cake, 1), (bread, 2), (bread, 3)]))
            .await
            .unwrap();
        assert_eq!(view.order.lines.len(), 3);
        assert_eq!(view.order.lines[0].product_id, cake);
        assert_eq!(view.order.products_total, Money::from_cents(4750));
        assert_eq!(env.services.get_product(bread).await.unwrap().product.showcase_stock, 0);

        env.services
            .update_order_status(view.order.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(env.services.get_product(bread).await.unwrap().product.showcase_stock, 5);
        assert_eq!(env.services.get_product(cake).await.unwrap().product.showcase_stock, 3);
    }

    #[tokio::test]
    async fn non_positive_quantities_are_rejected() {
        let env = TestEnv::new();
        let customer = env.user(Role::Customer).await;
        let bread = env.product("Pan", 5, 50).await;

        let err = env
            .services
            .place_order(&customer, pickup(vec![(bread, 4), (bread, -2)]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
        assert_eq!(env.services.get_product(bread).await.unwrap().product.showcase_stock, 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_checkouts_never_oversell() {
        let env = Arc::new(TestEnv::new());
        let bread = env.product("Pan", 1, 50).await;
        let mut customers = Vec::new();
        for _ in 0..8 {
            customers.push(env.user(Role::Customer).await);
        }

        let handles: Vec<_> = customers
            .into_iter()
            .map(|customer| {
                let env = Arc::clone(&env);
                tokio::spawn(async move { env.services.place_order(&customer, pickup(vec![(bread, 1)])).await })
            })
            .collect();

        let mut placed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => placed += 1,
                Err(err) => assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_)))),
            }
        }
        assert_eq!(placed, 1);
        assert_eq!(env.services.get_product(bread).await.unwrap().product.showcase_stock, 0);
        assert_eq!(env.services.list_orders().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn customers_cannot_order_for_others() {
        let env = TestEnv::new();
        let customer = env.user(Role::Customer).await;
        let other = env.user(Role::Customer).await;
        let bread = env.product("Pan", 10, 50).await;

        let mut input = pickup(vec![(bread, 1)]);
        input.user_id = Some(other.user_id);
        let err = env.services.place_order(&customer, input.clone()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let baker = env.user(Role::Baker).await;
        let view = env.services.place_order(&baker, input).await.unwrap();
        assert_eq!(view.order.user_id, Some(other.user_id));
        assert_eq!(env.services.list_my_orders(&other).await.unwrap().len(), 1);
        assert!(env.services.list_my_orders(&customer).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delivery_orders_need_an_address() {
        let env = TestEnv::new();
        let customer = env.user(Role::Customer).await;
        let bread = env.product("Pan", 10, 50).await;
        let mut input = delivery(vec![(bread, 1)]);
        input.delivery_address = None;
        let err = env.services.place_order(&customer, input).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
        assert_eq!(env.services.get_product(bread).await.unwrap().product.showcase_stock, 10);
    }

    #[tokio::test]
    async fn pre_assigned_driver_opens_an_assigned_delivery() {
        let env = TestEnv::new();
        let admin = env.user(Role::Admin).await;
        let driver = env.user(Role::Driver).await;
        let bread = env.product("Pan", 10, 50).await;

        let mut input = delivery(vec![(bread, 1)]);
        input.driver_id = Some(driver.user_id);
        let view = env.services.place_order(&admin, input).await.unwrap();
        let d = view.delivery.unwrap();
        assert_eq!(d.status, DeliveryStatus::Assigned);
        assert_eq!(d.driver_id, Some(driver.user_id));
    }

    #[tokio::test]
    async fn cancelling_restocks_and_is_final() {
        let env = TestEnv::new();
        let customer = env.user(Role::Customer).await;
        let bread = env.product("Pan", 10, 50).await;
        let view = env
            .services
            .place_order(&customer, delivery(vec![(bread, 4)]))
            .await
            .unwrap();

        let cancelled = env
            .services
            .update_order_status(view.order.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.delivery.map(|d| d.status), Some(DeliveryStatus::Cancelled));
        assert_eq!(env.services.get_product(bread).await.unwrap().product.showcase_stock, 10);

        let err = env
            .services
            .update_order_status(view.order.id, OrderStatus::Ready)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn confirming_payment_marks_order_paid() {
        let env = TestEnv::new();
        let customer = env.user(Role::Customer).await;
        let bread = env.product("Pan", 10, 50).await;
        let view = env
            .services
            .place_order(&customer, pickup(vec![(bread, 2)]))
            .await
            .unwrap();

        let paid = env.services.confirm_payment(view.order.id).await.unwrap();
        assert_eq!(paid.order.status, OrderStatus::Paid);
        assert_eq!(paid.payments[0].status, PaymentStatus::Confirmed);

        let err = env.services.confirm_payment(view.order.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));
    }
}
