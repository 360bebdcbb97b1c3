use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bakery_core::{
    Aggregate, AggregateRoot, DomainError, DomainResult, Money, OrderId, ProductId, UserId,
};
use bakery_events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fulfillment {
    Pickup,
    Delivery,
}

impl Fulfillment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Fulfillment::Pickup => "pickup",
            Fulfillment::Delivery => "delivery",
        }
    }
}

impl core::str::FromStr for Fulfillment {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pickup" => Ok(Fulfillment::Pickup),
            "delivery" => Ok(Fulfillment::Delivery),
            other => Err(DomainError::validation(format!("invalid fulfillment '{other}'"))),
        }
    }
}

/// Customer order lifecycle. `Delivered` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    Paid,
    InPreparation,
    Ready,
    OnRoute,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::PendingPayment,
        OrderStatus::Paid,
        OrderStatus::InPreparation,
        OrderStatus::Ready,
        OrderStatus::OnRoute,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "pending_payment",
            OrderStatus::Paid => "paid",
            OrderStatus::InPreparation => "in_preparation",
            OrderStatus::Ready => "ready",
            OrderStatus::OnRoute => "on_route",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        OrderStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("invalid order status '{s}'")))
    }
}

/// A priced order line. `unit_price` is the catalog price at placement time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
    pub subtotal: Money,
    pub customization: Option<String>,
}

impl OrderLine {
    pub fn priced(
        product_id: ProductId,
        quantity: i64,
        unit_price: Money,
        customization: Option<String>,
    ) -> DomainResult<Self> {
        if quantity <= 0 {
            return Err(DomainError::validation("line quantity must be positive"));
        }
        unit_price.ensure_non_negative("unit_price")?;
        Ok(Self {
            product_id,
            quantity,
            unit_price,
            subtotal: unit_price.times(quantity)?,
            customization: customization.filter(|c| !c.trim().is_empty()),
        })
    }
}

/// Everything needed to place an order once lines are priced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub user_id: Option<UserId>,
    pub fulfillment: Fulfillment,
    pub scheduled_for: DateTime<Utc>,
    pub delivery_address: Option<String>,
    pub address_reference: Option<String>,
    pub notes: Option<String>,
    pub shipping_cost: Money,
    pub lines: Vec<OrderLine>,
}

/// Aggregate root: a customer order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: Option<UserId>,
    pub fulfillment: Fulfillment,
    pub scheduled_for: DateTime<Utc>,
    pub delivery_address: Option<String>,
    pub address_reference: Option<String>,
    pub notes: Option<String>,
    pub lines: Vec<OrderLine>,
    pub products_total: Money,
    pub shipping_cost: Money,
    pub total: Money,
    pub status: OrderStatus,
    pub placed_at: DateTime<Utc>,
}

impl Order {
    /// Validate a draft and open the order in `pending_payment`.
    pub fn place(draft: OrderDraft, now: DateTime<Utc>) -> DomainResult<(Self, OrderEvent)> {
        if draft.lines.is_empty() {
            return Err(DomainError::validation("an order needs at least one line"));
        }
        let delivery_address = draft
            .delivery_address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());
        if draft.fulfillment == Fulfillment::Delivery && delivery_address.is_none() {
            return Err(DomainError::validation(
                "delivery orders require a delivery address",
            ));
        }
        draft.shipping_cost.ensure_non_negative("shipping_cost")?;

        let shipping_cost = match draft.fulfillment {
            Fulfillment::Delivery => draft.shipping_cost,
            Fulfillment::Pickup => Money::ZERO,
        };
        let products_total = draft
            .lines
            .iter()
            .try_fold(Money::ZERO, |acc, l| acc.checked_add(l.subtotal))?;
        let total = products_total.checked_add(shipping_cost)?;

        let order = Self {
            id: OrderId::new(),
            user_id: draft.user_id,
            fulfillment: draft.fulfillment,
            scheduled_for: draft.scheduled_for,
            delivery_address,
            address_reference: draft.address_reference.filter(|r| !r.trim().is_empty()),
            notes: draft.notes.filter(|n| !n.trim().is_empty()),
            lines: draft.lines,
            products_total,
            shipping_cost,
            total,
            status: OrderStatus::PendingPayment,
            placed_at: now,
        };
        let event = OrderEvent::Placed(OrderPlaced {
            order_id: order.id,
            user_id: order.user_id,
            fulfillment: order.fulfillment,
            total: order.total,
            occurred_at: now,
        });
        Ok((order, event))
    }

    pub fn is_delivery(&self) -> bool {
        self.fulfillment == Fulfillment::Delivery
    }

    /// Units per product, used to restock on cancellation.
    pub fn quantities(&self) -> impl Iterator<Item = (ProductId, i64)> + '_ {
        self.lines.iter().map(|l| (l.product_id, l.quantity))
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Command: ChangeOrderStatus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeOrderStatus {
    pub status: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderCommand {
    ChangeStatus(ChangeOrderStatus),
    /// Payment confirmed: a `pending_payment` order becomes `paid`.
    MarkPaid { occurred_at: DateTime<Utc> },
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub user_id: Option<UserId>,
    pub fulfillment: Fulfillment,
    pub total: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed(OrderPlaced),
    StatusChanged(OrderStatusChanged),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Placed(_) => "order.placed",
            OrderEvent::StatusChanged(_) => "order.status_changed",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::Placed(e) => e.occurred_at,
            OrderEvent::StatusChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::Placed(_) => {}
            OrderEvent::StatusChanged(e) => self.status = e.to,
        }
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::ChangeStatus(cmd) => self.transition(cmd.status, cmd.occurred_at),
            OrderCommand::MarkPaid { occurred_at } => match self.status {
                OrderStatus::PendingPayment => self.transition(OrderStatus::Paid, *occurred_at),
                OrderStatus::Cancelled => Err(DomainError::conflict(
                    "cannot confirm payment of a cancelled order",
                )),
                _ => Ok(Vec::new()),
            },
        }
    }
}

impl Order {
    fn transition(
        &self,
        to: OrderStatus,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, DomainError> {
        if self.status == to {
            return Ok(Vec::new());
        }
        if self.status.is_terminal() {
            return Err(DomainError::conflict(format!(
                "order is already {}",
                self.status
            )));
        }
        Ok(vec![OrderEvent::StatusChanged(OrderStatusChanged {
            order_id: self.id,
            from: self.status,
            to,
            occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn line(qty: i64, price: i64) -> OrderLine {
        OrderLine::priced(ProductId::new(), qty, Money::from_cents(price), None).unwrap()
    }

    fn draft(fulfillment: Fulfillment, address: Option<&str>) -> OrderDraft {
        OrderDraft {
            user_id: Some(UserId::new()),
            fulfillment,
            scheduled_for: Utc::now(),
            delivery_address: address.map(str::to_string),
            address_reference: None,
            notes: None,
            shipping_cost: Money::from_cents(500),
            lines: vec![line(2, 1250), line(1, 300)],
        }
    }

    fn change(status: OrderStatus) -> OrderCommand {
        OrderCommand::ChangeStatus(ChangeOrderStatus {
            status,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn delivery_totals_include_shipping() {
        let (order, event) =
            Order::place(draft(Fulfillment::Delivery, Some("Av. Sol 123")), Utc::now()).unwrap();
        assert_eq!(order.products_total, Money::from_cents(2800));
        assert_eq!(order.shipping_cost, Money::from_cents(500));
        assert_eq!(order.total, Money::from_cents(3300));
        assert_eq!(order.status, OrderStatus::PendingPayment);
        assert_eq!(event.event_type(), "order.placed");
    }

    #[test]
    fn pickup_ignores_shipping() {
        let (order, _) = Order::place(draft(Fulfillment::Pickup, None), Utc::now()).unwrap();
        assert_eq!(order.shipping_cost, Money::ZERO);
        assert_eq!(order.total, Money::from_cents(2800));
    }

    #[test]
    fn delivery_requires_address() {
        let err = Order::place(draft(Fulfillment::Delivery, Some("  ")), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn empty_orders_and_bad_lines_are_rejected() {
        let mut d = draft(Fulfillment::Pickup, None);
        d.lines.clear();
        assert!(Order::place(d, Utc::now()).is_err());
        assert!(OrderLine::priced(ProductId::new(), 0, Money::from_cents(100), None).is_err());
    }

    #[test]
    fn terminal_statuses_are_final() {
        let (mut order, _) = Order::place(draft(Fulfillment::Pickup, None), Utc::now()).unwrap();
        order.execute(&change(OrderStatus::Cancelled)).unwrap();
        let err = order.execute(&change(OrderStatus::Ready)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert!(order.execute(&change(OrderStatus::Cancelled)).unwrap().is_empty());
    }

    #[test]
    fn mark_paid_only_moves_pending_orders() {
        let (mut order, _) = Order::place(draft(Fulfillment::Pickup, None), Utc::now()).unwrap();
        let events = order
            .execute(&OrderCommand::MarkPaid { occurred_at: Utc::now() })
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(order.status, OrderStatus::Paid);

        order.execute(&change(OrderStatus::Ready)).unwrap();
        let events = order
            .execute(&OrderCommand::MarkPaid { occurred_at: Utc::now() })
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(order.status, OrderStatus::Ready);
    }

    proptest! {
        #[test]
        fn total_is_line_sum_plus_shipping(
            lines in prop::collection::vec((1i64..20, 0i64..10_000), 1..6),
            shipping in 0i64..2_000,
        ) {
            let expected: i64 = lines.iter().map(|(q, p)| q * p).sum::<i64>() + shipping;
            let mut d = draft(Fulfillment::Delivery, Some("Jr. Union 45"));
            d.shipping_cost = Money::from_cents(shipping);
            d.lines = lines.iter().map(|&(q, p)| line(q, p)).collect();

            let (order, _) = Order::place(d, Utc::now()).unwrap();
            prop_assert_eq!(order.total.cents(), expected);
        }
    }
}
