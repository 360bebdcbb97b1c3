use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bakery_core::{Aggregate, AggregateRoot, DeliveryId, DomainError, OrderId, UserId};
use bakery_events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Preparing,
    Assigned,
    OnRoute,
    Delivered,
    Cancelled,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Preparing => "preparing",
            DeliveryStatus::Assigned => "assigned",
            DeliveryStatus::OnRoute => "on_route",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Cancelled)
    }
}

impl core::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for DeliveryStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preparing" => Ok(DeliveryStatus::Preparing),
            "assigned" => Ok(DeliveryStatus::Assigned),
            "on_route" => Ok(DeliveryStatus::OnRoute),
            "delivered" => Ok(DeliveryStatus::Delivered),
            "cancelled" => Ok(DeliveryStatus::Cancelled),
            other => Err(DomainError::validation(format!(
                "invalid delivery status '{other}'"
            ))),
        }
    }
}

/// Aggregate root: the delivery of one order.
///
/// # Invariants
/// - at most one driver holds the delivery
/// - `Delivered` and `Cancelled` are terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub id: DeliveryId,
    pub order_id: OrderId,
    pub driver_id: Option<UserId>,
    pub status: DeliveryStatus,
    pub departed_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub evidence_url: Option<String>,
}

impl Delivery {
    /// Open a delivery for a freshly placed order, optionally pre-assigned.
    pub fn open(order_id: OrderId, driver_id: Option<UserId>) -> Self {
        Self {
            id: DeliveryId::new(),
            order_id,
            driver_id,
            status: if driver_id.is_some() {
                DeliveryStatus::Assigned
            } else {
                DeliveryStatus::Preparing
            },
            departed_at: None,
            delivered_at: None,
            evidence_url: None,
        }
    }

    /// Open to any driver: nobody holds it and it was not cancelled.
    pub fn is_available(&self) -> bool {
        self.driver_id.is_none() && self.status != DeliveryStatus::Cancelled
    }
}

impl AggregateRoot for Delivery {
    type Id = DeliveryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Command: UpdateDeliveryStatus (driver progress report).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateDeliveryStatus {
    pub actor: UserId,
    pub actor_is_admin: bool,
    pub status: DeliveryStatus,
    pub evidence_url: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryCommand {
    /// Dispatcher assigns (or reassigns) a driver.
    Assign {
        driver_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    /// A driver takes an unassigned delivery.
    Claim {
        driver_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    UpdateStatus(UpdateDeliveryStatus),
    /// The order was cancelled.
    Cancel { occurred_at: DateTime<Utc> },
}

/// Event: DeliveryAssigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAssigned {
    pub delivery_id: DeliveryId,
    pub order_id: OrderId,
    pub driver_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DeliveryClaimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryClaimed {
    pub delivery_id: DeliveryId,
    pub order_id: OrderId,
    pub driver_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DeliveryStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStatusChanged {
    pub delivery_id: DeliveryId,
    pub order_id: OrderId,
    pub from: DeliveryStatus,
    pub to: DeliveryStatus,
    pub evidence_url: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeliveryEvent {
    Assigned(DeliveryAssigned),
    Claimed(DeliveryClaimed),
    StatusChanged(DeliveryStatusChanged),
}

impl Event for DeliveryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DeliveryEvent::Assigned(_) => "delivery.assigned",
            DeliveryEvent::Claimed(_) => "delivery.claimed",
            DeliveryEvent::StatusChanged(_) => "delivery.status_changed",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DeliveryEvent::Assigned(e) => e.occurred_at,
            DeliveryEvent::Claimed(e) => e.occurred_at,
            DeliveryEvent::StatusChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Delivery {
    type Command = DeliveryCommand;
    type Event = DeliveryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            DeliveryEvent::Assigned(e) => {
                self.driver_id = Some(e.driver_id);
                self.status = DeliveryStatus::Assigned;
            }
            DeliveryEvent::Claimed(e) => {
                self.driver_id = Some(e.driver_id);
                self.status = DeliveryStatus::Assigned;
            }
            DeliveryEvent::StatusChanged(e) => {
                self.status = e.to;
                match e.to {
                    DeliveryStatus::OnRoute => self.departed_at = Some(e.occurred_at),
                    DeliveryStatus::Delivered => {
                        self.delivered_at = Some(e.occurred_at);
                        if e.evidence_url.is_some() {
                            self.evidence_url = e.evidence_url.clone();
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            DeliveryCommand::Assign {
                driver_id,
                occurred_at,
            } => self.handle_assign(*driver_id, *occurred_at),
            DeliveryCommand::Claim {
                driver_id,
                occurred_at,
            } => self.handle_claim(*driver_id, *occurred_at),
            DeliveryCommand::UpdateStatus(cmd) => self.handle_update_status(cmd),
            DeliveryCommand::Cancel { occurred_at } => {
                if self.status == DeliveryStatus::Cancelled {
                    return Ok(Vec::new());
                }
                if self.status == DeliveryStatus::Delivered {
                    return Err(DomainError::conflict("delivery was already completed"));
                }
                Ok(vec![self.status_changed(DeliveryStatus::Cancelled, None, *occurred_at)])
            }
        }
    }
}

impl Delivery {
    fn status_changed(
        &self,
        to: DeliveryStatus,
        evidence_url: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> DeliveryEvent {
        DeliveryEvent::StatusChanged(DeliveryStatusChanged {
            delivery_id: self.id,
            order_id: self.order_id,
            from: self.status,
            to,
            evidence_url,
            occurred_at,
        })
    }

    fn handle_assign(
        &self,
        driver_id: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<DeliveryEvent>, DomainError> {
        if matches!(
            self.status,
            DeliveryStatus::OnRoute | DeliveryStatus::Delivered | DeliveryStatus::Cancelled
        ) {
            return Err(DomainError::conflict(format!(
                "cannot reassign a delivery that is {}",
                self.status
            )));
        }
        Ok(vec![DeliveryEvent::Assigned(DeliveryAssigned {
            delivery_id: self.id,
            order_id: self.order_id,
            driver_id,
            occurred_at,
        })])
    }

    fn handle_claim(
        &self,
        driver_id: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<DeliveryEvent>, DomainError> {
        if !self.is_available() {
            return Err(DomainError::conflict(
                "delivery was already taken by another driver",
            ));
        }
        Ok(vec![DeliveryEvent::Claimed(DeliveryClaimed {
            delivery_id: self.id,
            order_id: self.order_id,
            driver_id,
            occurred_at,
        })])
    }

    fn handle_update_status(
        &self,
        cmd: &UpdateDeliveryStatus,
    ) -> Result<Vec<DeliveryEvent>, DomainError> {
        if !cmd.actor_is_admin && self.driver_id != Some(cmd.actor) {
            return Err(DomainError::Unauthorized);
        }
        if self.status == cmd.status {
            return Ok(Vec::new());
        }
        if self.status.is_terminal() {
            return Err(DomainError::conflict(format!(
                "delivery is already {}",
                self.status
            )));
        }

        match cmd.status {
            DeliveryStatus::OnRoute | DeliveryStatus::Delivered => {}
            other => {
                return Err(DomainError::validation(format!(
                    "drivers can only report on_route or delivered, not {other}"
                )));
            }
        }
        if self.driver_id.is_none() {
            return Err(DomainError::conflict("delivery has no driver assigned"));
        }
        if cmd.status == DeliveryStatus::OnRoute && self.status != DeliveryStatus::Assigned {
            return Err(DomainError::conflict(format!(
                "cannot depart from status {}",
                self.status
            )));
        }

        let evidence = match cmd.status {
            DeliveryStatus::Delivered => cmd.evidence_url.clone(),
            _ => None,
        };
        Ok(vec![self.status_changed(cmd.status, evidence, cmd.occurred_at)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(actor: UserId, status: DeliveryStatus, evidence: Option<&str>) -> DeliveryCommand {
        DeliveryCommand::UpdateStatus(UpdateDeliveryStatus {
            actor,
            actor_is_admin: false,
            status,
            evidence_url: evidence.map(str::to_string),
            occurred_at: Utc::now(),
        })
    }

    fn claim(driver_id: UserId) -> DeliveryCommand {
        DeliveryCommand::Claim {
            driver_id,
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn open_sets_initial_status() {
        assert_eq!(Delivery::open(OrderId::new(), None).status, DeliveryStatus::Preparing);
        assert_eq!(
            Delivery::open(OrderId::new(), Some(UserId::new())).status,
            DeliveryStatus::Assigned
        );
    }

    #[test]
    fn second_claim_is_rejected() {
        let mut d = Delivery::open(OrderId::new(), None);
        let first = UserId::new();
        d.execute(&claim(first)).unwrap();
        assert_eq!(d.driver_id, Some(first));

        let err = d.execute(&claim(UserId::new())).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(d.driver_id, Some(first));
    }

    #[test]
    fn cancelled_deliveries_cannot_be_claimed() {
        let mut d = Delivery::open(OrderId::new(), None);
        d.execute(&DeliveryCommand::Cancel { occurred_at: Utc::now() }).unwrap();
        assert!(!d.is_available());
        assert!(d.execute(&claim(UserId::new())).is_err());
    }

    #[test]
    fn only_the_assigned_driver_reports_progress() {
        let driver = UserId::new();
        let mut d = Delivery::open(OrderId::new(), Some(driver));

        let err = d
            .execute(&update(UserId::new(), DeliveryStatus::OnRoute, None))
            .unwrap_err();
        assert_eq!(err, DomainError::Unauthorized);

        d.execute(&update(driver, DeliveryStatus::OnRoute, None)).unwrap();
        assert!(d.departed_at.is_some());

        d.execute(&update(driver, DeliveryStatus::Delivered, Some("uploads/p.jpg")))
            .unwrap();
        assert_eq!(d.status, DeliveryStatus::Delivered);
        assert!(d.delivered_at.is_some());
        assert_eq!(d.evidence_url.as_deref(), Some("uploads/p.jpg"));
    }

    #[test]
    fn admins_may_report_for_drivers() {
        let mut d = Delivery::open(OrderId::new(), Some(UserId::new()));
        let cmd = DeliveryCommand::UpdateStatus(UpdateDeliveryStatus {
            actor: UserId::new(),
            actor_is_admin: true,
            status: DeliveryStatus::Delivered,
            evidence_url: None,
            occurred_at: Utc::now(),
        });
        d.execute(&cmd).unwrap();
        assert_eq!(d.status, DeliveryStatus::Delivered);
    }

    #[test]
    fn reassignment_stops_once_on_route() {
        let driver = UserId::new();
        let mut d = Delivery::open(OrderId::new(), Some(driver));
        let reassign = DeliveryCommand::Assign {
            driver_id: UserId::new(),
            occurred_at: Utc::now(),
        };
        d.execute(&reassign).unwrap();
        assert_ne!(d.driver_id, Some(driver));

        let current = d.driver_id.unwrap();
        d.execute(&update(current, DeliveryStatus::OnRoute, None)).unwrap();
        assert!(matches!(d.execute(&reassign), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn drivers_cannot_set_arbitrary_statuses() {
        let driver = UserId::new();
        let mut d = Delivery::open(OrderId::new(), Some(driver));
        let err = d
            .execute(&update(driver, DeliveryStatus::Cancelled, None))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
