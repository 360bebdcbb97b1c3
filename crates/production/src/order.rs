use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bakery_core::{Aggregate, AggregateRoot, DomainError, ProductId, ProductionOrderId, UserId};
use bakery_events::Event;

/// Production pipeline status. `Finished` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionStatus {
    Pending,
    InProduction,
    Baked,
    Decorated,
    Finished,
}

impl ProductionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductionStatus::Pending => "pending",
            ProductionStatus::InProduction => "in_production",
            ProductionStatus::Baked => "baked",
            ProductionStatus::Decorated => "decorated",
            ProductionStatus::Finished => "finished",
        }
    }
}

impl core::fmt::Display for ProductionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for ProductionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ProductionStatus::Pending),
            "in_production" => Ok(ProductionStatus::InProduction),
            "baked" => Ok(ProductionStatus::Baked),
            "decorated" => Ok(ProductionStatus::Decorated),
            "finished" => Ok(ProductionStatus::Finished),
            other => Err(DomainError::validation(format!(
                "invalid production status '{other}'"
            ))),
        }
    }
}

/// Aggregate root: a batch of one product going through the kitchen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionOrder {
    pub id: ProductionOrderId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub status: ProductionStatus,
    pub batch_code: String,
    pub assigned_baker_id: Option<UserId>,
    pub estimated_finish: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Input for creating a production order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewProductionOrder {
    pub product_id: ProductId,
    pub quantity: i64,
    pub batch_code: Option<String>,
    pub assigned_baker_id: Option<UserId>,
    pub estimated_finish: Option<DateTime<Utc>>,
}

impl ProductionOrder {
    pub fn create(input: NewProductionOrder, now: DateTime<Utc>) -> Result<Self, DomainError> {
        if input.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        let batch_code = input
            .batch_code
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| format!("BATCH-{}", now.timestamp_millis()));

        Ok(Self {
            id: ProductionOrderId::new(),
            product_id: input.product_id,
            quantity: input.quantity,
            status: ProductionStatus::Pending,
            batch_code,
            assigned_baker_id: input.assigned_baker_id,
            estimated_finish: input.estimated_finish,
            created_at: now,
            finished_at: None,
        })
    }

    pub fn is_finished(&self) -> bool {
        self.status == ProductionStatus::Finished
    }

    /// Finished orders carry stock and kardex effects and cannot be removed.
    pub fn ensure_deletable(&self) -> Result<(), DomainError> {
        if self.is_finished() {
            return Err(DomainError::conflict(
                "finished production orders cannot be deleted",
            ));
        }
        Ok(())
    }
}

impl AggregateRoot for ProductionOrder {
    type Id = ProductionOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Command: ChangeProductionStatus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeProductionStatus {
    pub status: ProductionStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductionCommand {
    ChangeStatus(ChangeProductionStatus),
}

/// Event: ProductionStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionStatusChanged {
    pub production_order_id: ProductionOrderId,
    pub from: ProductionStatus,
    pub to: ProductionStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductionFinished. Consumers apply the stock effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionFinished {
    pub production_order_id: ProductionOrderId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub batch_code: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductionEvent {
    StatusChanged(ProductionStatusChanged),
    Finished(ProductionFinished),
}

impl Event for ProductionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductionEvent::StatusChanged(_) => "production.status_changed",
            ProductionEvent::Finished(_) => "production.finished",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductionEvent::StatusChanged(e) => e.occurred_at,
            ProductionEvent::Finished(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ProductionOrder {
    type Command = ProductionCommand;
    type Event = ProductionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductionEvent::StatusChanged(e) => self.status = e.to,
            ProductionEvent::Finished(e) => self.finished_at = Some(e.occurred_at),
        }
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductionCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
        }
    }
}

impl ProductionOrder {
    fn handle_change_status(
        &self,
        cmd: &ChangeProductionStatus,
    ) -> Result<Vec<ProductionEvent>, DomainError> {
        if self.is_finished() {
            if cmd.status == ProductionStatus::Finished {
                return Ok(Vec::new());
            }
            return Err(DomainError::conflict(
                "production order is already finished",
            ));
        }

        let mut events = vec![ProductionEvent::StatusChanged(ProductionStatusChanged {
            production_order_id: self.id,
            from: self.status,
            to: cmd.status,
            occurred_at: cmd.occurred_at,
        })];

        if cmd.status == ProductionStatus::Finished {
            events.push(ProductionEvent::Finished(ProductionFinished {
                production_order_id: self.id,
                product_id: self.product_id,
                quantity: self.quantity,
                batch_code: self.batch_code.clone(),
                occurred_at: cmd.occurred_at,
            }));
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> ProductionOrder {
        ProductionOrder::create(
            NewProductionOrder {
                product_id: ProductId::new(),
                quantity: 12,
                batch_code: None,
                assigned_baker_id: None,
                estimated_finish: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn change(status: ProductionStatus) -> ProductionCommand {
        ProductionCommand::ChangeStatus(ChangeProductionStatus {
            status,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn create_defaults_batch_code_and_status() {
        let o = order();
        assert_eq!(o.status, ProductionStatus::Pending);
        assert!(o.batch_code.starts_with("BATCH-"));
    }

    #[test]
    fn quantity_must_be_positive() {
        let err = ProductionOrder::create(
            NewProductionOrder {
                product_id: ProductId::new(),
                quantity: 0,
                batch_code: Some("L-1".into()),
                assigned_baker_id: None,
                estimated_finish: None,
            },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn any_non_terminal_transition_is_allowed() {
        let mut o = order();
        o.execute(&change(ProductionStatus::Decorated)).unwrap();
        o.execute(&change(ProductionStatus::Pending)).unwrap();
        assert_eq!(o.status, ProductionStatus::Pending);
        assert!(o.finished_at.is_none());
    }

    #[test]
    fn finishing_emits_finished_once() {
        let mut o = order();
        let events = o.execute(&change(ProductionStatus::Finished)).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].event_type(), "production.finished");
        assert!(o.finished_at.is_some());

        let again = o.execute(&change(ProductionStatus::Finished)).unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn finished_is_terminal_and_undeletable() {
        let mut o = order();
        o.execute(&change(ProductionStatus::Finished)).unwrap();
        let err = o.execute(&change(ProductionStatus::Baked)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert!(o.ensure_deletable().is_err());
    }

    #[test]
    fn parses_status_strings() {
        assert_eq!(
            "in_production".parse::<ProductionStatus>().unwrap(),
            ProductionStatus::InProduction
        );
        assert!("burnt".parse::<ProductionStatus>().is_err());
    }
}
