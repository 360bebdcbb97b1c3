use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bakery_core::{DomainError, IngredientId, Money, MovementId, Quantity, UserId};

/// Kardex movement kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Purchase,
    Adjustment,
    ProductionUse,
    SaleReturn,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Purchase => "purchase",
            MovementKind::Adjustment => "adjustment",
            MovementKind::ProductionUse => "production_use",
            MovementKind::SaleReturn => "sale_return",
        }
    }
}

impl core::str::FromStr for MovementKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase" => Ok(MovementKind::Purchase),
            "adjustment" => Ok(MovementKind::Adjustment),
            "production_use" => Ok(MovementKind::ProductionUse),
            "sale_return" => Ok(MovementKind::SaleReturn),
            other => Err(DomainError::validation(format!("unknown movement kind '{other}'"))),
        }
    }
}

/// One kardex row. `quantity` is signed: positive adds stock, negative removes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub ingredient_id: IngredientId,
    pub kind: MovementKind,
    pub quantity: Quantity,
    pub unit_cost: Money,
    pub note: Option<String>,
    pub responsible_user_id: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn record(
        ingredient_id: IngredientId,
        kind: MovementKind,
        quantity: Quantity,
        unit_cost: Money,
        note: impl Into<String>,
        responsible_user_id: Option<UserId>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MovementId::new(),
            ingredient_id,
            kind,
            quantity,
            unit_cost,
            note: Some(note.into()),
            responsible_user_id,
            occurred_at,
        }
    }
}
