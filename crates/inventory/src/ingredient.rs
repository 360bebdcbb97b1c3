use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bakery_core::{DomainError, DomainResult, IngredientId, Money, Quantity, SupplierId, UserId};

use crate::movement::{MovementKind, StockMovement};
use crate::unit::Unit;

/// Reorder threshold used when none is given.
pub const DEFAULT_MIN_STOCK: Quantity = Quantity::from_units(5);

/// A raw material tracked in the kardex.
///
/// # Invariants
/// - `stock >= 0`
/// - every stock change goes through a method that returns the matching
///   [`StockMovement`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,
    pub description: Option<String>,
    pub unit: Unit,
    pub min_stock: Quantity,
    pub preferred_supplier_id: Option<SupplierId>,
    pub stock: Quantity,
    pub avg_cost: Money,
    pub created_at: DateTime<Utc>,
}

/// Editable ingredient fields. `None` stock/cost on update keeps the current value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IngredientDraft {
    pub name: String,
    pub description: Option<String>,
    pub unit: Unit,
    pub min_stock: Option<Quantity>,
    pub preferred_supplier_id: Option<SupplierId>,
    pub stock: Option<Quantity>,
    pub avg_cost: Option<Money>,
}

impl IngredientDraft {
    fn validated(mut self) -> DomainResult<Self> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(DomainError::validation("ingredient name cannot be empty"));
        }
        if self.min_stock.is_some_and(Quantity::is_negative) {
            return Err(DomainError::validation("min_stock cannot be negative"));
        }
        if self.stock.is_some_and(Quantity::is_negative) {
            return Err(DomainError::validation("stock cannot be negative"));
        }
        if let Some(cost) = self.avg_cost {
            cost.ensure_non_negative("avg_cost")?;
        }
        self.description = self.description.filter(|d| !d.trim().is_empty());
        Ok(self)
    }
}

impl Ingredient {
    /// Create an ingredient. Returns the opening "initial inventory" movement
    /// when it starts with stock.
    pub fn create(
        draft: IngredientDraft,
        responsible: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<(Self, Option<StockMovement>)> {
        let d = draft.validated()?;
        let ingredient = Self {
            id: IngredientId::new(),
            name: d.name,
            description: d.description,
            unit: d.unit,
            min_stock: d.min_stock.unwrap_or(DEFAULT_MIN_STOCK),
            preferred_supplier_id: d.preferred_supplier_id,
            stock: d.stock.unwrap_or(Quantity::ZERO),
            avg_cost: d.avg_cost.unwrap_or(Money::ZERO),
            created_at: now,
        };

        let opening = ingredient.stock.is_positive().then(|| {
            StockMovement::record(
                ingredient.id,
                MovementKind::Adjustment,
                ingredient.stock,
                ingredient.avg_cost,
                "initial inventory",
                responsible,
                now,
            )
        });

        Ok((ingredient, opening))
    }

    /// Replace the editable fields. A stock change is recorded as a
    /// `purchase` (increase) or `adjustment` (decrease).
    pub fn update(
        &mut self,
        draft: IngredientDraft,
        responsible: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<StockMovement>> {
        let d = draft.validated()?;
        self.name = d.name;
        self.description = d.description;
        self.unit = d.unit;
        if let Some(min) = d.min_stock {
            self.min_stock = min;
        }
        self.preferred_supplier_id = d.preferred_supplier_id;
        if let Some(cost) = d.avg_cost {
            self.avg_cost = cost;
        }

        let Some(new_stock) = d.stock else {
            return Ok(None);
        };
        let diff = new_stock.checked_sub(self.stock)?;
        if diff == Quantity::ZERO {
            return Ok(None);
        }
        self.stock = new_stock;

        let kind = if diff.is_positive() {
            MovementKind::Purchase
        } else {
            MovementKind::Adjustment
        };
        Ok(Some(StockMovement::record(
            self.id,
            kind,
            diff,
            self.avg_cost,
            "manual stock update",
            responsible,
            now,
        )))
    }

    /// Deduct `need` for a production run. Refuses to drive stock negative.
    pub fn consume(
        &mut self,
        need: Quantity,
        note: impl Into<String>,
        responsible: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<StockMovement> {
        if !need.is_positive() {
            return Err(DomainError::validation("consumed quantity must be positive"));
        }
        if self.stock < need {
            return Err(DomainError::conflict(format!(
                "insufficient stock of ingredient '{}' (available {} {}, required {} {})",
                self.name, self.stock, self.unit, need, self.unit
            )));
        }
        self.stock = self.stock.checked_sub(need)?;
        Ok(StockMovement::record(
            self.id,
            MovementKind::ProductionUse,
            -need,
            self.avg_cost,
            note,
            responsible,
            now,
        ))
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.min_stock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn draft(stock: Option<Quantity>) -> IngredientDraft {
        IngredientDraft {
            name: "Harina".into(),
            description: None,
            unit: Unit::Kg,
            min_stock: None,
            preferred_supplier_id: None,
            stock,
            avg_cost: Some(Money::from_cents(120)),
        }
    }

    #[test]
    fn create_defaults_and_opening_movement() {
        let (ing, opening) =
            Ingredient::create(draft(Some(Quantity::from_units(10))), None, Utc::now()).unwrap();
        assert_eq!(ing.min_stock, DEFAULT_MIN_STOCK);
        let mv = opening.expect("opening movement");
        assert_eq!(mv.kind, MovementKind::Adjustment);
        assert_eq!(mv.quantity, Quantity::from_units(10));
        assert_eq!(mv.unit_cost, Money::from_cents(120));
    }

    #[test]
    fn create_without_stock_records_nothing() {
        let (ing, opening) = Ingredient::create(draft(None), None, Utc::now()).unwrap();
        assert_eq!(ing.stock, Quantity::ZERO);
        assert!(opening.is_none());
        assert!(ing.is_low_stock());
    }

    #[test]
    fn update_records_signed_difference() {
        let (mut ing, _) =
            Ingredient::create(draft(Some(Quantity::from_units(10))), None, Utc::now()).unwrap();

        let up = ing
            .update(draft(Some(Quantity::from_units(12))), None, Utc::now())
            .unwrap()
            .unwrap();
        assert_eq!(up.kind, MovementKind::Purchase);
        assert_eq!(up.quantity, Quantity::from_units(2));

        let down = ing
            .update(draft(Some(Quantity::from_milli(11_500))), None, Utc::now())
            .unwrap()
            .unwrap();
        assert_eq!(down.kind, MovementKind::Adjustment);
        assert_eq!(down.quantity, Quantity::from_milli(-500));

        assert!(ing.update(draft(None), None, Utc::now()).unwrap().is_none());
        assert_eq!(ing.stock, Quantity::from_milli(11_500));
    }

    #[test]
    fn update_rejects_negative_stock() {
        let (mut ing, _) = Ingredient::create(draft(None), None, Utc::now()).unwrap();
        let err = ing
            .update(draft(Some(Quantity::from_units(-1))), None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn consume_refuses_to_go_negative() {
        let (mut ing, _) =
            Ingredient::create(draft(Some(Quantity::from_units(1))), None, Utc::now()).unwrap();
        let err = ing
            .consume(Quantity::from_milli(1_001), "production #B1: Pan", None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(ing.stock, Quantity::from_units(1));

        let mv = ing
            .consume(Quantity::from_units(1), "production #B1: Pan", None, Utc::now())
            .unwrap();
        assert_eq!(mv.kind, MovementKind::ProductionUse);
        assert_eq!(mv.quantity, Quantity::from_units(-1));
        assert_eq!(ing.stock, Quantity::ZERO);
    }

    proptest! {
        #[test]
        fn movements_sum_to_stock(needs in proptest::collection::vec(1i64..5_000, 0..20)) {
            let start = Quantity::from_units(20);
            let (mut ing, opening) = Ingredient::create(draft(Some(start)), None, Utc::now()).unwrap();
            let mut ledger = opening.map(|m| m.quantity.milli()).unwrap_or(0);
            for n in needs {
                if let Ok(mv) = ing.consume(Quantity::from_milli(n), "run", None, Utc::now()) {
                    ledger += mv.quantity.milli();
                }
                prop_assert!(!ing.stock.is_negative());
            }
            prop_assert_eq!(ledger, ing.stock.milli());
        }
    }
}
