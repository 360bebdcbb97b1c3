//! Ingredient requirements for a finished production run.

use bakery_core::{DomainResult, IngredientId, Quantity};

use crate::recipe::RecipeLine;

/// Total quantity of one ingredient consumed by a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackflushLine {
    pub ingredient_id: IngredientId,
    pub need: Quantity,
}

/// `need = quantity_required × units` for every recipe line, merged per ingredient.
///
/// Sorted by ingredient id, so concurrent runs lock ingredient rows in the
/// same order.
pub fn backflush_plan(recipe: &[RecipeLine], units: i64) -> DomainResult<Vec<BackflushLine>> {
    let mut plan: Vec<BackflushLine> = Vec::with_capacity(recipe.len());
    for line in recipe {
        let need = line.quantity_required.times(units)?;
        match plan.iter_mut().find(|p| p.ingredient_id == line.ingredient_id) {
            Some(existing) => existing.need = existing.need.checked_add(need)?,
            None => plan.push(BackflushLine {
                ingredient_id: line.ingredient_id,
                need,
            }),
        }
    }
    plan.sort_by_key(|p| p.ingredient_id);
    Ok(plan)
}

/// Kardex note for a production consumption.
pub fn production_note(batch_code: &str, product_name: &str) -> String {
    format!("production #{batch_code}: {product_name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use bakery_core::ProductId;
    use proptest::prelude::*;

    #[test]
    fn multiplies_by_units() {
        let product = ProductId::new();
        let flour = IngredientId::new();
        let sugar = IngredientId::new();
        let recipe = vec![
            RecipeLine::new(product, flour, Quantity::from_milli(500), None).unwrap(),
            RecipeLine::new(product, sugar, Quantity::from_milli(125), None).unwrap(),
        ];

        let plan = backflush_plan(&recipe, 4).unwrap();
        let need = |id| plan.iter().find(|p| p.ingredient_id == id).map(|p| p.need);
        assert_eq!(plan.len(), 2);
        assert_eq!(need(flour), Some(Quantity::from_units(2)));
        assert_eq!(need(sugar), Some(Quantity::from_milli(500)));
    }

    #[test]
    fn merges_repeats_and_sorts_by_ingredient() {
        let product = ProductId::new();
        let mut ids = [IngredientId::new(), IngredientId::new(), IngredientId::new()];
        ids.sort();
        let [a, b, c] = ids;
        let recipe = vec![
            RecipeLine::new(product, c, Quantity::from_milli(100), None).unwrap(),
            RecipeLine::new(product, a, Quantity::from_milli(200), None).unwrap(),
            RecipeLine::new(product, c, Quantity::from_milli(50), None).unwrap(),
            RecipeLine::new(product, b, Quantity::from_milli(10), None).unwrap(),
        ];

        let plan = backflush_plan(&recipe, 2).unwrap();
        assert_eq!(
            plan,
            vec![
                BackflushLine { ingredient_id: a, need: Quantity::from_milli(400) },
                BackflushLine { ingredient_id: b, need: Quantity::from_milli(20) },
                BackflushLine { ingredient_id: c, need: Quantity::from_milli(300) },
            ]
        );
    }

    #[test]
    fn note_names_batch_and_product() {
        assert_eq!(production_note("BATCH-1", "Pan"), "production #BATCH-1: Pan");
    }

    proptest! {
        #[test]
        fn plan_is_linear_in_units(milli in 1i64..10_000, units in 1i64..500) {
            let line = RecipeLine::new(ProductId::new(), IngredientId::new(), Quantity::from_milli(milli), None).unwrap();
            let plan = backflush_plan(std::slice::from_ref(&line), units).unwrap();
            prop_assert_eq!(plan[0].need.milli(), milli * units);
        }
    }
}
