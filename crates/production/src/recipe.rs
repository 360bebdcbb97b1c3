use serde::{Deserialize, Serialize};

use bakery_core::{DomainError, DomainResult, IngredientId, ProductId, Quantity, RecipeLineId};
use bakery_inventory::Unit;

/// One ingredient requirement per unit of product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeLine {
    pub id: RecipeLineId,
    pub product_id: ProductId,
    pub ingredient_id: IngredientId,
    pub quantity_required: Quantity,
    pub usage_unit: Option<Unit>,
}

impl RecipeLine {
    pub fn new(
        product_id: ProductId,
        ingredient_id: IngredientId,
        quantity_required: Quantity,
        usage_unit: Option<Unit>,
    ) -> DomainResult<Self> {
        if !quantity_required.is_positive() {
            return Err(DomainError::validation("quantity_required must be positive"));
        }
        Ok(Self {
            id: RecipeLineId::new(),
            product_id,
            ingredient_id,
            quantity_required,
            usage_unit,
        })
    }
}

/// A product's recipe lists each ingredient at most once.
pub fn ensure_ingredient_not_in_recipe(
    recipe: &[RecipeLine],
    ingredient_id: IngredientId,
) -> DomainResult<()> {
    if recipe.iter().any(|l| l.ingredient_id == ingredient_id) {
        return Err(DomainError::conflict(
            "ingredient is already part of this recipe",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_must_be_positive() {
        let err = RecipeLine::new(ProductId::new(), IngredientId::new(), Quantity::ZERO, None)
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn duplicate_ingredients_conflict() {
        let product = ProductId::new();
        let flour = IngredientId::new();
        let line = RecipeLine::new(product, flour, Quantity::from_milli(250), Some(Unit::Kg)).unwrap();

        assert!(ensure_ingredient_not_in_recipe(&[line.clone()], IngredientId::new()).is_ok());
        let err = ensure_ingredient_not_in_recipe(&[line], flour).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }
}
