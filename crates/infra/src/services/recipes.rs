use serde::{Deserialize, Serialize};

use bakery_core::{IngredientId, ProductId, Quantity, RecipeLineId};
use bakery_inventory::{Ingredient, Unit};
use bakery_production::{RecipeLine, ensure_ingredient_not_in_recipe};

use super::Services;
use crate::error::{ServiceError, ServiceResult};
use crate::store::UnitOfWork;

#[derive(Debug, Clone, Serialize)]
pub struct RecipeLineView {
    #[serde(flatten)]
    pub line: RecipeLine,
    pub ingredient: Option<Ingredient>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRecipeLine {
    pub product_id: ProductId,
    pub ingredient_id: IngredientId,
    pub quantity_required: Quantity,
    pub usage_unit: Option<Unit>,
}

pub(super) async fn recipe_views(
    uow: &mut dyn UnitOfWork,
    product_id: ProductId,
) -> ServiceResult<Vec<RecipeLineView>> {
    let lines = uow.recipe(product_id).await?;
    let mut views = Vec::with_capacity(lines.len());
    for line in lines {
        let ingredient = uow.ingredient(line.ingredient_id).await?;
        views.push(RecipeLineView { line, ingredient });
    }
    Ok(views)
}

impl Services {
    pub async fn get_recipe(&self, product_id: ProductId) -> ServiceResult<Vec<RecipeLineView>> {
        let mut uow = self.begin().await?;
        recipe_views(uow.as_mut(), product_id).await
    }

    pub async fn add_recipe_line(&self, input: NewRecipeLine) -> ServiceResult<RecipeLine> {
        let mut uow = self.begin().await?;
        if uow.product(input.product_id).await?.is_none() {
            return Err(ServiceError::not_found("product"));
        }
        if uow.ingredient(input.ingredient_id).await?.is_none() {
            return Err(ServiceError::not_found("ingredient"));
        }
        let existing = uow.recipe(input.product_id).await?;
        ensure_ingredient_not_in_recipe(&existing, input.ingredient_id)?;

        let line = RecipeLine::new(
            input.product_id,
            input.ingredient_id,
            input.quantity_required,
            input.usage_unit,
        )?;
        uow.insert_recipe_line(&line).await?;
        uow.commit().await?;

        tracing::info!(product_id = %line.product_id, ingredient_id = %line.ingredient_id, "recipe line added");
        Ok(line)
    }

    pub async fn remove_recipe_line(&self, id: RecipeLineId) -> ServiceResult<()> {
        let mut uow = self.begin().await?;
        if !uow.delete_recipe_line(id).await? {
            return Err(ServiceError::not_found("recipe line"));
        }
        uow.commit().await?;
        Ok(())
    }
}
