use chrono::Utc;
use serde::Serialize;

use bakery_auth::Principal;
use bakery_core::{IngredientId, SupplierId};
use bakery_inventory::{Ingredient, IngredientDraft, StockMovement, Supplier, SupplierDraft};

use super::Services;
use crate::error::{ServiceError, ServiceResult};
use crate::store::UnitOfWork;

#[derive(Debug, Clone, Serialize)]
pub struct IngredientView {
    #[serde(flatten)]
    pub ingredient: Ingredient,
    pub low_stock: bool,
    pub preferred_supplier: Option<Supplier>,
}

impl Services {
    pub async fn list_suppliers(&self) -> ServiceResult<Vec<Supplier>> {
        let mut uow = self.begin().await?;
        Ok(uow.suppliers().await?)
    }

    pub async fn create_supplier(&self, draft: SupplierDraft) -> ServiceResult<Supplier> {
        let supplier = Supplier::create(draft)?;
        let mut uow = self.begin().await?;
        uow.insert_supplier(&supplier).await?;
        uow.commit().await?;

        tracing::info!(supplier_id = %supplier.id, "supplier created");
        Ok(supplier)
    }

    pub async fn update_supplier(&self, id: SupplierId, draft: SupplierDraft) -> ServiceResult<Supplier> {
        let mut uow = self.begin().await?;
        let mut supplier = uow.supplier(id).await?.ok_or_else(|| ServiceError::not_found("supplier"))?;
        supplier.update(draft)?;
        uow.update_supplier(&supplier).await?;
        uow.commit().await?;
        Ok(supplier)
    }

    pub async fn delete_supplier(&self, id: SupplierId) -> ServiceResult<()> {
        let mut uow = self.begin().await?;
        if uow.supplier(id).await?.is_none() {
            return Err(ServiceError::not_found("supplier"));
        }
        if uow.supplier_in_use(id).await? {
            return Err(ServiceError::conflict(
                "supplier is the preferred supplier of one or more ingredients",
            ));
        }
        uow.delete_supplier(id).await?;
        uow.commit().await?;

        tracing::info!(supplier_id = %id, "supplier deleted");
        Ok(())
    }

    pub async fn list_ingredients(&self) -> ServiceResult<Vec<IngredientView>> {
        let mut uow = self.begin().await?;
        let suppliers = uow.suppliers().await?;
        let ingredients = uow.ingredients().await?;
        Ok(ingredients
            .into_iter()
            .map(|ingredient| IngredientView {
                low_stock: ingredient.is_low_stock(),
                preferred_supplier: ingredient
                    .preferred_supplier_id
                    .and_then(|id| suppliers.iter().find(|s| s.id == id).cloned()),
                ingredient,
            })
            .collect())
    }

    /// Insert the ingredient and, if it starts with stock, its opening movement.
    pub async fn create_ingredient(&self, actor: &Principal, draft: IngredientDraft) -> ServiceResult<Ingredient> {
        let mut uow = self.begin().await?;
        ensure_supplier(uow.as_mut(), &draft).await?;
        let (ingredient, opening) = Ingredient::create(draft, Some(actor.user_id), Utc::now())?;
        uow.insert_ingredient(&ingredient).await?;
        if let Some(movement) = &opening {
            uow.insert_movement(movement).await?;
        }
        uow.commit().await?;

        tracing::info!(ingredient_id = %ingredient.id, stock = %ingredient.stock, "ingredient created");
        Ok(ingredient)
    }

    /// Update the ingredient; a stock change is written to the kardex in the same unit of work.
    pub async fn update_ingredient(
        &self,
        actor: &Principal,
        id: IngredientId,
        draft: IngredientDraft,
    ) -> ServiceResult<Ingredient> {
        let mut uow = self.begin().await?;
        let mut ingredient = uow
            .ingredient(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("ingredient"))?;
        ensure_supplier(uow.as_mut(), &draft).await?;
        let movement = ingredient.update(draft, Some(actor.user_id), Utc::now())?;
        uow.update_ingredient(&ingredient).await?;
        if let Some(movement) = &movement {
            uow.insert_movement(movement).await?;
        }
        uow.commit().await?;

        if let Some(m) = movement {
            tracing::info!(ingredient_id = %id, kind = m.kind.as_str(), quantity = %m.quantity, "stock adjusted");
        }
        Ok(ingredient)
    }

    pub async fn delete_ingredient(&self, id: IngredientId) -> ServiceResult<()> {
        let mut uow = self.begin().await?;
        if uow.ingredient(id).await?.is_none() {
            return Err(ServiceError::not_found("ingredient"));
        }
        if uow.ingredient_in_use(id).await? {
            return Err(ServiceError::conflict(
                "ingredient is part of recipes or has kardex movements",
            ));
        }
        uow.delete_ingredient(id).await?;
        uow.commit().await?;

        tracing::info!(ingredient_id = %id, "ingredient deleted");
        Ok(())
    }

    /// Kardex, newest first. `None` lists every ingredient.
    pub async fn list_movements(&self, ingredient: Option<IngredientId>) -> ServiceResult<Vec<StockMovement>> {
        let mut uow = self.begin().await?;
        if let Some(id) = ingredient {
            if uow.ingredient(id).await?.is_none() {
                return Err(ServiceError::not_found("ingredient"));
            }
        }
        Ok(uow.movements(ingredient).await?)
    }
}

async fn ensure_supplier(uow: &mut dyn UnitOfWork, draft: &IngredientDraft) -> ServiceResult<()> {
    if let Some(id) = draft.preferred_supplier_id {
        if uow.supplier(id).await?.is_none() {
            return Err(ServiceError::validation("preferred supplier does not exist"));
        }
    }
    Ok(())
}
