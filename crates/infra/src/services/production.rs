use chrono::Utc;
use serde::Serialize;

use bakery_auth::{Principal, Role};
use bakery_core::{Aggregate, ProductionOrderId};
use bakery_events::EventEnvelope;
use bakery_production::{
    ChangeProductionStatus, NewProductionOrder, ProductionCommand, ProductionEvent, ProductionOrder,
    ProductionStatus, backflush_plan, production_note,
};

use super::Services;
use crate::error::{ServiceError, ServiceResult};
use crate::store::UnitOfWork;

#[derive(Debug, Clone, Serialize)]
pub struct ProductionOrderView {
    #[serde(flatten)]
    pub order: ProductionOrder,
    pub product_name: Option<String>,
    pub baker_name: Option<String>,
}

impl Services {
    /// Newest first, with product and baker names.
    pub async fn list_production_orders(&self) -> ServiceResult<Vec<ProductionOrderView>> {
        let mut uow = self.begin().await?;
        let products = uow.products().await?;
        let users = uow.users().await?;
        let orders = uow.production_orders().await?;
        Ok(orders
            .into_iter()
            .map(|order| ProductionOrderView {
                product_name: products
                    .iter()
                    .find(|p| p.id == order.product_id)
                    .map(|p| p.name.clone()),
                baker_name: order
                    .assigned_baker_id
                    .and_then(|id| users.iter().find(|u| u.id == id))
                    .map(|u| u.full_name.clone()),
                order,
            })
            .collect())
    }

    pub async fn create_production_order(&self, input: NewProductionOrder) -> ServiceResult<ProductionOrder> {
        let mut uow = self.begin().await?;
        if uow.product(input.product_id).await?.is_none() {
            return Err(ServiceError::validation("product does not exist"));
        }
        if let Some(baker_id) = input.assigned_baker_id {
            let eligible = uow.user(baker_id).await?.is_some_and(|u| {
                u.is_active_with_role(Role::Baker) || u.is_active_with_role(Role::Admin)
            });
            if !eligible {
                return Err(ServiceError::validation(
                    "assigned baker must be an active baker or admin",
                ));
            }
        }
        let order = ProductionOrder::create(input, Utc::now())?;
        uow.insert_production_order(&order).await?;
        uow.commit().await?;

        tracing::info!(production_order_id = %order.id, batch = %order.batch_code, quantity = order.quantity, "production order created");
        Ok(order)
    }

    /// Move a production order through the pipeline.
    ///
    /// The first transition to `finished` also stocks the showcase and
    /// backflushes the recipe, all in the same unit of work. Any ingredient
    /// short of stock aborts the whole change.
    pub async fn change_production_status(
        &self,
        actor: &Principal,
        id: ProductionOrderId,
        status: ProductionStatus,
    ) -> ServiceResult<ProductionOrder> {
        let mut uow = self.begin().await?;
        let mut order = uow
            .production_order(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("production order"))?;

        let events = order.execute(&ProductionCommand::ChangeStatus(ChangeProductionStatus {
            status,
            occurred_at: Utc::now(),
        }))?;
        if events.is_empty() {
            return Ok(order);
        }

        for event in &events {
            if let ProductionEvent::Finished(_) = event {
                apply_finished(uow.as_mut(), actor, &order).await?;
            }
        }

        uow.update_production_order(&order).await?;
        uow.commit().await?;

        if order.is_finished() {
            tracing::info!(production_order_id = %id, batch = %order.batch_code, quantity = order.quantity, "production order finished");
        } else {
            tracing::info!(production_order_id = %id, status = %order.status, "production status changed");
        }
        self.publish(
            events
                .iter()
                .map(|e| EventEnvelope::wrap("production_order", *id.as_uuid(), e))
                .collect(),
        );
        Ok(order)
    }

    pub async fn delete_production_order(&self, id: ProductionOrderId) -> ServiceResult<()> {
        let mut uow = self.begin().await?;
        let order = uow
            .production_order(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("production order"))?;
        order.ensure_deletable()?;
        uow.delete_production_order(id).await?;
        uow.commit().await?;

        tracing::info!(production_order_id = %id, "production order deleted");
        Ok(())
    }
}

/// Showcase restock plus ingredient backflush for a finished run.
async fn apply_finished(
    uow: &mut dyn UnitOfWork,
    actor: &Principal,
    order: &ProductionOrder,
) -> ServiceResult<()> {
    let now = Utc::now();
    let mut product = uow
        .product(order.product_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("product"))?;
    product.restock(order.quantity)?;

    let recipe = uow.recipe(order.product_id).await?;
    let note = production_note(&order.batch_code, &product.name);
    for line in backflush_plan(&recipe, order.quantity)? {
        let mut ingredient = uow
            .ingredient(line.ingredient_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("ingredient"))?;
        let movement = ingredient
            .consume(line.need, note.clone(), Some(actor.user_id), now)
            .inspect_err(|e| {
                tracing::warn!(production_order_id = %order.id, ingredient_id = %line.ingredient_id, error = %e, "backflush rejected");
            })?;
        uow.update_ingredient(&ingredient).await?;
        uow.insert_movement(&movement).await?;
    }

    uow.update_product(&product).await?;
    Ok(())
}
