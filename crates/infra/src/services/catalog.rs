use chrono::Utc;
use serde::Serialize;

use bakery_catalog::{Category, Product, ProductDraft};
use bakery_core::ProductId;

use super::{RecipeLineView, Services};
use crate::error::{ServiceError, ServiceResult};
use crate::store::UnitOfWork;

#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub category: Option<Category>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub category: Option<Category>,
    pub recipe: Vec<RecipeLineView>,
}

impl Services {
    pub async fn list_categories(&self) -> ServiceResult<Vec<Category>> {
        let mut uow = self.begin().await?;
        let mut categories = uow.categories().await?;
        categories.retain(|c| c.active);
        Ok(categories)
    }

    pub async fn create_category(&self, name: &str, image_url: Option<String>) -> ServiceResult<Category> {
        let category = Category::new(name, image_url)?;
        let mut uow = self.begin().await?;
        uow.insert_category(&category).await?;
        uow.commit().await?;

        tracing::info!(category_id = %category.id, "category created");
        Ok(category)
    }

    /// Storefront listing: active products only.
    pub async fn list_products(&self) -> ServiceResult<Vec<ProductView>> {
        let mut uow = self.begin().await?;
        let categories = uow.categories().await?;
        let products = uow.products().await?;
        Ok(products
            .into_iter()
            .filter(|p| p.active)
            .map(|product| {
                let category = categories.iter().find(|c| c.id == product.category_id).cloned();
                ProductView { product, category }
            })
            .collect())
    }

    pub async fn get_product(&self, id: ProductId) -> ServiceResult<ProductDetail> {
        let mut uow = self.begin().await?;
        let product = uow.product(id).await?.ok_or_else(|| ServiceError::not_found("product"))?;
        let category = uow.category(product.category_id).await?;
        let recipe = super::recipes::recipe_views(uow.as_mut(), id).await?;
        Ok(ProductDetail {
            product,
            category,
            recipe,
        })
    }

    pub async fn create_product(&self, draft: ProductDraft) -> ServiceResult<Product> {
        let mut uow = self.begin().await?;
        ensure_category(uow.as_mut(), &draft).await?;
        let product = Product::create(draft, Utc::now())?;
        uow.insert_product(&product).await?;
        uow.commit().await?;

        tracing::info!(product_id = %product.id, name = %product.name, "product created");
        Ok(product)
    }

    pub async fn update_product(&self, id: ProductId, draft: ProductDraft) -> ServiceResult<Product> {
        let mut uow = self.begin().await?;
        let mut product = uow.product(id).await?.ok_or_else(|| ServiceError::not_found("product"))?;
        ensure_category(uow.as_mut(), &draft).await?;
        product.update(draft)?;
        uow.update_product(&product).await?;
        uow.commit().await?;

        tracing::info!(product_id = %product.id, "product updated");
        Ok(product)
    }

    pub async fn delete_product(&self, id: ProductId) -> ServiceResult<()> {
        let mut uow = self.begin().await?;
        let mut product = uow.product(id).await?.ok_or_else(|| ServiceError::not_found("product"))?;
        product.deactivate();
        uow.update_product(&product).await?;
        uow.commit().await?;

        tracing::info!(product_id = %id, "product deactivated");
        Ok(())
    }
}

async fn ensure_category(uow: &mut dyn UnitOfWork, draft: &ProductDraft) -> ServiceResult<()> {
    if uow.category(draft.category_id).await?.is_none() {
        return Err(ServiceError::validation("category does not exist"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bakery_core::Money;
    use crate::services::testkit::TestEnv;

    #[tokio::test]
    async fn deleted_products_leave_the_storefront() {
        let env = TestEnv::new();
        let keep = env.product("Pan frances", 10, 50).await;
        let gone = env.product("Keke", 3, 1200).await;

        env.services.delete_product(gone).await.unwrap();
        let listed = env.services.list_products().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].product.id, keep);
        assert!(listed[0].category.is_some());

        let detail = env.services.get_product(gone).await.unwrap();
        assert!(!detail.product.active);
    }

    #[tokio::test]
    async fn unknown_category_is_a_validation_error() {
        let env = TestEnv::new();
        let err = env
            .services
            .create_product(ProductDraft {
                name: "Alfajor".into(),
                description: None,
                base_price: Money::from_cents(250),
                category_id: bakery_core::CategoryId::new(),
                image_url: None,
                customizable: false,
                showcase_stock: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(bakery_core::DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn missing_product_is_not_found() {
        let env = TestEnv::new();
        let err = env.services.get_product(ProductId::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(bakery_core::DomainError::NotFound(_))));
    }
}
