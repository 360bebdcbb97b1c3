use chrono::Utc;

use bakery_sales::{DailySales, DashboardStats, TopProduct, daily_sales, sales_on, top_products};

use super::Services;
use crate::error::ServiceResult;
use crate::store::OrderFilter;

const TOP_PRODUCTS: usize = 5;

impl Services {
    pub async fn dashboard_stats(&self) -> ServiceResult<DashboardStats> {
        let mut uow = self.begin().await?;
        let orders = uow.orders(&OrderFilter::default()).await?;
        let products = uow.products().await?;
        let ingredients = uow.ingredients().await?;

        Ok(DashboardStats {
            sales_today: sales_on(&orders, Utc::now().date_naive()),
            active_orders: orders.iter().filter(|o| !o.status.is_terminal()).count(),
            active_products: products.iter().filter(|p| p.active).count(),
            low_stock_ingredients: ingredients.iter().filter(|i| i.is_low_stock()).count(),
        })
    }

    /// Last seven days including today.
    pub async fn sales_report(&self) -> ServiceResult<Vec<DailySales>> {
        let today = Utc::now().date_naive();
        let since = today
            .checked_sub_days(chrono::Days::new(6))
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|d| d.and_utc());
        let mut uow = self.begin().await?;
        let orders = uow
            .orders(&OrderFilter {
                placed_from: since,
                ..OrderFilter::default()
            })
            .await?;
        Ok(daily_sales(&orders, today))
    }

    pub async fn top_products(&self) -> ServiceResult<Vec<TopProduct>> {
        let mut uow = self.begin().await?;
        let orders = uow.orders(&OrderFilter::default()).await?;
        let products = uow.products().await?;
        Ok(top_products(
            &orders,
            |id| products.iter().find(|p| p.id == id).map(|p| p.name.clone()),
            TOP_PRODUCTS,
        ))
    }
}
