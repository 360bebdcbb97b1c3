//! Dashboard aggregates over orders. Days are UTC calendar days.

use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use bakery_core::{Money, ProductId};

use crate::order::{Order, OrderStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub sales_today: Money,
    pub active_orders: usize,
    pub active_products: usize,
    pub low_stock_ingredients: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySales {
    pub date: NaiveDate,
    /// `dd/mm`
    pub label: String,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopProduct {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: i64,
}

fn counts_as_sale(order: &Order) -> bool {
    order.status != OrderStatus::Cancelled
}

/// Sum of totals of non-cancelled orders placed on `day`.
pub fn sales_on<'a>(orders: impl IntoIterator<Item = &'a Order>, day: NaiveDate) -> Money {
    orders
        .into_iter()
        .filter(|o| counts_as_sale(o) && o.placed_at.date_naive() == day)
        .map(|o| o.total)
        .sum()
}

/// Seven rows ending at `today`, oldest first, zero-filled.
pub fn daily_sales<'a>(
    orders: impl IntoIterator<Item = &'a Order>,
    today: NaiveDate,
) -> Vec<DailySales> {
    let mut totals: HashMap<NaiveDate, Money> = HashMap::new();
    for order in orders.into_iter().filter(|o| counts_as_sale(o)) {
        let entry = totals.entry(order.placed_at.date_naive()).or_default();
        *entry = *entry + order.total;
    }

    (0..7u64)
        .rev()
        .filter_map(|back| today.checked_sub_days(Days::new(back)))
        .map(|date| DailySales {
            date,
            label: date.format("%d/%m").to_string(),
            total: totals.get(&date).copied().unwrap_or(Money::ZERO),
        })
        .collect()
}

/// Best sellers by units over non-cancelled orders.
///
/// `name_of` resolves product names; vanished products are reported as `"Unknown"`.
pub fn top_products<'a>(
    orders: impl IntoIterator<Item = &'a Order>,
    name_of: impl Fn(ProductId) -> Option<String>,
    limit: usize,
) -> Vec<TopProduct> {
    let mut units: HashMap<ProductId, i64> = HashMap::new();
    for order in orders.into_iter().filter(|o| counts_as_sale(o)) {
        for (product_id, quantity) in order.quantities() {
            *units.entry(product_id).or_default() += quantity;
        }
    }

    let mut ranked: Vec<(ProductId, i64)> = units.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(product_id, quantity)| TopProduct {
            product_id,
            name: name_of(product_id).unwrap_or_else(|| "Unknown".to_string()),
            quantity,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{Fulfillment, OrderDraft, OrderLine};
    use chrono::{TimeZone, Utc};

    fn order_on(day: u32, lines: Vec<(ProductId, i64)>, status: OrderStatus) -> Order {
        let at = Utc.with_ymd_and_hms(2026, 3, day, 15, 0, 0).unwrap();
        let lines = lines
            .into_iter()
            .map(|(p, q)| OrderLine::priced(p, q, Money::from_cents(1000), None).unwrap())
            .collect();
        let (mut order, _) = Order::place(
            OrderDraft {
                user_id: None,
                fulfillment: Fulfillment::Pickup,
                scheduled_for: at,
                delivery_address: None,
                address_reference: None,
                notes: None,
                shipping_cost: Money::ZERO,
                lines,
            },
            at,
        )
        .unwrap();
        order.status = status;
        order
    }

    #[test]
    fn cancelled_orders_do_not_count() {
        let p = ProductId::new();
        let orders = vec![
            order_on(10, vec![(p, 2)], OrderStatus::Paid),
            order_on(10, vec![(p, 5)], OrderStatus::Cancelled),
            order_on(9, vec![(p, 1)], OrderStatus::Delivered),
        ];
        let day = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        assert_eq!(sales_on(&orders, day), Money::from_cents(2000));
    }

    #[test]
    fn daily_sales_are_zero_filled() {
        let p = ProductId::new();
        let orders = vec![
            order_on(10, vec![(p, 2)], OrderStatus::Paid),
            order_on(7, vec![(p, 1)], OrderStatus::Ready),
            order_on(1, vec![(p, 9)], OrderStatus::Paid),
        ];
        let rows = daily_sales(&orders, NaiveDate::from_ymd_opt(2026, 3, 10).unwrap());
        assert_eq!(rows.len(), 7);
        assert_eq!(rows[0].label, "04/03");
        assert_eq!(rows[6].label, "10/03");
        assert_eq!(rows[3].total, Money::from_cents(1000));
        assert_eq!(rows[6].total, Money::from_cents(2000));
        assert_eq!(rows[1].total, Money::ZERO);
    }

    #[test]
    fn top_products_ranks_and_names() {
        let bread = ProductId::new();
        let cake = ProductId::new();
        let gone = ProductId::new();
        let orders = vec![
            order_on(1, vec![(bread, 3), (cake, 1)], OrderStatus::Paid),
            order_on(2, vec![(cake, 4), (gone, 2)], OrderStatus::Delivered),
            order_on(3, vec![(gone, 50)], OrderStatus::Cancelled),
        ];
        let top = top_products(
            &orders,
            |id| {
                if id == bread {
                    Some("Pan".into())
                } else if id == cake {
                    Some("Torta".into())
                } else {
                    None
                }
            },
            5,
        );
        assert_eq!(top.len(), 3);
        assert_eq!((top[0].name.as_str(), top[0].quantity), ("Torta", 5));
        assert_eq!((top[1].name.as_str(), top[1].quantity), ("Pan", 3));
        assert_eq!((top[2].name.as_str(), top[2].quantity), ("Unknown", 2));
    }
}
