//! Sales domain: customer orders, payments and sales reporting.
//!
//! Pricing is the caller's job: order lines are built from catalog prices
//! before [`Order::place`] validates and totals them.

pub mod order;
pub mod payment;
pub mod reports;

pub use order::{
    ChangeOrderStatus, Fulfillment, Order, OrderCommand, OrderDraft, OrderEvent, OrderLine,
    OrderPlaced, OrderStatus, OrderStatusChanged,
};
pub use payment::{Payment, PaymentMethod, PaymentStatus};
pub use reports::{DailySales, DashboardStats, TopProduct, daily_sales, sales_on, top_products};
