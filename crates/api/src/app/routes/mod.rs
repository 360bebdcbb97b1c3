use axum::{Router, routing::get};

pub mod auth;
pub mod deliveries;
pub mod ingredients;
pub mod orders;
pub mod production;
pub mod products;
pub mod recipes;
pub mod reports;
pub mod suppliers;
pub mod system;
pub mod users;

/// Router nested under `/api`. Handlers that take a `PrincipalContext` are
/// protected; the rest are public.
pub fn router() -> Router {
    Router::new()
        .route("/stream", get(system::stream))
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/products", products::router())
        .nest("/ingredients", ingredients::router())
        .nest("/suppliers", suppliers::router())
        .nest("/recipes", recipes::router())
        .nest("/production", production::router())
        .nest("/orders", orders::router())
        .nest("/deliveries", deliveries::router())
        .nest("/reports", reports::router())
}
