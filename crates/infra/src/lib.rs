//! Infrastructure layer: configuration, persistence and application services.
//!
//! Services are written once against [`store::UnitOfWork`]; every multi-table
//! write runs inside one unit of work and is committed or dropped as a whole.

pub mod config;
pub mod error;
pub mod publish;
pub mod services;
pub mod store;

pub use error::{ServiceError, ServiceResult};
pub use publish::{EventPublisher, NoopPublisher};
pub use services::Services;
