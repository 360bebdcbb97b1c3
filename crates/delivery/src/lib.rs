//! Delivery domain: dispatch, driver claiming and proof of delivery.

pub mod delivery;

pub use delivery::{
    Delivery, DeliveryAssigned, DeliveryClaimed, DeliveryCommand, DeliveryEvent, DeliveryStatus,
    DeliveryStatusChanged, UpdateDeliveryStatus,
};
