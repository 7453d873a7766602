//! HTTP handlers for the Warehouse Stock Management Platform

pub mod health;
pub mod production;
pub mod purchase;
pub mod restock;
pub mod sales;
pub mod shipment;
pub mod stock;
pub mod threshold;

pub use health::*;
pub use production::*;
pub use purchase::*;
pub use restock::*;
pub use sales::*;
pub use shipment::*;
pub use stock::*;
pub use threshold::*;
