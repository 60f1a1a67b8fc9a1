//! HTTP adapter for administration reports (admin role).
//!
//! - `GET /api/admin/subscriptions` - Active subscriptions
//! - `GET /api/admin/payments/summary` - Monthly revenue and pending payments

pub mod dto;
pub mod handlers;
pub mod routes;

pub use routes::admin_routes;
