//! HTTP adapter for the subscription lifecycle.
//!
//! - `GET /api/plans` - Plans available to the caller's role
//! - `GET /api/subscription` - Current subscription and history
//! - `POST /api/subscription` - Subscribe and start payment
//! - `POST /api/subscription/renew` - Renew with a saved or new method
//! - `POST /api/subscription/cancel` - Cancel now or at period end
//! - `DELETE /api/subscription` - Cancel the current subscription now
//! - `GET|POST /api/subscriptions/sweep` - Daily sweep (cron secret)
//! - `POST /api/webhooks/paytech` - PayTech payment notifications

pub mod dto;
pub mod handlers;
pub mod routes;

pub use routes::{subscription_routes, sweep_routes, webhook_routes};
