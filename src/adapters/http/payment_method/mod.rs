//! HTTP adapter for saved payment methods.
//!
//! - `GET /api/payment-methods` - List saved methods
//! - `POST /api/payment-methods` - Save a method
//! - `DELETE /api/payment-methods/:id` - Remove a method
//! - `PUT /api/payment-methods/:id/default` - Make a method the default

pub mod dto;
pub mod handlers;
pub mod routes;

pub use routes::payment_method_routes;
