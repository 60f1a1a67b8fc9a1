//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `auth` - Bearer token validation (JWT, mock)
//! - `http` - axum REST surface
//! - `memory` - In-memory store used by tests and local runs
//! - `paytech` - PayTech payment gateway and IPN decoding
//! - `postgres` - PostgreSQL store, reader and notification inbox
//! - `sms` - Payment receipt senders (Twilio, logging)

pub mod auth;
pub mod http;
pub mod memory;
pub mod paytech;
pub mod postgres;
pub mod sms;
