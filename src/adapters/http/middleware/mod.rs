//! HTTP middleware for axum.
//!
//! - `auth` - Bearer token validation and the `RequireAuth` extractor
//! - `cron` - Shared-secret guard for the reconciliation sweep trigger

pub mod auth;
pub mod cron;

pub use auth::{auth_middleware, AuthRejection, AuthState, RequireAuth};
pub use cron::{require_cron_secret, CronState};
