//! HTTP adapters - REST API implementations.
//!
//! Each area has its own module with DTOs, handlers and routes; `router`
//! assembles them behind the auth and cron guards.

pub mod admin;
pub mod error;
pub mod middleware;
pub mod notification;
pub mod payment_method;
pub mod router;
pub mod state;
pub mod subscription;

pub use error::{ApiError, ErrorResponse};
pub use router::{api_routes, build_router};
pub use state::AppState;
