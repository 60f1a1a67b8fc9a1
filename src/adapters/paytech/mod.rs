//! PayTech payment gateway integration.
//!
//! - `PaytechGateway` - Opens hosted payment sessions
//! - `PaytechIpn` / `IpnVerifier` - Decodes and authenticates settlement callbacks
//! - `MockPaymentGateway` - Deterministic gateway for tests and local runs

mod ipn;
mod mock_gateway;
mod paytech_adapter;

pub use ipn::{IpnError, IpnVerifier, PaytechIpn};
pub use mock_gateway::MockPaymentGateway;
pub use paytech_adapter::{PaytechConfig, PaytechEnvironment, PaytechGateway};
