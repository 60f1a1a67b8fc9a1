//! School Shuttle - Driver subscriptions and payments
//!
//! Plans, subscriptions, PayTech payments, saved payment methods and the
//! notification inbox, organised as domain, ports, application handlers and
//! adapters.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
