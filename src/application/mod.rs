//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Following CQRS, it separates command handlers (write) from query handlers (read).
//! Lifecycle writes run through [`in_transaction`].

pub mod handlers;
mod transaction;

pub use transaction::in_transaction;
