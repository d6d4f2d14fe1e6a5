//! Axum handler functions for the opsgate server.

pub mod health;
pub mod operation;

pub use health::status_handler;
pub use operation::operation_handler;
