//! HTTP transport: middleware, handler functions, and the server lifecycle.

pub mod handlers;
pub mod middleware;
pub mod module;

pub use handlers::{operation_handler, status_handler};
pub use middleware::build_http_layers;
pub use module::ApiModule;
