//! Operation registration and dispatch.
//!
//! 1. **Schema store** (`store`): operation name -> declarative spec,
//!    first registration wins
//! 2. **Handlers** (`handler`): the `OperationHandler` trait and registry
//! 3. **Dispatch** (`dispatch`): the per-call sequence tying audit,
//!    validation, handler execution, and response envelopes together

pub mod dispatch;
pub mod handler;
pub mod store;

pub use dispatch::{dispatch, error_envelope, validation_envelope, AppState};
pub use handler::{
    handler_fn, CallContext, FnHandler, HandlerOutcome, HandlerRegistry, OperationHandler,
    RequestMeta,
};
pub use store::SchemaStore;
