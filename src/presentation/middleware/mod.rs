//! Middleware
//!
//! Tower middleware for request processing.

pub mod auth;
pub mod context;
pub mod cors;
pub mod logging;

pub use auth::{auth_middleware, AuthUser};
pub use context::{request_context, RequestContext, REQUEST_ID_HEADER};
pub use logging::{create_trace_layer, track_metrics};
