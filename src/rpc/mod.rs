//! JSON-RPC 2.0 over WebSocket (C10): wire types, the request-gate
//! dispatcher, method routing, request metrics, and the axum transport.

pub mod dispatcher;
pub mod handlers;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod types;

pub use dispatcher::{ConnectionContext, Dispatcher};
pub use metrics::RequestMetrics;
pub use server::ws_handler;
pub use types::{JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
