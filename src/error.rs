//! Gateway-surface error vocabulary
//!
//! Resolution failures travel inside the JSON-RPC body, not as HTTP errors:
//! the transport worked, the resolution did not. Component-level errors live
//! next to their components ([`crate::resolver::ResolveError`],
//! [`crate::provision::ProvisionError`]).

use serde_json::{json, Value};

/// JSON-RPC error codes used on the gateway surface.
pub mod rpc_code {
    /// Request carried no usable tool name.
    pub const INVALID_REQUEST: i64 = -32600;
    /// Discovery produced zero candidates.
    pub const NO_PROVIDER_FOUND: i64 = -32001;
    /// A candidate was found but installation failed.
    pub const INSTALL_FAILED: i64 = -32002;
}

/// A JSON-RPC 2.0 success envelope.
pub fn rpc_result(id: Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

/// A JSON-RPC 2.0 error envelope.
pub fn rpc_error(id: Value, code: i64, message: &str) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
}
