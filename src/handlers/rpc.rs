//! Gateway HTTP surface
//!
//! `POST /mcp/v1` takes a JSON-RPC-shaped tool invocation, resolves which
//! server should handle it, and answers with the bound server id. The
//! envelope handling is deliberately lenient: missing `jsonrpc`, `id`,
//! `method` or `params` are defaulted instead of rejected. Actually invoking
//! the resolved server is not this gateway's job.

use crate::error::{rpc_code, rpc_error, rpc_result};
use crate::resolver::ResolveError;
use crate::AppState;
use axum::{extract::State, response::Json};
use serde_json::{json, Value};

pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

pub async fn handle_rpc(State(state): State<AppState>, Json(body): Json<Value>) -> Json<Value> {
    let envelope = normalize_envelope(body);
    let id = envelope.get("id").cloned().unwrap_or(json!(1));

    let Some(tool_name) = extract_tool_name(&envelope) else {
        return Json(rpc_error(
            id,
            rpc_code::INVALID_REQUEST,
            "request carries no tool name (params.name) or resource (params.uri)",
        ));
    };

    match state.resolver.resolve(&tool_name).await {
        Ok(server) => Json(rpc_result(id, json!({"tool": tool_name, "server": server}))),
        Err(e @ ResolveError::NoProviderFound(_)) => {
            Json(rpc_error(id, rpc_code::NO_PROVIDER_FOUND, &e.to_string()))
        }
        Err(e @ ResolveError::InstallFailed { .. }) => {
            Json(rpc_error(id, rpc_code::INSTALL_FAILED, &e.to_string()))
        }
    }
}

/// Fills a partial request out to a JSON-RPC 2.0 envelope. Already-conformant
/// bodies pass through untouched.
fn normalize_envelope(body: Value) -> Value {
    if body.get("jsonrpc").and_then(|v| v.as_str()) == Some("2.0") {
        return body;
    }
    json!({
        "jsonrpc": "2.0",
        "id": body.get("id").cloned().unwrap_or(json!(1)),
        "method": body.get("method").cloned().unwrap_or(json!("tools/call")),
        "params": body.get("params").cloned().unwrap_or(json!({})),
    })
}

/// The core consumes `params.name`; `params.uri` stands in for it only on
/// `resources/read`, where the request names a resource instead of a tool.
fn extract_tool_name(envelope: &Value) -> Option<String> {
    let params = envelope.get("params")?;
    let uri = if envelope.get("method").and_then(|m| m.as_str()) == Some("resources/read") {
        params.get("uri")
    } else {
        None
    };
    params
        .get("name")
        .or(uri)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conformant_envelope_passes_through() {
        let body = json!({"jsonrpc": "2.0", "id": 7, "method": "tools/call", "params": {"name": "x"}});
        assert_eq!(normalize_envelope(body.clone()), body);
    }

    #[test]
    fn bare_body_is_defaulted() {
        let normalized = normalize_envelope(json!({"params": {"name": "list_repos"}}));
        assert_eq!(normalized["jsonrpc"], "2.0");
        assert_eq!(normalized["id"], 1);
        assert_eq!(normalized["method"], "tools/call");
        assert_eq!(normalized["params"]["name"], "list_repos");
    }

    #[test]
    fn request_id_is_preserved() {
        let normalized = normalize_envelope(json!({"id": "req-9", "params": {}}));
        assert_eq!(normalized["id"], "req-9");
    }

    #[test]
    fn tool_name_comes_from_name_then_uri() {
        let by_name =
            json!({"method": "tools/call", "params": {"name": "list_repos", "uri": "file:///x"}});
        assert_eq!(extract_tool_name(&by_name).as_deref(), Some("list_repos"));

        let by_uri = json!({"method": "resources/read", "params": {"uri": "file:///x"}});
        assert_eq!(extract_tool_name(&by_uri).as_deref(), Some("file:///x"));

        assert_eq!(extract_tool_name(&json!({"params": {}})), None);
        assert_eq!(extract_tool_name(&json!({})), None);
    }

    #[test]
    fn uri_is_ignored_outside_resource_reads() {
        let tool_call = json!({"method": "tools/call", "params": {"uri": "file:///x"}});
        assert_eq!(extract_tool_name(&tool_call), None);
    }
}
