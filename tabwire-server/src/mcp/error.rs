//! MCP error types

use std::io;

use super::protocol::JsonRpcError;

/// MCP server errors
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// IO error (stdin/stdout)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Request object is well-formed JSON but not a usable request
    #[error("Invalid Request: {0}")]
    InvalidRequest(String),

    /// Method not found
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Invalid parameters
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Unknown tool
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<McpError> for JsonRpcError {
    fn from(err: McpError) -> Self {
        let code = match &err {
            McpError::Json(_) => JsonRpcError::PARSE_ERROR,
            McpError::InvalidRequest(_) => JsonRpcError::INVALID_REQUEST,
            McpError::MethodNotFound(_) => JsonRpcError::METHOD_NOT_FOUND,
            McpError::InvalidParams(_) | McpError::UnknownTool(_) => JsonRpcError::INVALID_PARAMS,
            McpError::Io(_) | McpError::Internal(_) => JsonRpcError::INTERNAL_ERROR,
        };
        JsonRpcError::new(code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_not_found_mapping() {
        let err: JsonRpcError = McpError::MethodNotFound("foo/bar".into()).into();
        assert_eq!(err.code, -32601);
        assert_eq!(err.message, "Method not found: foo/bar");
    }

    #[test]
    fn test_internal_mapping() {
        let err: JsonRpcError = McpError::Internal("boom".into()).into();
        assert_eq!(err.code, -32603);
        assert_eq!(err.message, "Internal error: boom");
    }

    #[test]
    fn test_invalid_params_mapping() {
        let err: JsonRpcError = McpError::InvalidParams("Missing 'name' parameter".into()).into();
        assert_eq!(err.code, -32602);
    }
}
