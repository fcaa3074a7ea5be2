//! Standardized error handling patterns shared by all operations

use crate::error::{CephError, ConflictKind, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Error body the dashboard API returns alongside 4xx answers
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiException {
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default, deserialize_with = "deserialize_code")]
    pub code: Option<String>,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub task: Option<ExceptionTask>,
}

/// Task reference embedded in an exception body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExceptionTask {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub metadata: Value,
}

/// Accept an error code sent either as a JSON string or a JSON number.
pub fn deserialize_code<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    })
}

/// Standard error handler for HTTP responses
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// Decode the exception payload of a response body, if it carries one
    pub fn decode_exception(body: &[u8]) -> Option<ApiException> {
        if body.is_empty() {
            return None;
        }
        serde_json::from_slice::<ApiException>(body).ok()
    }

    /// Conflict kind encoded in a 400 body, if any
    pub fn conflict_in(body: &[u8]) -> Option<(ConflictKind, ApiException)> {
        let exception = Self::decode_exception(body)?;
        let kind = exception.code.as_deref().and_then(ConflictKind::from_code)?;
        Some((kind, exception))
    }

    /// Turn a definitive non-success answer into a typed error
    pub fn handle_api_error(status: u16, body: &[u8], operation: &str) -> CephError {
        let exception = Self::decode_exception(body);

        if let Some(ref exception) = exception {
            if let Some(kind) = exception.code.as_deref().and_then(ConflictKind::from_code) {
                return CephError::Conflict {
                    kind,
                    status,
                    code: kind.code().to_string(),
                    detail: exception.detail.clone().unwrap_or_default(),
                    operation: operation.to_string(),
                };
            }
        }

        let (code, detail) = match exception {
            Some(exception) => (exception.code, exception.detail),
            None => {
                let text = String::from_utf8_lossy(body).trim().to_string();
                (None, if text.is_empty() { None } else { Some(text) })
            }
        };

        if status == 401 || status == 403 {
            return CephError::Authentication(format!(
                "{} rejected with HTTP {}: {}",
                operation,
                status,
                detail.unwrap_or_else(|| "no detail".to_string())
            ));
        }

        CephError::Api {
            status,
            code,
            detail,
            operation: operation.to_string(),
        }
    }
}

/// Network error categorization and handling
pub struct NetworkErrorHandler;

impl NetworkErrorHandler {
    /// Categorize and format network errors with helpful context
    pub fn handle_network_error(error: &reqwest::Error, context: &str) -> CephError {
        if error.is_timeout() {
            CephError::Transport(format!("{} timeout: {}", context, error))
        } else if error.is_connect() {
            CephError::Transport(format!("Connection error during {}: {}", context, error))
        } else if error.to_string().contains("certificate") {
            CephError::Transport(format!("TLS certificate error during {}: {}", context, error))
        } else {
            CephError::Transport(format!("{} network error: {}", context, error))
        }
    }

    /// Connection and timeout failures are worth another try, builder errors are not
    pub fn is_transient(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect() || error.is_request()
    }
}

/// Validation error utilities
pub struct ValidationErrorHandler;

impl ValidationErrorHandler {
    /// Reject an empty identifying parameter before any network call
    pub fn require(value: &str, param: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(CephError::Validation(format!(
                "param {} can not be empty",
                param
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_exception_with_numeric_code() {
        let body = br#"{"detail": "[errno 17] RBD image already exists", "code": 17, "component": "rbd"}"#;
        let exception = HttpErrorHandler::decode_exception(body).unwrap();
        assert_eq!(exception.code.as_deref(), Some("17"));
        assert_eq!(exception.component.as_deref(), Some("rbd"));
    }

    #[test]
    fn test_conflict_on_bad_request() {
        let body = br#"{"detail": "exists", "code": "namespace_already_exists", "status": 400}"#;
        let err = HttpErrorHandler::handle_api_error(400, body, "namespace/create");
        match err {
            CephError::Conflict { kind, status, .. } => {
                assert_eq!(kind, ConflictKind::NamespaceAlreadyExists);
                assert_eq!(status, 400);
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_text_body_becomes_detail() {
        let err = HttpErrorHandler::handle_api_error(404, b"not here", "rbd/get");
        match err {
            CephError::Api { status, code, detail, .. } => {
                assert_eq!(status, 404);
                assert!(code.is_none());
                assert_eq!(detail.as_deref(), Some("not here"));
            }
            other => panic!("expected api error, got {:?}", other),
        }
    }

    #[test]
    fn test_unauthorized_maps_to_authentication() {
        let err = HttpErrorHandler::handle_api_error(401, b"", "rbd/list");
        assert!(matches!(err, CephError::Authentication(_)));
    }

    #[test]
    fn test_require() {
        assert!(ValidationErrorHandler::require("pool", "poolName").is_ok());
        assert!(matches!(
            ValidationErrorHandler::require("  ", "poolName"),
            Err(CephError::Validation(_))
        ));
    }
}
