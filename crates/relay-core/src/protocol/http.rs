//! JSON bodies of the plain HTTP endpoints.

use serde::{Deserialize, Serialize};

/// Body of `GET /initiate`.
///
/// ```json
/// {"status":"ok","token":"9b1c…"}
/// {"status":"error","error":"Invalid token"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum InitiateResponse {
    Ok { token: String },
    Error { error: String },
}

impl InitiateResponse {
    /// The response for a rejected connect secret.
    pub fn invalid_secret() -> Self {
        InitiateResponse::Error {
            error: "Invalid token".to_string(),
        }
    }
}

/// Body of `GET /` (liveness check) and of generic HTTP errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LivenessResponse {
    /// `{"status":"ok"}`
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            error: None,
        }
    }

    /// `{"status":"error","error":<message>}`
    pub fn error(message: &str) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(message.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initiate_ok_shape() {
        let json = serde_json::to_string(&InitiateResponse::Ok {
            token: "abc".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"status":"ok","token":"abc"}"#);
    }

    #[test]
    fn test_initiate_error_shape() {
        let json = serde_json::to_string(&InitiateResponse::invalid_secret()).unwrap();
        assert_eq!(json, r#"{"status":"error","error":"Invalid token"}"#);
    }

    #[test]
    fn test_liveness_shape() {
        assert_eq!(
            serde_json::to_string(&LivenessResponse::ok()).unwrap(),
            r#"{"status":"ok"}"#
        );
        assert_eq!(
            serde_json::to_string(&LivenessResponse::error("not found")).unwrap(),
            r#"{"status":"error","error":"not found"}"#
        );
    }
}
