//! Shared HTTP utilities for the adapter store workspace.
//!
//! Framework-agnostic: builds the JSON error bodies and picks the status code
//! for domain errors. The API server wraps these into its own response type.

use domain::CoreError;

// ============================================================================
// JSON Response Helpers
// ============================================================================

/// Create a structured error JSON with a default message based on the code.
///
/// Returns: `{"error": {"code": "<code>", "message": "<default message>"}}`
pub fn json_err(code: &str) -> serde_json::Value {
    let message = match code {
        "not_found" => "Resource not found",
        "bad_request" => "Bad request",
        "invalid_id" => "Invalid entity id",
        "invalid_name" => "Invalid name",
        "configuration" => "Invalid configuration",
        "conflict" => "Resource already exists",
        "in_use" => "Resource is still referenced",
        "error" | "internal" => "Internal server error",
        _ => code,
    };
    serde_json::json!({"error": {"code": code, "message": message}})
}

/// Create a structured error JSON with a custom message.
///
/// Returns: `{"error": {"code": "<code>", "message": "<message>"}}`
pub fn json_error_with_message(code: &str, message: &str) -> serde_json::Value {
    serde_json::json!({"error": {"code": code, "message": message}})
}

// ============================================================================
// Domain Error Mapping
// ============================================================================

/// Stable machine-readable code for a domain error.
pub fn error_code(err: &CoreError) -> &'static str {
    match err {
        CoreError::NotFound { .. } => "not_found",
        CoreError::AlreadyExists { .. } => "conflict",
        CoreError::InUse { .. } => "in_use",
        CoreError::Configuration { .. } => "configuration",
        CoreError::InvalidName { .. } => "invalid_name",
        CoreError::Repository { .. } => "internal",
    }
}

/// HTTP status code for a domain error.
pub fn status_for(err: &CoreError) -> u16 {
    match err {
        CoreError::NotFound { .. } => 404,
        CoreError::AlreadyExists { .. } | CoreError::InUse { .. } => 409,
        CoreError::Configuration { .. } | CoreError::InvalidName { .. } => 400,
        CoreError::Repository { .. } => 500,
    }
}

/// Error body for a domain error. Store failures keep their details out of
/// the response.
pub fn error_body(err: &CoreError) -> serde_json::Value {
    match err {
        CoreError::Repository { .. } => json_err("internal"),
        other => json_error_with_message(error_code(other), &other.to_string()),
    }
}

// ============================================================================
// Parsing Helpers
// ============================================================================

/// Interpret a flag value from the environment or a query string.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::EntityKind;

    #[test]
    fn test_json_err() {
        let err = json_err("not_found");
        assert_eq!(
            err,
            serde_json::json!({"error": {"code": "not_found", "message": "Resource not found"}})
        );

        // Unknown code falls back to code as message
        let err = json_err("custom_error");
        assert_eq!(
            err,
            serde_json::json!({"error": {"code": "custom_error", "message": "custom_error"}})
        );
    }

    #[test]
    fn test_json_error_with_message() {
        let err = json_error_with_message("bad_request", "Invalid input");
        assert_eq!(
            err,
            serde_json::json!({"error": {"code": "bad_request", "message": "Invalid input"}})
        );
    }

    #[test]
    fn test_status_mapping() {
        let k = EntityKind::Notifier;
        assert_eq!(status_for(&CoreError::not_found(k, "x")), 404);
        assert_eq!(status_for(&CoreError::already_exists(k, "x")), 409);
        assert_eq!(
            status_for(&CoreError::InUse {
                kind: EntityKind::ExternalService,
                id: "x".into(),
                dependents: 2
            }),
            409
        );
        assert_eq!(status_for(&CoreError::configuration(k, "bad")), 400);
        assert_eq!(
            status_for(&CoreError::InvalidName {
                kind: k,
                message: "blank".into()
            }),
            400
        );
        assert_eq!(status_for(&CoreError::repository(k, "disk")), 500);
    }

    #[test]
    fn test_error_body_hides_store_details() {
        let body = error_body(&CoreError::repository(EntityKind::Settings, "disk I/O error"));
        assert_eq!(body, json_err("internal"));

        let body = error_body(&CoreError::not_found(EntityKind::Notifier, "abc"));
        assert_eq!(body["error"]["code"], "not_found");
        assert_eq!(body["error"]["message"], "notifier abc not found");
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag(" Yes "), Some(true));
        assert_eq!(parse_flag("false"), Some(false));
        assert_eq!(parse_flag(""), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
