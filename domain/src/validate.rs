//! Lightweight input validation helpers.

use crate::{CoreError, EntityId, EntityKind};

/// Trim an entity name. Blank names are rejected unless `allow_blank` is set.
pub fn normalize_name(kind: EntityKind, raw: &str, allow_blank: bool) -> Result<String, CoreError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() && !allow_blank {
        return Err(CoreError::InvalidName {
            kind,
            message: "name must not be blank".into(),
        });
    }
    if trimmed.chars().any(char::is_control) {
        return Err(CoreError::InvalidName {
            kind,
            message: "name must not contain control characters".into(),
        });
    }
    Ok(trimmed.to_string())
}

/// Light check on a service base URL: http/https scheme and a host part.
pub fn validate_service_url(kind: EntityKind, s: &str) -> Result<(), CoreError> {
    let trimmed = s.trim();
    let rest = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))
        .ok_or_else(|| CoreError::configuration(kind, "url must start with http:// or https://"))?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(CoreError::configuration(kind, "url has no host"));
    }
    Ok(())
}

/// Parse an id received as text (path segment, stored column).
pub fn parse_id(kind: EntityKind, s: &str) -> Result<EntityId, CoreError> {
    s.parse()
        .map_err(|_| CoreError::configuration(kind, format!("invalid id '{s}'")))
}
