//! Hierarchical document paths: `/`-separated, non-empty segments.

use crate::error::StoreError;

pub fn validate(path: &str) -> Result<(), StoreError> {
    if path.is_empty() || path.split('/').any(str::is_empty) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Split a path into `(parent, key)`. Top-level documents have an empty parent.
pub fn split(path: &str) -> Result<(&str, &str), StoreError> {
    validate(path)?;
    Ok(path.rsplit_once('/').unwrap_or(("", path)))
}

pub fn join(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", parent, key)
    }
}
