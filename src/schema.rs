use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, StepError};

/// Validate `body` against the schema at `relative` under `schemas_dir`.
///
/// The schema file is read on every call. Leading and trailing slashes on
/// `relative` are ignored.
pub fn validate(schemas_dir: &Path, relative: &str, body: &str) -> Result<()> {
    let relative = relative.trim_matches('/');
    let path = schemas_dir.join(relative);
    if !path.is_file() {
        return Err(StepError::SchemaNotFound(path));
    }
    let contents = std::fs::read_to_string(&path).map_err(|source| StepError::SchemaRead {
        path: path.clone(),
        source,
    })?;
    let schema: Value = serde_json::from_str(&contents).map_err(|e| StepError::InvalidSchema {
        path: path.clone(),
        message: e.to_string(),
    })?;
    let validator = jsonschema::validator_for(&schema).map_err(|e| StepError::InvalidSchema {
        path: path.clone(),
        message: e.to_string(),
    })?;

    let instance: Value = serde_json::from_str(body).map_err(StepError::InvalidJson)?;
    let violations: Vec<String> = validator
        .iter_errors(&instance)
        .map(|e| e.to_string())
        .collect();
    debug!(schema = %path.display(), violations = violations.len(), "validated response");

    if !violations.is_empty() {
        return Err(StepError::SchemaViolations {
            schema: relative.to_string(),
            violations,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const USER_SCHEMA: &str = r#"{
        "type": "object",
        "required": ["id", "name"],
        "properties": {
            "id": {"type": "integer"},
            "name": {"type": "string"}
        }
    }"#;

    fn schemas() -> TempDir {
        let dir = TempDir::new().expect("create temp dir");
        std::fs::create_dir_all(dir.path().join("users")).unwrap();
        std::fs::write(dir.path().join("users/user.json"), USER_SCHEMA).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{ nope").unwrap();
        dir
    }

    #[test]
    fn valid_document_passes() {
        let dir = schemas();
        validate(dir.path(), "users/user.json", r#"{"id": 1, "name": "Bruno"}"#).unwrap();
        validate(dir.path(), "/users/user.json/", r#"{"id": 1, "name": "Bruno"}"#).unwrap();
    }

    #[test]
    fn violations_are_listed() {
        let dir = schemas();
        let err = validate(dir.path(), "users/user.json", r#"{"id": "one"}"#).unwrap_err();
        match err {
            StepError::SchemaViolations { schema, violations } => {
                assert_eq!(schema, "users/user.json");
                assert_eq!(violations.len(), 2, "{violations:?}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_schema_is_distinct() {
        let dir = schemas();
        let err = validate(dir.path(), "nope.json", "{}").unwrap_err();
        assert!(matches!(err, StepError::SchemaNotFound(p) if p.ends_with("nope.json")));
    }

    #[test]
    fn unparsable_schema_and_body() {
        let dir = schemas();
        assert!(matches!(
            validate(dir.path(), "broken.json", "{}"),
            Err(StepError::InvalidSchema { .. })
        ));
        assert!(matches!(
            validate(dir.path(), "users/user.json", "not json"),
            Err(StepError::InvalidJson(_))
        ));
    }
}
