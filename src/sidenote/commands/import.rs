use serde_json::Value;

use crate::commands::export::DocumentExport;
use crate::error::{Result, SidenoteError};

/// Parses and validates an interchange payload.
///
/// The shape check runs before deserialization so the error names what is
/// actually missing (`doc` absent, `comments` not an array) instead of
/// surfacing as a generic type mismatch. Applying the parsed payload —
/// replacing document and store, clearing caches, forcing the post-import
/// validation pass — is the facade's job.
pub fn parse(json: &str) -> Result<DocumentExport> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| SidenoteError::InvalidFormat(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| SidenoteError::InvalidFormat("expected a JSON object".into()))?;
    if !object.contains_key("doc") {
        return Err(SidenoteError::InvalidFormat(
            "missing document tree (`doc`)".into(),
        ));
    }
    if !object.get("comments").is_some_and(Value::is_array) {
        return Err(SidenoteError::InvalidFormat(
            "`comments` must be an array".into(),
        ));
    }
    serde_json::from_value(value).map_err(|e| SidenoteError::InvalidFormat(e.to_string()))
}
