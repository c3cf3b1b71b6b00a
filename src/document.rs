//! Item payloads.
//!
//! A [`Document`] keeps the caller's JSON text untouched and only looks inside
//! it to find the mandatory `id` property. No other schema is assumed.

use serde::Deserialize;
use serde_json::value::RawValue;
use serde_json::Value as JsonValue;

/// Why an item payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    /// The text is not valid JSON.
    #[error("item is not valid JSON: {0}")]
    InvalidJson(String),

    /// The JSON is valid but not an object.
    #[error("item must be a JSON object")]
    NotAnObject,

    /// The object has no usable `id` property.
    #[error("item is missing a non-empty string 'id' field")]
    MissingId,
}

/// An opaque JSON item with a lazily read identifier.
#[derive(Debug, Clone)]
pub struct Document {
    raw: Box<RawValue>,
}

#[derive(Deserialize)]
struct IdField {
    #[serde(default)]
    id: Option<JsonValue>,
}

impl Document {
    /// Accept any syntactically valid JSON text.
    pub fn from_json(text: impl Into<String>) -> Result<Self, DocumentError> {
        RawValue::from_string(text.into())
            .map(|raw| Self { raw })
            .map_err(|e| DocumentError::InvalidJson(e.to_string()))
    }

    /// Parse the text and require a non-empty string `id` up front.
    pub fn with_id(text: impl Into<String>) -> Result<Self, DocumentError> {
        let doc = Self::from_json(text)?;
        doc.id()?;
        Ok(doc)
    }

    /// The item's identifier.
    pub fn id(&self) -> Result<String, DocumentError> {
        let text = self.raw.get();
        if !text.trim_start().starts_with('{') {
            return Err(DocumentError::NotAnObject);
        }
        let field: IdField =
            serde_json::from_str(text).map_err(|e| DocumentError::InvalidJson(e.to_string()))?;
        match field.id {
            Some(JsonValue::String(id)) if !id.is_empty() => Ok(id),
            _ => Err(DocumentError::MissingId),
        }
    }

    /// The JSON text exactly as supplied.
    pub fn as_str(&self) -> &str {
        self.raw.get()
    }

    /// The JSON text as an embeddable raw value.
    pub fn as_raw(&self) -> &RawValue {
        &self.raw
    }
}
