//! # Filter Document
//!
//! Declarative description of which entities a QUERY task targets: a mapping
//! from filter key to a set of selectors, each carrying at least an `id`.
//!
//! ```json
//! {
//!   "entity_type": [{ "id": "Report" }],
//!   "createdBy":   [{ "id": "U1", "value": "John" }]
//! }
//! ```
//!
//! Documents coming from callers go through [`FilterDocument::parse`] or
//! [`FilterDocument::from_value`]; both reject malformed shapes before anything
//! touches the store.

use crate::error::{Result, TaskerError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSelector {
    pub id: String,
    /// Display label, carried through but never used for matching
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl FilterSelector {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterDocument(BTreeMap<String, Vec<FilterSelector>>);

impl FilterDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion of a key with selector ids.
    pub fn with<I, S>(mut self, key: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0.insert(
            key.into(),
            ids.into_iter().map(FilterSelector::new).collect(),
        );
        self
    }

    /// Parse and validate a raw JSON filter document.
    pub fn parse(raw: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| TaskerError::InvalidFilter(format!("not valid JSON: {e}")))?;
        Self::from_value(value)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        if !value.is_object() {
            return Err(TaskerError::InvalidFilter(
                "filter document must be a JSON object".to_string(),
            ));
        }
        let entries: BTreeMap<String, Vec<FilterSelector>> = serde_json::from_value(value)
            .map_err(|e| TaskerError::InvalidFilter(format!("unexpected filter shape: {e}")))?;
        let document = Self(entries);
        document.validate()?;
        Ok(document)
    }

    /// Structural checks that serde alone does not enforce.
    pub fn validate(&self) -> Result<()> {
        for (key, selectors) in &self.0 {
            if key.trim().is_empty() {
                return Err(TaskerError::InvalidFilter(
                    "filter keys must not be empty".to_string(),
                ));
            }
            if selectors.is_empty() {
                return Err(TaskerError::InvalidFilter(format!(
                    "filter key '{key}' has no selectors"
                )));
            }
            if selectors.iter().any(|s| s.id.is_empty()) {
                return Err(TaskerError::InvalidFilter(format!(
                    "filter key '{key}' has a selector with an empty id"
                )));
            }
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&[FilterSelector]> {
        self.0.get(key).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[FilterSelector])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_document() {
        let doc = FilterDocument::parse(
            r#"{"entity_type":[{"id":"Report"}],"createdBy":[{"id":"U1","value":"John"}]}"#,
        )
        .unwrap();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.get("entity_type").unwrap()[0].id, "Report");
        assert_eq!(
            doc.get("createdBy").unwrap()[0].value.as_deref(),
            Some("John")
        );
    }

    #[test]
    fn test_malformed_documents_rejected() {
        let cases = [
            "not json",
            r#"["entity_type"]"#,
            r#"{"entity_type":"Report"}"#,
            r#"{"entity_type":[{"name":"Report"}]}"#,
            r#"{"entity_type":[]}"#,
            r#"{"entity_type":[{"id":""}]}"#,
            r#"{"":[{"id":"x"}]}"#,
        ];
        for raw in cases {
            let err = FilterDocument::parse(raw).unwrap_err();
            assert!(
                matches!(err, TaskerError::InvalidFilter(_)),
                "expected InvalidFilter for {raw}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_empty_document_is_valid() {
        let doc = FilterDocument::parse("{}").unwrap();
        assert!(doc.is_empty());
    }
}
