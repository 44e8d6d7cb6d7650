//! Schema types and structures

use serde_json::Value;

use crate::error::{PublishError, Result, NOT_APPLICABLE};

/// A survey schema document ready to be validated and published
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    /// The raw schema document
    pub json: Value,
    /// Path or object name the schema was retrieved from
    pub filepath: Option<String>,
    /// Survey the schema belongs to (`properties.survey_id.enum[0]`)
    pub survey_id: String,
    /// Declared version (`properties.schema_version.const`)
    pub schema_version: String,
}

impl Schema {
    /// Build a schema from a retrieved document, extracting its survey id and version
    pub fn from_json(json: Value, filepath: Option<&str>) -> Result<Self> {
        let context = || filepath.unwrap_or(NOT_APPLICABLE).to_string();

        let survey_id = json
            .pointer("/properties/survey_id/enum")
            .and_then(Value::as_array)
            .and_then(|values| values.first())
            .and_then(scalar_text)
            .ok_or_else(|| PublishError::SurveyId { filepath: context() })?;

        let schema_version = json
            .pointer("/properties/schema_version/const")
            .and_then(scalar_text)
            .ok_or_else(|| PublishError::SchemaVersion { filepath: context() })?;

        Ok(Self {
            json,
            filepath: filepath.map(String::from),
            survey_id,
            schema_version,
        })
    }

    /// File path for error reporting
    pub fn filepath_or_na(&self) -> &str {
        self.filepath.as_deref().unwrap_or(NOT_APPLICABLE)
    }
}

// Strings are taken verbatim, other values by their JSON text
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
