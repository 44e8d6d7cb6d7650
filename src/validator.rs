//! Pre-publish checks for a schema
//!
//! 1. The file name stem must equal the declared `schema_version`.
//! 2. The registry must not already hold that version for the survey.
//!
//! Checks run in that order and the first failure is returned.

use std::path::Path;

use crate::error::{PublishError, Result, NOT_APPLICABLE};
use crate::registry::SchemaRegistry;
use crate::schema::Schema;

/// File name without directory or extension
pub fn split_filename(path: Option<&str>) -> Result<&str> {
    let filepath_error = || PublishError::Filepath {
        filepath: path.unwrap_or(NOT_APPLICABLE).to_string(),
    };
    let path = path.ok_or_else(filepath_error)?;
    Path::new(path)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(filepath_error)
}

/// Validates schemas against the registry before they are posted
#[derive(Debug, Clone)]
pub struct SchemaValidator<'a, R> {
    registry: &'a R,
}

impl<'a, R: SchemaRegistry> SchemaValidator<'a, R> {
    pub fn new(registry: &'a R) -> Self {
        Self { registry }
    }

    pub async fn validate(&self, schema: &Schema) -> Result<()> {
        tracing::info!("Validating schema {}", schema.filepath_or_na());
        verify_version(schema)?;
        self.check_duplicate_versions(schema).await
    }

    async fn check_duplicate_versions(&self, schema: &Schema) -> Result<()> {
        let Some(versions) = self.registry.get_schema_metadata(&schema.survey_id).await? else {
            tracing::info!("No schemas registered for survey {}", schema.survey_id);
            return Ok(());
        };

        if versions
            .iter()
            .any(|record| record.schema_version == schema.schema_version)
        {
            return Err(PublishError::SchemaDuplication {
                filepath: schema.filepath_or_na().to_string(),
            });
        }
        Ok(())
    }
}

/// The version declared in the schema must match its file name
pub fn verify_version(schema: &Schema) -> Result<()> {
    let stem = split_filename(schema.filepath.as_deref())?;
    if stem != schema.schema_version {
        return Err(PublishError::SchemaVersionMismatch {
            filepath: schema.filepath_or_na().to_string(),
        });
    }
    Ok(())
}
