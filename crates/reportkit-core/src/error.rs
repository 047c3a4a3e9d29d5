//! Error type returned by the report service and evaluation engine.

use thiserror::Error;

use crate::evaluation::DataSetError;
use crate::materialize::MaterializationError;
use crate::render::RenderError;
use crate::schema::{SchemaId, SchemaXmlId};

#[derive(Debug, Error)]
pub enum ReportError {
    /// The caller lacks a privilege the operation requires.
    #[error("Privilege required: {privilege}")]
    Authorization { privilege: String },

    /// Required parameters left unbound. Lists every one of them.
    #[error("Missing required parameters: {}", .names.join(", "))]
    MissingParameter { names: Vec<String> },

    /// A bound parameter value does not parse as its declared type.
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// A schema handed in directly violates a structural rule.
    #[error("Invalid report schema: {reason}")]
    InvalidSchema { reason: String },

    #[error("{0}")]
    Materialization(#[from] MaterializationError),

    /// A data set failed to evaluate. No partial results are returned.
    #[error("Evaluation of data set '{data_set}' failed: {source}")]
    Evaluation {
        data_set: String,
        #[source]
        source: DataSetError,
    },

    #[error("Unknown renderer: {0}")]
    UnknownRenderer(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// A second serialized form was offered for a schema that already has one.
    #[error("Report schema {schema} already has serialized form {existing}")]
    DuplicateSchemaXml {
        schema: SchemaId,
        existing: SchemaXmlId,
    },

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReportError {
    pub fn authorization(privilege: impl Into<String>) -> Self {
        Self::Authorization {
            privilege: privilege.into(),
        }
    }

    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_schema(reason: impl Into<String>) -> Self {
        Self::InvalidSchema {
            reason: reason.into(),
        }
    }

    pub fn evaluation(data_set: impl Into<String>, source: DataSetError) -> Self {
        Self::Evaluation {
            data_set: data_set.into(),
            source,
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
