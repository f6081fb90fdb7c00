use crate::models::TenantId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("PRECONDITION_FAILED: {0}")]
    Precondition(String),
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("VALIDATION_FAILED: {0}")]
    Validation(ValidationErrors),
    #[error("STORAGE_NOT_READY: {0}")]
    StorageNotReady(String),
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationErrors {
    pub fields: BTreeMap<String, String>,
    pub submitted: serde_json::Value,
}

impl ValidationErrors {
    pub fn new(submitted: serde_json::Value) -> Self {
        Self {
            fields: BTreeMap::new(),
            submitted,
        }
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_result(self) -> AppResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .fields
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong while processing the request. Please try again.";

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum Response<T> {
    Ok { data: T },
    NotFound { message: String },
    Invalid { errors: ValidationErrors },
    Failed { message: String },
}

impl<T> Response<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub fn data(self) -> Option<T> {
        match self {
            Self::Ok { data } => Some(data),
            _ => None,
        }
    }
}

// Single per-request boundary: validation and not-found outcomes are passed
// through, anything else is logged and replaced by a generic failure.
pub fn respond<T>(operation: &str, tenant: TenantId, run: impl FnOnce() -> AppResult<T>) -> Response<T> {
    match run() {
        Ok(data) => Response::Ok { data },
        Err(AppError::NotFound(message)) => Response::NotFound { message },
        Err(AppError::Validation(errors)) => Response::Invalid { errors },
        Err(error) => {
            tracing::error!(operation = %operation, tenant = %tenant, error = %error, "request failed");
            Response::Failed {
                message: GENERIC_FAILURE_MESSAGE.to_string(),
            }
        }
    }
}
