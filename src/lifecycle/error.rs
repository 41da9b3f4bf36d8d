use thiserror::Error;

use super::types::{SettingsType, WorkflowId};

/// Errors raised by the workflow lifecycle manager and its ports
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Workflow {0} has no trigger and cannot be activated")]
    InvalidWorkflow(WorkflowId),

    #[error("Workflow {0} not found")]
    WorkflowNotFound(WorkflowId),

    #[error("Workflow {0} has been activated before and can no longer be edited")]
    NotEditable(WorkflowId),

    #[error("Unknown {kind} subplugin: {name}")]
    UnknownSubplugin { kind: SettingsType, name: String },

    #[error("Collaborator failure: {0}")]
    Collaborator(String),

    #[error("State is locked by another process: {path}")]
    StateLocked { path: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[cfg(feature = "database")]
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type Result<T, E = LifecycleError> = std::result::Result<T, E>;
