// Course Lifecycle Library - Workflow Orchestration for Course Lifecycles
// This exposes the core components for testing and integration

pub mod cli;
pub mod config;
pub mod database;
pub mod lifecycle;
pub mod memory;
pub mod subplugins;
pub mod telemetry;

// Re-export key types for easy access
pub use config::{config, init_config, LifecycleConfig};
pub use lifecycle::{
    ActionOutcome, Collaborators, LifecycleError, Workflow, WorkflowAction, WorkflowId,
    WorkflowManager, WorkflowState,
};
pub use memory::{MemorySubplugins, MemoryWorkflowStore, StateFile};
pub use subplugins::{StepKind, TriggerKind};
pub use telemetry::{create_workflow_span, generate_correlation_id, init_telemetry, shutdown_telemetry};
