// Course Lifecycle Module - Workflow State Machine
//
// Workflows move from draft to active to deactivated. The manager owns those
// transitions and the ranking of active automatic workflows; storage, subplugins,
// processes and user notifications are injected ports.

pub mod actions;
pub mod error;
pub mod manager;
pub mod notifier;
pub mod ranking;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod mocks;


pub use actions::{ActionOutcome, WorkflowAction};
pub use error::{LifecycleError, Result};
pub use manager::{
    format_duplicate_title, Collaborators, WorkflowManager, WorkflowOverview,
    DEFAULT_DUPLICATE_TITLE, MSG_INVALID_WORKFLOW, MSG_NOT_DISABLEABLE, MSG_NOT_REMOVABLE,
};
pub use notifier::{ConsoleNotifier, TracingNotifier};
pub use ranking::SortRanking;
pub use traits::{
    Notifier, ProcessService, SettingsStore, StepService, TriggerService, WorkflowStore,
    WorkflowTransaction,
};
#[cfg(any(test, feature = "testing"))]
pub use traits::{MockProcessService, MockSettingsStore, MockStepService, MockTriggerService};
pub use types::*;
