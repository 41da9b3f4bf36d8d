// Core types for course lifecycle workflows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map($name)
            }
        }
    };
}

record_id!(
    /// Identifier of a persisted workflow
    WorkflowId
);
record_id!(
    /// Identifier of a trigger subplugin instance
    TriggerId
);
record_id!(
    /// Identifier of a step subplugin instance
    StepId
);
record_id!(
    /// Identifier of a running process
    ProcessId
);

/// A lifecycle workflow: one trigger condition bound to an ordered list of steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    /// Assigned on first persist
    pub id: Option<WorkflowId>,
    pub title: String,
    pub active: bool,
    /// Frozen from the first trigger's capability when the workflow is activated
    pub manual: Option<bool>,
    /// Rank among active automatic workflows, dense from 1
    pub sortindex: Option<u32>,
    pub timeactive: Option<DateTime<Utc>>,
    /// Set on deactivation and never cleared
    pub timedeactive: Option<DateTime<Utc>>,
}

impl Workflow {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            active: false,
            manual: None,
            sortindex: None,
            timeactive: None,
            timedeactive: None,
        }
    }

    pub fn is_automatic(&self) -> bool {
        self.manual == Some(false)
    }

    pub fn is_manual(&self) -> bool {
        self.manual == Some(true)
    }

    pub fn is_deactivated(&self) -> bool {
        self.timedeactive.is_some()
    }

    pub fn state(&self) -> WorkflowState {
        if self.active {
            WorkflowState::Active
        } else if self.is_deactivated() {
            WorkflowState::Deactivated
        } else {
            WorkflowState::Draft
        }
    }
}

/// Coarse lifecycle state derived from the persisted flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// Never activated, still editable
    Draft,
    Active,
    /// Disabled; terminal for this workflow instance
    Deactivated,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::Draft => write!(f, "draft"),
            WorkflowState::Active => write!(f, "active"),
            WorkflowState::Deactivated => write!(f, "deactivated"),
        }
    }
}

/// Which slice of the workflow table a query targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowFilter {
    All,
    Active,
    ActiveAutomatic,
    ActiveManual,
}

impl WorkflowFilter {
    pub fn matches(&self, workflow: &Workflow) -> bool {
        match self {
            WorkflowFilter::All => true,
            WorkflowFilter::Active => workflow.active,
            WorkflowFilter::ActiveAutomatic => workflow.active && workflow.is_automatic(),
            WorkflowFilter::ActiveManual => workflow.active && workflow.is_manual(),
        }
    }
}

/// Direction for reordering an active automatic workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Up,
    Down,
}

/// A trigger subplugin bound to a workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerInstance {
    pub id: TriggerId,
    pub workflow_id: WorkflowId,
    pub subpluginname: String,
    pub instancename: String,
    pub sortindex: u32,
}

/// A step subplugin bound to a workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepInstance {
    pub id: StepId,
    pub workflow_id: WorkflowId,
    pub subpluginname: String,
    pub instancename: String,
    pub sortindex: u32,
}

/// A running execution of a workflow against one course
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    pub id: ProcessId,
    pub workflow_id: WorkflowId,
    pub course_id: i64,
    /// 1-based index of the step currently processing the course, 0 before the first step
    pub stepindex: u32,
    pub waiting: bool,
    pub timestepchanged: DateTime<Utc>,
}

/// Owner scope of a settings row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsType {
    Trigger,
    Step,
}

impl fmt::Display for SettingsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsType::Trigger => write!(f, "trigger"),
            SettingsType::Step => write!(f, "step"),
        }
    }
}

/// Settings of one subplugin instance
pub type Settings = BTreeMap<String, String>;

/// Tool offered to users for an active manual workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualTriggerTool {
    pub trigger_id: TriggerId,
    pub icon: String,
    pub displayname: String,
    pub capability: String,
}

/// Severity of a user-facing notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// Result of rolling back every process of a workflow
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AbortReport {
    pub rolled_back: Vec<ProcessId>,
    pub failed: Vec<(ProcessId, String)>,
}

impl AbortReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_workflow_is_draft() {
        let workflow = Workflow::new("Delete old courses");
        assert_eq!(workflow.id, None);
        assert_eq!(workflow.state(), WorkflowState::Draft);
        assert!(!workflow.is_automatic());
        assert!(!workflow.is_manual());
    }

    #[test]
    fn test_deactivated_state_wins_over_draft() {
        let mut workflow = Workflow::new("wf");
        workflow.timedeactive = Some(Utc::now());
        assert_eq!(workflow.state(), WorkflowState::Deactivated);
        assert!(workflow.is_deactivated());
    }

    #[test]
    fn test_filters() {
        let mut manual = Workflow::new("manual");
        manual.active = true;
        manual.manual = Some(true);

        let mut automatic = Workflow::new("automatic");
        automatic.active = true;
        automatic.manual = Some(false);

        assert!(WorkflowFilter::ActiveManual.matches(&manual));
        assert!(!WorkflowFilter::ActiveAutomatic.matches(&manual));
        assert!(WorkflowFilter::ActiveAutomatic.matches(&automatic));
        assert!(WorkflowFilter::Active.matches(&automatic));
        assert!(!WorkflowFilter::Active.matches(&Workflow::new("draft")));
    }

    #[test]
    fn test_ids_parse_and_display() {
        let id: WorkflowId = "42".parse().unwrap();
        assert_eq!(id, WorkflowId(42));
        assert_eq!(id.to_string(), "42");
        assert!("forty".parse::<WorkflowId>().is_err());
    }
}
