// Administrative actions on workflows, as offered by the admin surface

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use super::error::{LifecycleError, Result};
use super::manager::{
    WorkflowManager, MSG_INVALID_WORKFLOW, MSG_NOT_DISABLEABLE, MSG_NOT_REMOVABLE,
};
use super::types::{AbortReport, NotificationLevel, SortDirection, WorkflowId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowAction {
    Activate,
    MoveUp,
    MoveDown,
    Duplicate,
    Disable,
    /// Disable, then roll back running processes. A single-instance trigger
    /// keeps the workflow active with a warning, but its processes are still
    /// rolled back and the outcome is the abort report.
    #[value(name = "disable-and-abort")]
    #[serde(rename = "disable-and-abort")]
    AbortDisable,
    Abort,
    Delete,
}

impl WorkflowAction {
    /// Destructive actions only run once the administrator confirmed them
    pub fn requires_confirmation(&self) -> bool {
        matches!(
            self,
            WorkflowAction::Disable
                | WorkflowAction::AbortDisable
                | WorkflowAction::Abort
                | WorkflowAction::Delete
        )
    }
}

impl fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_possible_value() {
            Some(value) => f.write_str(value.get_name()),
            None => write!(f, "{self:?}"),
        }
    }
}

/// What handling an action did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// State changed
    Applied,
    /// Preconditions not met, nothing changed
    Skipped,
    /// Destructive action called without confirmation
    ConfirmationRequired,
    /// Refused; the notifier already told the user why
    Rejected(String),
    Duplicated(WorkflowId),
    Aborted(AbortReport),
}

impl WorkflowManager {
    /// Dispatch one administrative action
    pub async fn handle_action(
        &self,
        action: WorkflowAction,
        id: WorkflowId,
        confirmed: bool,
    ) -> Result<ActionOutcome> {
        if action.requires_confirmation() && !confirmed {
            return Ok(ActionOutcome::ConfirmationRequired);
        }
        info!(action = %action, workflow_id = %id, "Handling workflow action");

        let outcome = match action {
            WorkflowAction::Activate => match self.activate(id).await {
                Ok(changed) => applied(changed),
                Err(LifecycleError::InvalidWorkflow(_)) => {
                    ActionOutcome::Rejected(MSG_INVALID_WORKFLOW.to_string())
                }
                Err(e) => return Err(e),
            },
            WorkflowAction::MoveUp => applied(self.change_sortindex(id, SortDirection::Up).await?),
            WorkflowAction::MoveDown => {
                applied(self.change_sortindex(id, SortDirection::Down).await?)
            }
            WorkflowAction::Duplicate => {
                let duplicate = self.duplicate(id).await?;
                match duplicate.id {
                    Some(new_id) => ActionOutcome::Duplicated(new_id),
                    None => ActionOutcome::Skipped,
                }
            }
            WorkflowAction::Disable => self.disable_or_reject(id).await?,
            WorkflowAction::AbortDisable => {
                self.disable_or_reject(id).await?;
                ActionOutcome::Aborted(self.abort_processes(id).await?)
            }
            WorkflowAction::Abort => ActionOutcome::Aborted(self.abort_processes(id).await?),
            WorkflowAction::Delete => {
                // The workflow may already be gone when a confirmation is submitted twice
                let exists = self.get_workflow(id).await?.is_some();
                if exists && self.is_removable(id).await? {
                    applied(self.remove(id, false).await?)
                } else {
                    self.reject(MSG_NOT_REMOVABLE)
                }
            }
        };
        Ok(outcome)
    }

    async fn disable_or_reject(&self, id: WorkflowId) -> Result<ActionOutcome> {
        if !self.is_disableable(id).await? {
            return Ok(self.reject(MSG_NOT_DISABLEABLE));
        }
        Ok(applied(self.disable(id).await?))
    }

    fn reject(&self, message: &str) -> ActionOutcome {
        self.notifier.notify(NotificationLevel::Warning, message);
        ActionOutcome::Rejected(message.to_string())
    }
}

fn applied(changed: bool) -> ActionOutcome {
    if changed {
        ActionOutcome::Applied
    } else {
        ActionOutcome::Skipped
    }
}
