// Ports injected into the workflow manager - separating concerns for testability

use async_trait::async_trait;

use super::error::Result;
use super::types::*;

/// Transactional access to the workflow table.
///
/// Dropping a transaction without calling [`WorkflowTransaction::commit`]
/// discards every write made through it.
#[async_trait]
pub trait WorkflowTransaction: Send {
    /// Fetch one workflow
    async fn get(&mut self, id: WorkflowId) -> Result<Option<Workflow>>;

    /// List workflows matching the filter, ordered by sortindex (unranked last), then id
    async fn list(&mut self, filter: WorkflowFilter) -> Result<Vec<Workflow>>;

    /// Insert a new row and return its id
    async fn insert(&mut self, workflow: &Workflow) -> Result<WorkflowId>;

    /// Overwrite an existing row
    async fn update(&mut self, workflow: &Workflow) -> Result<()>;

    /// Delete a row, returning whether it existed
    async fn delete(&mut self, id: WorkflowId) -> Result<bool>;

    /// Make every write of this transaction visible
    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Persistence port for workflows
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Open a transaction
    async fn begin(&self) -> Result<Box<dyn WorkflowTransaction>>;
}

/// Trigger subplugin service
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TriggerService: Send + Sync {
    /// Triggers bound to a workflow, in sortindex order
    async fn triggers_for_workflow(&self, workflow_id: WorkflowId) -> Result<Vec<TriggerInstance>>;

    /// Whether the named trigger subplugin is invoked by users instead of the scheduler
    async fn is_manual_trigger(&self, subpluginname: &str) -> Result<bool>;

    /// Whether the named trigger subplugin may be bound to several workflows at once
    async fn has_multiple_instances(&self, subpluginname: &str) -> Result<bool>;

    /// Bind a new trigger instance to a workflow
    async fn add_trigger(
        &self,
        workflow_id: WorkflowId,
        subpluginname: &str,
        instancename: &str,
    ) -> Result<TriggerInstance>;

    /// Copy all triggers of `source` (with their settings) onto `target`
    async fn duplicate_triggers(&self, source: WorkflowId, target: WorkflowId) -> Result<()>;

    /// Remove all triggers of a workflow together with their settings
    async fn remove_instances_of_workflow(&self, workflow_id: WorkflowId) -> Result<()>;
}

/// Step subplugin service
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait StepService: Send + Sync {
    /// Steps of a workflow, in execution order
    async fn steps_for_workflow(&self, workflow_id: WorkflowId) -> Result<Vec<StepInstance>>;

    /// Append a step to a workflow
    async fn add_step(
        &self,
        workflow_id: WorkflowId,
        subpluginname: &str,
        instancename: &str,
    ) -> Result<StepInstance>;

    /// Copy all steps of `source` (with their settings) onto `target`
    async fn duplicate_steps(&self, source: WorkflowId, target: WorkflowId) -> Result<()>;

    /// Remove all steps of a workflow together with their settings
    async fn remove_instances_of_workflow(&self, workflow_id: WorkflowId) -> Result<()>;
}

/// Process service
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ProcessService: Send + Sync {
    /// Running processes of a workflow
    async fn processes_for_workflow(&self, workflow_id: WorkflowId) -> Result<Vec<Process>>;

    /// Number of running processes of a workflow
    async fn count_processes_for_workflow(&self, workflow_id: WorkflowId) -> Result<usize>;

    /// Roll a process back, releasing its course
    async fn rollback(&self, process: &Process) -> Result<()>;
}

/// Key/value settings of subplugin instances
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// All settings of one instance; empty when none were saved
    async fn get(&self, instance_id: i64, settings_type: SettingsType) -> Result<Settings>;

    /// Save the settings the subplugin declares, ignoring any other keys
    async fn save(
        &self,
        instance_id: i64,
        settings_type: SettingsType,
        subpluginname: &str,
        data: &Settings,
    ) -> Result<()>;

    /// Drop all settings of one instance
    async fn remove(&self, instance_id: i64, settings_type: SettingsType) -> Result<()>;
}

/// User-facing notification sink
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NotificationLevel, message: &str);
}
