//! Workflow lifecycle manager.
//!
//! Decides which state transitions a workflow may take and keeps the ranking
//! of active automatic workflows dense. Every operation touching more than one
//! workflow row runs inside a single [`WorkflowTransaction`].

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::{LifecycleError, Result};
use super::ranking::SortRanking;
use super::traits::*;
use super::types::*;
use crate::subplugins::{StepKind, TriggerKind};

pub const DEFAULT_DUPLICATE_TITLE: &str = "{title} (copy)";

pub const MSG_INVALID_WORKFLOW: &str =
    "The workflow definition is not valid, thus it cannot be activated!";
pub const MSG_NOT_REMOVABLE: &str =
    "It is not possible to remove this workflow instance. Maybe it still has running processes?";
pub const MSG_NOT_DISABLEABLE: &str =
    "This workflow uses a trigger that allows only one instance and cannot be disabled.";

/// Services the manager coordinates
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn WorkflowStore>,
    pub triggers: Arc<dyn TriggerService>,
    pub steps: Arc<dyn StepService>,
    pub processes: Arc<dyn ProcessService>,
    pub settings: Arc<dyn SettingsStore>,
    pub notifier: Arc<dyn Notifier>,
}

/// Everything an administrator needs to see about one workflow
#[derive(Debug, Clone)]
pub struct WorkflowOverview {
    pub workflow: Workflow,
    pub triggers: Vec<TriggerInstance>,
    pub steps: Vec<StepInstance>,
    pub process_count: usize,
    pub editable: bool,
    pub disableable: bool,
    pub abortable: bool,
    pub removable: bool,
}

pub struct WorkflowManager {
    store: Arc<dyn WorkflowStore>,
    triggers: Arc<dyn TriggerService>,
    steps: Arc<dyn StepService>,
    processes: Arc<dyn ProcessService>,
    settings: Arc<dyn SettingsStore>,
    pub(super) notifier: Arc<dyn Notifier>,
    duplicate_title_template: String,
}

impl WorkflowManager {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            store: collaborators.store,
            triggers: collaborators.triggers,
            steps: collaborators.steps,
            processes: collaborators.processes,
            settings: collaborators.settings,
            notifier: collaborators.notifier,
            duplicate_title_template: DEFAULT_DUPLICATE_TITLE.to_string(),
        }
    }

    /// Title template for duplicates; `{title}` is replaced by the source title
    pub fn with_duplicate_title_template(mut self, template: impl Into<String>) -> Self {
        self.duplicate_title_template = template.into();
        self
    }

    /// Create and persist a workflow carrying only a title
    pub async fn create_workflow(&self, title: &str) -> Result<Workflow> {
        let mut workflow = Workflow::new(title);
        let id = self.persist(&mut workflow).await?;
        info!(workflow_id = %id, title = %workflow.title, "Workflow created");
        Ok(workflow)
    }

    /// Insert the workflow if it has no id yet, otherwise update it
    pub async fn persist(&self, workflow: &mut Workflow) -> Result<WorkflowId> {
        let mut tx = self.store.begin().await?;
        let id = match workflow.id {
            Some(id) => {
                tx.update(workflow).await?;
                id
            }
            None => {
                let id = tx.insert(workflow).await?;
                workflow.id = Some(id);
                id
            }
        };
        tx.commit().await?;
        Ok(id)
    }

    /// Activate a workflow.
    ///
    /// Returns `Ok(false)` when the workflow is already active or was
    /// deactivated before; a workflow without trigger is rejected.
    pub async fn activate(&self, id: WorkflowId) -> Result<bool> {
        let mut tx = self.store.begin().await?;
        let mut workflow = load(tx.as_mut(), id).await?;
        if workflow.active || workflow.is_deactivated() {
            debug!(workflow_id = %id, state = %workflow.state(), "Activation skipped");
            return Ok(false);
        }

        let triggers = self.triggers.triggers_for_workflow(id).await?;
        let Some(trigger) = triggers.first() else {
            warn!(workflow_id = %id, "Refusing to activate workflow without trigger");
            self.notifier
                .notify(NotificationLevel::Warning, MSG_INVALID_WORKFLOW);
            return Err(LifecycleError::InvalidWorkflow(id));
        };

        // TODO: decide how workflows with several triggers are classified once the UI allows them
        let manual = self.triggers.is_manual_trigger(&trigger.subpluginname).await?;
        workflow.manual = Some(manual);
        workflow.active = true;
        workflow.timeactive = Some(Utc::now());

        if !manual {
            let ranked = tx.list(WorkflowFilter::ActiveAutomatic).await?;
            let mut ranking = SortRanking::from_workflows(&ranked);
            workflow.sortindex = Some(ranking.append(id));
            write_ranking(tx.as_mut(), ranked, &ranking, None).await?;
        }

        tx.update(&workflow).await?;
        tx.commit().await?;

        info!(
            workflow_id = %id,
            trigger = %trigger.subpluginname,
            manual,
            sortindex = ?workflow.sortindex,
            "Workflow activated"
        );
        Ok(true)
    }

    /// Disable a workflow and close the gap it leaves in the ranking.
    ///
    /// Running processes are left alone; see [`Self::abort_processes`].
    pub async fn disable(&self, id: WorkflowId) -> Result<bool> {
        let mut tx = self.store.begin().await?;
        let mut workflow = load(tx.as_mut(), id).await?;
        if workflow.is_deactivated() || !self.trigger_allows_disable(id).await? {
            debug!(workflow_id = %id, "Disable skipped");
            return Ok(false);
        }

        let ranked = tx.list(WorkflowFilter::ActiveAutomatic).await?;
        let mut ranking = SortRanking::from_workflows(&ranked);
        ranking.remove(id);

        workflow.active = false;
        workflow.sortindex = None;
        workflow.timedeactive = Some(Utc::now());
        tx.update(&workflow).await?;
        write_ranking(tx.as_mut(), ranked, &ranking, Some(id)).await?;
        tx.commit().await?;

        info!(workflow_id = %id, "Workflow disabled");
        Ok(true)
    }

    /// Roll back every process of a workflow, one at a time
    pub async fn abort_processes(&self, id: WorkflowId) -> Result<AbortReport> {
        self.require(id).await?;
        let processes = self.processes.processes_for_workflow(id).await?;
        let mut report = AbortReport::default();

        for process in processes {
            match self.processes.rollback(&process).await {
                Ok(()) => report.rolled_back.push(process.id),
                Err(e) => {
                    warn!(
                        workflow_id = %id,
                        process_id = %process.id,
                        error = %e,
                        "Process rollback failed"
                    );
                    report.failed.push((process.id, e.to_string()));
                }
            }
        }

        info!(
            workflow_id = %id,
            rolled_back = report.rolled_back.len(),
            failed = report.failed.len(),
            "Processes aborted"
        );
        Ok(report)
    }

    /// Swap an active automatic workflow with its neighbour in the ranking
    pub async fn change_sortindex(&self, id: WorkflowId, direction: SortDirection) -> Result<bool> {
        let mut tx = self.store.begin().await?;
        let workflow = load(tx.as_mut(), id).await?;
        if !workflow.active || !workflow.is_automatic() {
            return Ok(false);
        }

        let ranked = tx.list(WorkflowFilter::ActiveAutomatic).await?;
        let mut ranking = SortRanking::from_workflows(&ranked);
        if !ranking.move_entry(id, direction) {
            return Ok(false);
        }
        write_ranking(tx.as_mut(), ranked, &ranking, None).await?;
        tx.commit().await?;

        debug!(
            workflow_id = %id,
            direction = ?direction,
            sortindex = ?ranking.sortindex_of(id),
            "Workflow reordered"
        );
        Ok(true)
    }

    /// Copy a workflow with its triggers, steps and settings into a new draft
    pub async fn duplicate(&self, id: WorkflowId) -> Result<Workflow> {
        let source = self
            .get_workflow(id)
            .await?
            .ok_or(LifecycleError::WorkflowNotFound(id))?;

        let title = format_duplicate_title(&self.duplicate_title_template, &source.title);
        let mut duplicate = Workflow::new(title);
        let target = self.persist(&mut duplicate).await?;

        if let Err(e) = self.copy_subplugins(id, target).await {
            warn!(source = %id, target = %target, error = %e, "Duplication failed, removing copy");
            if let Err(cleanup) = self.remove(target, true).await {
                warn!(target = %target, error = %cleanup, "Could not remove partial copy");
            }
            return Err(e);
        }

        info!(source = %id, target = %target, "Workflow duplicated");
        Ok(duplicate)
    }

    async fn copy_subplugins(&self, source: WorkflowId, target: WorkflowId) -> Result<()> {
        self.triggers.duplicate_triggers(source, target).await?;
        self.steps.duplicate_steps(source, target).await
    }

    /// Delete a workflow with all its triggers, steps and their settings.
    ///
    /// Without `force` nothing happens unless the workflow is removable.
    pub async fn remove(&self, id: WorkflowId, force: bool) -> Result<bool> {
        if self.get_workflow(id).await?.is_none() {
            return Err(LifecycleError::WorkflowNotFound(id));
        }
        if !force && !self.nothing_blocks_removal(id).await? {
            debug!(workflow_id = %id, "Remove skipped");
            return Ok(false);
        }

        self.triggers.remove_instances_of_workflow(id).await?;
        self.steps.remove_instances_of_workflow(id).await?;

        let mut tx = self.store.begin().await?;
        tx.delete(id).await?;
        let ranked = tx.list(WorkflowFilter::ActiveAutomatic).await?;
        let ranking = SortRanking::from_workflows(&ranked);
        write_ranking(tx.as_mut(), ranked, &ranking, None).await?;
        tx.commit().await?;

        info!(workflow_id = %id, force, "Workflow removed");
        Ok(true)
    }

    /// Rename a workflow that has never been activated
    pub async fn rename(&self, id: WorkflowId, title: &str) -> Result<Workflow> {
        let mut workflow = self.ensure_editable(id).await?;
        workflow.title = title.to_string();
        self.persist(&mut workflow).await?;
        Ok(workflow)
    }

    /// Bind a trigger to a workflow that has never been activated
    pub async fn add_trigger(
        &self,
        id: WorkflowId,
        subpluginname: &str,
        instancename: &str,
        settings: &Settings,
    ) -> Result<TriggerInstance> {
        self.ensure_editable(id).await?;
        TriggerKind::lookup(subpluginname)?;

        let trigger = self
            .triggers
            .add_trigger(id, subpluginname, instancename)
            .await?;
        if !settings.is_empty() {
            self.settings
                .save(trigger.id.0, SettingsType::Trigger, subpluginname, settings)
                .await?;
        }

        info!(workflow_id = %id, trigger_id = %trigger.id, subplugin = subpluginname, "Trigger added");
        Ok(trigger)
    }

    /// Append a step to a workflow that has never been activated
    pub async fn add_step(
        &self,
        id: WorkflowId,
        subpluginname: &str,
        instancename: &str,
        settings: &Settings,
    ) -> Result<StepInstance> {
        self.ensure_editable(id).await?;
        StepKind::lookup(subpluginname)?;

        let step = self.steps.add_step(id, subpluginname, instancename).await?;
        if !settings.is_empty() {
            self.settings
                .save(step.id.0, SettingsType::Step, subpluginname, settings)
                .await?;
        }

        info!(workflow_id = %id, step_id = %step.id, subplugin = subpluginname, "Step added");
        Ok(step)
    }

    async fn ensure_editable(&self, id: WorkflowId) -> Result<Workflow> {
        let workflow = self
            .get_workflow(id)
            .await?
            .ok_or(LifecycleError::WorkflowNotFound(id))?;
        if workflow.active || workflow.is_deactivated() {
            return Err(LifecycleError::NotEditable(id));
        }
        Ok(workflow)
    }

    pub async fn get_workflow(&self, id: WorkflowId) -> Result<Option<Workflow>> {
        let mut tx = self.store.begin().await?;
        tx.get(id).await
    }

    async fn list(&self, filter: WorkflowFilter) -> Result<Vec<Workflow>> {
        let mut tx = self.store.begin().await?;
        tx.list(filter).await
    }

    pub async fn list_workflows(&self) -> Result<Vec<Workflow>> {
        self.list(WorkflowFilter::All).await
    }

    /// Active workflows, ranked ones first by sortindex
    pub async fn list_active(&self) -> Result<Vec<Workflow>> {
        self.list(WorkflowFilter::Active).await
    }

    pub async fn list_active_automatic(&self) -> Result<Vec<Workflow>> {
        self.list(WorkflowFilter::ActiveAutomatic).await
    }

    /// Triggers of all active manual workflows
    pub async fn list_active_manual_triggers(&self) -> Result<Vec<TriggerInstance>> {
        let mut result = Vec::new();
        for workflow in self.list(WorkflowFilter::ActiveManual).await? {
            if let Some(id) = workflow.id {
                result.extend(self.triggers.triggers_for_workflow(id).await?);
            }
        }
        Ok(result)
    }

    /// Tools offered for all active manual workflows.
    ///
    /// Callers still have to check the capability for the course and user.
    pub async fn manual_trigger_tools(&self) -> Result<Vec<ManualTriggerTool>> {
        let mut tools = Vec::new();
        for trigger in self.list_active_manual_triggers().await? {
            let settings = self.settings.get(trigger.id.0, SettingsType::Trigger).await?;
            let field = |key: &str| settings.get(key).cloned();
            match (field("icon"), field("displayname"), field("capability")) {
                (Some(icon), Some(displayname), Some(capability)) => tools.push(ManualTriggerTool {
                    trigger_id: trigger.id,
                    icon,
                    displayname,
                    capability,
                }),
                _ => warn!(
                    trigger_id = %trigger.id,
                    workflow_id = %trigger.workflow_id,
                    "Manual trigger is missing tool settings, skipping"
                ),
            }
        }
        Ok(tools)
    }

    pub async fn describe(&self, id: WorkflowId) -> Result<WorkflowOverview> {
        let workflow = self
            .get_workflow(id)
            .await?
            .ok_or(LifecycleError::WorkflowNotFound(id))?;
        let process_count = self.processes.count_processes_for_workflow(id).await?;
        let disableable = self.trigger_allows_disable(id).await?;

        Ok(WorkflowOverview {
            editable: !workflow.active && !workflow.is_deactivated(),
            triggers: self.triggers.triggers_for_workflow(id).await?,
            steps: self.steps.steps_for_workflow(id).await?,
            process_count,
            disableable,
            abortable: process_count > 0,
            removable: disableable && process_count == 0,
            workflow,
        })
    }

    /// A workflow is valid once at least one trigger is bound
    pub async fn is_valid(&self, id: WorkflowId) -> Result<bool> {
        self.require(id).await?;
        Ok(!self.triggers.triggers_for_workflow(id).await?.is_empty())
    }

    pub async fn is_active(&self, id: WorkflowId) -> Result<bool> {
        Ok(self.require(id).await?.active)
    }

    /// True forever once the workflow has been disabled
    pub async fn is_deactivated(&self, id: WorkflowId) -> Result<bool> {
        Ok(self.require(id).await?.is_deactivated())
    }

    /// Workflows whose trigger allows only one instance must not be disabled
    pub async fn is_disableable(&self, id: WorkflowId) -> Result<bool> {
        self.require(id).await?;
        self.trigger_allows_disable(id).await
    }

    /// Only workflows that were never activated can be edited
    pub async fn is_editable(&self, id: WorkflowId) -> Result<bool> {
        let workflow = self.require(id).await?;
        Ok(!workflow.active && !workflow.is_deactivated())
    }

    pub async fn is_abortable(&self, id: WorkflowId) -> Result<bool> {
        self.require(id).await?;
        Ok(self.processes.count_processes_for_workflow(id).await? > 0)
    }

    pub async fn is_removable(&self, id: WorkflowId) -> Result<bool> {
        self.require(id).await?;
        self.nothing_blocks_removal(id).await
    }

    // Callable while a store transaction is open
    async fn trigger_allows_disable(&self, id: WorkflowId) -> Result<bool> {
        match self.triggers.triggers_for_workflow(id).await?.first() {
            Some(trigger) => {
                self.triggers
                    .has_multiple_instances(&trigger.subpluginname)
                    .await
            }
            None => Ok(true),
        }
    }

    async fn nothing_blocks_removal(&self, id: WorkflowId) -> Result<bool> {
        let running = self.processes.count_processes_for_workflow(id).await?;
        Ok(running == 0 && self.trigger_allows_disable(id).await?)
    }

    async fn require(&self, id: WorkflowId) -> Result<Workflow> {
        self.get_workflow(id)
            .await?
            .ok_or(LifecycleError::WorkflowNotFound(id))
    }
}

async fn load(tx: &mut dyn WorkflowTransaction, id: WorkflowId) -> Result<Workflow> {
    tx.get(id).await?.ok_or(LifecycleError::WorkflowNotFound(id))
}

/// Write back every ranked workflow whose sortindex differs from the ranking
async fn write_ranking(
    tx: &mut dyn WorkflowTransaction,
    ranked: Vec<Workflow>,
    ranking: &SortRanking,
    skip: Option<WorkflowId>,
) -> Result<()> {
    for mut workflow in ranked {
        let Some(id) = workflow.id else { continue };
        if Some(id) == skip {
            continue;
        }
        let sortindex = ranking.sortindex_of(id);
        if workflow.sortindex != sortindex {
            workflow.sortindex = sortindex;
            tx.update(&workflow).await?;
        }
    }
    Ok(())
}

/// Title for a duplicated workflow; falls back to the source title when the
/// template has no `{title}` placeholder
pub fn format_duplicate_title(template: &str, title: &str) -> String {
    if template.contains("{title}") {
        template.replace("{title}", title)
    } else {
        title.to_string()
    }
}
