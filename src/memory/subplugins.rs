use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::lifecycle::{
    Collaborators, LifecycleError, Notifier, Process, ProcessId, ProcessService, Result,
    Settings, SettingsStore, SettingsType, StepId, StepInstance, StepService, TriggerId,
    TriggerInstance, TriggerService, WorkflowId, WorkflowStore,
};
use crate::subplugins::{StepKind, SubpluginCapabilities, TriggerKind};

/// Settings of one subplugin instance as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsRecord {
    pub instance_id: i64,
    pub settings_type: SettingsType,
    pub values: Settings,
}

/// Trigger, step, process and settings rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubpluginTables {
    #[serde(default)]
    next_trigger_id: i64,
    #[serde(default)]
    next_step_id: i64,
    #[serde(default)]
    next_process_id: i64,
    #[serde(default)]
    triggers: BTreeMap<TriggerId, TriggerInstance>,
    #[serde(default)]
    steps: BTreeMap<StepId, StepInstance>,
    #[serde(default)]
    processes: BTreeMap<ProcessId, Process>,
    #[serde(default)]
    settings: Vec<SettingsRecord>,
}

impl SubpluginTables {
    fn triggers_of(&self, workflow_id: WorkflowId) -> Vec<TriggerInstance> {
        let mut triggers: Vec<_> = self
            .triggers
            .values()
            .filter(|t| t.workflow_id == workflow_id)
            .cloned()
            .collect();
        triggers.sort_by_key(|t| (t.sortindex, t.id));
        triggers
    }

    fn steps_of(&self, workflow_id: WorkflowId) -> Vec<StepInstance> {
        let mut steps: Vec<_> = self
            .steps
            .values()
            .filter(|s| s.workflow_id == workflow_id)
            .cloned()
            .collect();
        steps.sort_by_key(|s| (s.sortindex, s.id));
        steps
    }

    fn settings_of(&self, instance_id: i64, settings_type: SettingsType) -> Settings {
        self.settings
            .iter()
            .find(|r| r.instance_id == instance_id && r.settings_type == settings_type)
            .map(|r| r.values.clone())
            .unwrap_or_default()
    }

    fn put_settings(&mut self, instance_id: i64, settings_type: SettingsType, values: Settings) {
        match self
            .settings
            .iter_mut()
            .find(|r| r.instance_id == instance_id && r.settings_type == settings_type)
        {
            Some(record) => record.values.extend(values),
            None => self.settings.push(SettingsRecord {
                instance_id,
                settings_type,
                values,
            }),
        }
    }

    fn drop_settings(&mut self, instance_id: i64, settings_type: SettingsType) {
        self.settings
            .retain(|r| !(r.instance_id == instance_id && r.settings_type == settings_type));
    }

    fn copy_settings(&mut self, from: i64, to: i64, settings_type: SettingsType) {
        let values = self.settings_of(from, settings_type);
        if !values.is_empty() {
            self.put_settings(to, settings_type, values);
        }
    }
}

/// Trigger, step, process and settings services kept in process memory
#[derive(Debug, Clone, Default)]
pub struct MemorySubplugins {
    tables: Arc<Mutex<SubpluginTables>>,
}

impl MemorySubplugins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables(tables: SubpluginTables) -> Self {
        Self {
            tables: Arc::new(Mutex::new(tables)),
        }
    }

    pub async fn snapshot(&self) -> SubpluginTables {
        self.tables.lock().await.clone()
    }

    /// Wire these services, a workflow store and a notifier into manager collaborators
    pub fn collaborators(
        self: &Arc<Self>,
        store: Arc<dyn WorkflowStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Collaborators {
        Collaborators {
            store,
            triggers: self.clone(),
            steps: self.clone(),
            processes: self.clone(),
            settings: self.clone(),
            notifier,
        }
    }

    /// Hand a course to a workflow, as the scheduler does when a trigger fires
    pub async fn start_process(&self, workflow_id: WorkflowId, course_id: i64) -> Process {
        let mut tables = self.tables.lock().await;
        tables.next_process_id += 1;
        let process = Process {
            id: ProcessId(tables.next_process_id),
            workflow_id,
            course_id,
            stepindex: 0,
            waiting: false,
            timestepchanged: Utc::now(),
        };
        tables.processes.insert(process.id, process.clone());
        process
    }
}

#[async_trait]
impl TriggerService for MemorySubplugins {
    async fn triggers_for_workflow(&self, workflow_id: WorkflowId) -> Result<Vec<TriggerInstance>> {
        Ok(self.tables.lock().await.triggers_of(workflow_id))
    }

    async fn is_manual_trigger(&self, subpluginname: &str) -> Result<bool> {
        Ok(TriggerKind::lookup(subpluginname)?.is_manual_trigger())
    }

    async fn has_multiple_instances(&self, subpluginname: &str) -> Result<bool> {
        Ok(TriggerKind::lookup(subpluginname)?.has_multiple_instances())
    }

    async fn add_trigger(
        &self,
        workflow_id: WorkflowId,
        subpluginname: &str,
        instancename: &str,
    ) -> Result<TriggerInstance> {
        TriggerKind::lookup(subpluginname)?;
        let mut tables = self.tables.lock().await;
        tables.next_trigger_id += 1;
        let trigger = TriggerInstance {
            id: TriggerId(tables.next_trigger_id),
            workflow_id,
            subpluginname: subpluginname.to_string(),
            instancename: instancename.to_string(),
            sortindex: tables.triggers_of(workflow_id).len() as u32 + 1,
        };
        tables.triggers.insert(trigger.id, trigger.clone());
        Ok(trigger)
    }

    async fn duplicate_triggers(&self, source: WorkflowId, target: WorkflowId) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let triggers = tables.triggers_of(source);
        for trigger in triggers {
            tables.next_trigger_id += 1;
            let copy = TriggerInstance {
                id: TriggerId(tables.next_trigger_id),
                workflow_id: target,
                ..trigger.clone()
            };
            tables.copy_settings(trigger.id.0, copy.id.0, SettingsType::Trigger);
            tables.triggers.insert(copy.id, copy);
        }
        Ok(())
    }

    async fn remove_instances_of_workflow(&self, workflow_id: WorkflowId) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let triggers = tables.triggers_of(workflow_id);
        for trigger in triggers {
            tables.drop_settings(trigger.id.0, SettingsType::Trigger);
            tables.triggers.remove(&trigger.id);
        }
        Ok(())
    }
}

#[async_trait]
impl StepService for MemorySubplugins {
    async fn steps_for_workflow(&self, workflow_id: WorkflowId) -> Result<Vec<StepInstance>> {
        Ok(self.tables.lock().await.steps_of(workflow_id))
    }

    async fn add_step(
        &self,
        workflow_id: WorkflowId,
        subpluginname: &str,
        instancename: &str,
    ) -> Result<StepInstance> {
        StepKind::lookup(subpluginname)?;
        let mut tables = self.tables.lock().await;
        tables.next_step_id += 1;
        let step = StepInstance {
            id: StepId(tables.next_step_id),
            workflow_id,
            subpluginname: subpluginname.to_string(),
            instancename: instancename.to_string(),
            sortindex: tables.steps_of(workflow_id).len() as u32 + 1,
        };
        tables.steps.insert(step.id, step.clone());
        Ok(step)
    }

    async fn duplicate_steps(&self, source: WorkflowId, target: WorkflowId) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let steps = tables.steps_of(source);
        for step in steps {
            tables.next_step_id += 1;
            let copy = StepInstance {
                id: StepId(tables.next_step_id),
                workflow_id: target,
                ..step.clone()
            };
            tables.copy_settings(step.id.0, copy.id.0, SettingsType::Step);
            tables.steps.insert(copy.id, copy);
        }
        Ok(())
    }

    async fn remove_instances_of_workflow(&self, workflow_id: WorkflowId) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let steps = tables.steps_of(workflow_id);
        for step in steps {
            tables.drop_settings(step.id.0, SettingsType::Step);
            tables.steps.remove(&step.id);
        }
        Ok(())
    }
}

#[async_trait]
impl ProcessService for MemorySubplugins {
    async fn processes_for_workflow(&self, workflow_id: WorkflowId) -> Result<Vec<Process>> {
        Ok(self
            .tables
            .lock()
            .await
            .processes
            .values()
            .filter(|p| p.workflow_id == workflow_id)
            .cloned()
            .collect())
    }

    async fn count_processes_for_workflow(&self, workflow_id: WorkflowId) -> Result<usize> {
        Ok(self
            .tables
            .lock()
            .await
            .processes
            .values()
            .filter(|p| p.workflow_id == workflow_id)
            .count())
    }

    async fn rollback(&self, process: &Process) -> Result<()> {
        match self.tables.lock().await.processes.remove(&process.id) {
            Some(_) => Ok(()),
            None => Err(LifecycleError::Collaborator(format!(
                "process {} is no longer running",
                process.id
            ))),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySubplugins {
    async fn get(&self, instance_id: i64, settings_type: SettingsType) -> Result<Settings> {
        Ok(self.tables.lock().await.settings_of(instance_id, settings_type))
    }

    async fn save(
        &self,
        instance_id: i64,
        settings_type: SettingsType,
        subpluginname: &str,
        data: &Settings,
    ) -> Result<()> {
        let declared = match settings_type {
            SettingsType::Trigger => TriggerKind::lookup(subpluginname)?.instance_settings(),
            SettingsType::Step => StepKind::lookup(subpluginname)?.instance_settings(),
        };
        let values: Settings = data
            .iter()
            .filter(|(key, _)| declared.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        self.tables
            .lock()
            .await
            .put_settings(instance_id, settings_type, values);
        Ok(())
    }

    async fn remove(&self, instance_id: i64, settings_type: SettingsType) -> Result<()> {
        self.tables
            .lock()
            .await
            .drop_settings(instance_id, settings_type);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_set_get_step_settings() {
        let services = MemorySubplugins::new();
        let step = services
            .add_step(WorkflowId(1), "email", "instancename")
            .await
            .unwrap();

        SettingsStore::save(
            &services,
            step.id.0,
            SettingsType::Step,
            "email",
            &settings(&[("subject", "value")]),
        )
        .await
        .unwrap();

        let stored = SettingsStore::get(&services, step.id.0, SettingsType::Step)
            .await
            .unwrap();
        assert_eq!(stored.get("subject").map(String::as_str), Some("value"));
    }

    #[tokio::test]
    async fn test_set_get_trigger_settings() {
        let services = MemorySubplugins::new();
        let trigger = services
            .add_trigger(WorkflowId(1), "startdatedelay", "delay")
            .await
            .unwrap();

        SettingsStore::save(
            &services,
            trigger.id.0,
            SettingsType::Trigger,
            "startdatedelay",
            &settings(&[("delay", "100")]),
        )
        .await
        .unwrap();

        let stored = SettingsStore::get(&services, trigger.id.0, SettingsType::Trigger)
            .await
            .unwrap();
        assert_eq!(stored.get("delay").map(String::as_str), Some("100"));
        // Same id, other scope
        assert!(SettingsStore::get(&services, trigger.id.0, SettingsType::Step)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_remove_settings_only_touches_one_scope() {
        let services = MemorySubplugins::new();
        let delay = settings(&[("delay", "5")]);
        SettingsStore::save(&services, 3, SettingsType::Trigger, "startdatedelay", &delay)
            .await
            .unwrap();
        SettingsStore::save(&services, 3, SettingsType::Step, "email", &settings(&[("subject", "x")]))
            .await
            .unwrap();

        SettingsStore::remove(&services, 3, SettingsType::Step).await.unwrap();

        assert!(SettingsStore::get(&services, 3, SettingsType::Step).await.unwrap().is_empty());
        assert_eq!(
            SettingsStore::get(&services, 3, SettingsType::Trigger).await.unwrap(),
            delay
        );
    }

    #[tokio::test]
    async fn test_undeclared_settings_are_ignored() {
        let services = MemorySubplugins::new();
        SettingsStore::save(
            &services,
            7,
            SettingsType::Step,
            "deletecourse",
            &settings(&[("maximumdeletionspercron", "10"), ("colour", "red")]),
        )
        .await
        .unwrap();

        let stored = SettingsStore::get(&services, 7, SettingsType::Step).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored.contains_key("maximumdeletionspercron"));
    }

    #[tokio::test]
    async fn test_save_for_unknown_subplugin_fails() {
        let services = MemorySubplugins::new();
        let result = SettingsStore::save(&services, 1, SettingsType::Trigger, "nope", &Settings::new()).await;
        assert!(matches!(result, Err(LifecycleError::UnknownSubplugin { .. })));
    }

    #[tokio::test]
    async fn test_steps_are_appended_in_order() {
        let services = MemorySubplugins::new();
        services.add_step(WorkflowId(3), "email", "notify").await.unwrap();
        services.add_step(WorkflowId(3), "createbackup", "backup").await.unwrap();
        services.add_step(WorkflowId(3), "deletecourse", "delete").await.unwrap();

        let names: Vec<_> = services
            .steps_for_workflow(WorkflowId(3))
            .await
            .unwrap()
            .into_iter()
            .map(|s| (s.sortindex, s.instancename))
            .collect();
        assert_eq!(
            names,
            vec![
                (1, "notify".to_string()),
                (2, "backup".to_string()),
                (3, "delete".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_rollback_twice_fails_second_time() {
        let services = MemorySubplugins::new();
        let process = services.start_process(WorkflowId(1), 42).await;

        services.rollback(&process).await.unwrap();
        assert!(services.rollback(&process).await.is_err());
        assert_eq!(services.count_processes_for_workflow(WorkflowId(1)).await.unwrap(), 0);
    }
}
