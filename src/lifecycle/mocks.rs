// Test doubles and fixtures - in-memory backends, no side effects

use std::sync::{Arc, Mutex};

use crate::lifecycle::traits::*;
use crate::lifecycle::types::*;
use crate::lifecycle::{Collaborators, WorkflowManager};
use crate::memory::{MemorySubplugins, MemoryWorkflowStore};

/// Notifier that remembers every message
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<(NotificationLevel, String)>>,
}

impl RecordingNotifier {
    pub fn recorded(&self) -> Vec<(NotificationLevel, String)> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.recorded()
            .into_iter()
            .filter(|(level, _)| *level == NotificationLevel::Warning)
            .map(|(_, message)| message)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NotificationLevel, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((level, message.to_string()));
        }
    }
}

/// A manager over fresh in-memory backends
pub struct Harness {
    pub manager: WorkflowManager,
    pub store: MemoryWorkflowStore,
    pub services: Arc<MemorySubplugins>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        let store = MemoryWorkflowStore::new();
        let services = Arc::new(MemorySubplugins::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let manager = WorkflowManager::new(services.collaborators(
            Arc::new(store.clone()),
            notifier.clone(),
        ));
        Self {
            manager,
            store,
            services,
            notifier,
        }
    }

    /// Collaborators backed by this harness, for building managers with some ports swapped
    pub fn collaborators(&self) -> Collaborators {
        self.services
            .collaborators(Arc::new(self.store.clone()), self.notifier.clone())
    }

    /// Draft workflow with one trigger of the given subplugin
    pub async fn workflow_with_trigger(&self, title: &str, trigger: &str) -> WorkflowId {
        let workflow = self.manager.create_workflow(title).await.unwrap();
        let id = workflow.id.unwrap();
        self.manager
            .add_trigger(id, trigger, trigger, &Settings::new())
            .await
            .unwrap();
        id
    }

    /// Active automatic workflow
    pub async fn active_automatic(&self, title: &str) -> WorkflowId {
        let id = self.workflow_with_trigger(title, "startdatedelay").await;
        assert!(self.manager.activate(id).await.unwrap());
        id
    }

    pub async fn workflow(&self, id: WorkflowId) -> Workflow {
        self.manager.get_workflow(id).await.unwrap().unwrap()
    }

    pub async fn sortindex(&self, id: WorkflowId) -> Option<u32> {
        self.workflow(id).await.sortindex
    }

    /// Sortindices of all active automatic workflows, in list order
    pub async fn ranking(&self) -> Vec<(WorkflowId, u32)> {
        self.manager
            .list_active_automatic()
            .await
            .unwrap()
            .into_iter()
            .filter_map(|w| Some((w.id?, w.sortindex?)))
            .collect()
    }

    /// Whether sortindices form exactly 1..=n
    pub async fn ranking_is_dense(&self) -> bool {
        let indices: Vec<u32> = self.ranking().await.into_iter().map(|(_, i)| i).collect();
        let active = self.manager.list_active_automatic().await.unwrap().len();
        indices.len() == active && indices.iter().copied().eq(1..=active as u32)
    }
}
