use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::config::LifecycleConfig;
use crate::database::open_workflow_store;
use crate::lifecycle::{ConsoleNotifier, WorkflowManager, WorkflowStore};
use crate::memory::{
    LifecycleSnapshot, MemorySubplugins, MemoryWorkflowStore, StateFile, WorkflowTable,
};

enum Workflows {
    Memory(MemoryWorkflowStore),
    /// Kept in the database; the table loaded from the state file is written back untouched
    Database(WorkflowTable),
}

/// Manager wired to the configured backends, plus the state file holding them
pub struct Backend {
    pub manager: WorkflowManager,
    pub services: Arc<MemorySubplugins>,
    workflows: Workflows,
    state: StateFile,
}

impl Backend {
    pub async fn open(config: &LifecycleConfig, state_path: &Path) -> Result<Self> {
        let state = StateFile::open(state_path)?;
        let snapshot = state.load().await?;
        let services = Arc::new(MemorySubplugins::from_tables(snapshot.subplugins));

        let (store, workflows): (Arc<dyn WorkflowStore>, Workflows) = match &config.database {
            Some(database) => (
                open_workflow_store(database).await?,
                Workflows::Database(snapshot.workflows),
            ),
            None => {
                let memory = MemoryWorkflowStore::from_table(snapshot.workflows);
                let store: Arc<dyn WorkflowStore> = Arc::new(memory.clone());
                (store, Workflows::Memory(memory))
            }
        };
        debug!(
            state = %state_path.display(),
            database = config.database.is_some(),
            "Backends opened"
        );

        let manager = WorkflowManager::new(services.collaborators(store, Arc::new(ConsoleNotifier)))
            .with_duplicate_title_template(config.workflows.duplicate_title_template.clone());

        Ok(Self {
            manager,
            services,
            workflows,
            state,
        })
    }

    pub async fn save(&self) -> Result<()> {
        let workflows = match &self.workflows {
            Workflows::Memory(store) => store.snapshot().await,
            Workflows::Database(table) => table.clone(),
        };
        let snapshot = LifecycleSnapshot::new(workflows, self.services.snapshot().await);
        self.state.save(&snapshot).await?;
        Ok(())
    }
}
