use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::lifecycle::{
    LifecycleError, Result, Workflow, WorkflowFilter, WorkflowId, WorkflowStore,
    WorkflowTransaction,
};

/// Workflow rows plus the id sequence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowTable {
    #[serde(default)]
    next_id: i64,
    #[serde(default)]
    rows: BTreeMap<WorkflowId, Workflow>,
}

impl WorkflowTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn list(&self, filter: WorkflowFilter) -> Vec<Workflow> {
        let mut workflows: Vec<Workflow> = self
            .rows
            .values()
            .filter(|w| filter.matches(w))
            .cloned()
            .collect();
        workflows.sort_by_key(|w| (w.sortindex.is_none(), w.sortindex, w.id));
        workflows
    }
}

/// Workflow store kept in process memory.
///
/// Transactions are serialised: a transaction owns the table lock until it is
/// committed or dropped, and works on a staged copy in the meantime.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkflowStore {
    table: Arc<Mutex<WorkflowTable>>,
}

impl MemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_table(table: WorkflowTable) -> Self {
        Self {
            table: Arc::new(Mutex::new(table)),
        }
    }

    /// Copy of the committed table
    pub async fn snapshot(&self) -> WorkflowTable {
        self.table.lock().await.clone()
    }
}

#[async_trait]
impl WorkflowStore for MemoryWorkflowStore {
    async fn begin(&self) -> Result<Box<dyn WorkflowTransaction>> {
        let guard = self.table.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, staged }))
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<WorkflowTable>,
    staged: WorkflowTable,
}

#[async_trait]
impl WorkflowTransaction for MemoryTransaction {
    async fn get(&mut self, id: WorkflowId) -> Result<Option<Workflow>> {
        Ok(self.staged.rows.get(&id).cloned())
    }

    async fn list(&mut self, filter: WorkflowFilter) -> Result<Vec<Workflow>> {
        Ok(self.staged.list(filter))
    }

    async fn insert(&mut self, workflow: &Workflow) -> Result<WorkflowId> {
        self.staged.next_id += 1;
        let id = WorkflowId(self.staged.next_id);
        let mut row = workflow.clone();
        row.id = Some(id);
        self.staged.rows.insert(id, row);
        Ok(id)
    }

    async fn update(&mut self, workflow: &Workflow) -> Result<()> {
        let Some(id) = workflow.id else {
            return Err(LifecycleError::Collaborator(
                "cannot update a workflow that was never inserted".to_string(),
            ));
        };
        match self.staged.rows.get_mut(&id) {
            Some(row) => {
                *row = workflow.clone();
                Ok(())
            }
            None => Err(LifecycleError::WorkflowNotFound(id)),
        }
    }

    async fn delete(&mut self, id: WorkflowId) -> Result<bool> {
        Ok(self.staged.rows.remove(&id).is_some())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids() {
        let store = MemoryWorkflowStore::new();
        let mut tx = store.begin().await.unwrap();
        let first = tx.insert(&Workflow::new("a")).await.unwrap();
        let second = tx.insert(&Workflow::new("b")).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first, WorkflowId(1));
        assert_eq!(second, WorkflowId(2));
        assert_eq!(store.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = MemoryWorkflowStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert(&Workflow::new("discarded")).await.unwrap();
        }
        assert!(store.snapshot().await.is_empty());

        // The id sequence is part of the rolled back state too
        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.insert(&Workflow::new("kept")).await.unwrap(), WorkflowId(1));
    }

    #[tokio::test]
    async fn test_update_unknown_workflow_fails() {
        let store = MemoryWorkflowStore::new();
        let mut workflow = Workflow::new("ghost");
        workflow.id = Some(WorkflowId(99));

        let mut tx = store.begin().await.unwrap();
        let result = tx.update(&workflow).await;
        assert!(matches!(result, Err(LifecycleError::WorkflowNotFound(WorkflowId(99)))));
    }

    #[tokio::test]
    async fn test_list_orders_ranked_first() {
        let store = MemoryWorkflowStore::new();
        let mut tx = store.begin().await.unwrap();
        for (title, sortindex) in [("draft", None), ("second", Some(2)), ("first", Some(1))] {
            let mut workflow = Workflow::new(title);
            workflow.sortindex = sortindex;
            tx.insert(&workflow).await.unwrap();
        }

        let titles: Vec<_> = tx
            .list(WorkflowFilter::All)
            .await
            .unwrap()
            .into_iter()
            .map(|w| w.title)
            .collect();
        assert_eq!(titles, vec!["first", "second", "draft"]);
    }
}
