// State file persistence and locking

use course_lifecycle::lifecycle::{
    Collaborators, LifecycleError, Settings, SettingsStore, SettingsType, TracingNotifier,
    WorkflowManager,
};
use course_lifecycle::memory::{
    LifecycleSnapshot, MemorySubplugins, MemoryWorkflowStore, StateFile,
};
use std::sync::Arc;

fn manager_over(store: &MemoryWorkflowStore, services: &Arc<MemorySubplugins>) -> WorkflowManager {
    let collaborators: Collaborators =
        services.collaborators(Arc::new(store.clone()), Arc::new(TracingNotifier));
    WorkflowManager::new(collaborators)
}

#[tokio::test]
async fn test_snapshot_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let store = MemoryWorkflowStore::new();
    let services = Arc::new(MemorySubplugins::new());
    let manager = manager_over(&store, &services);
    let id = manager.create_workflow("Archive").await.unwrap().id.unwrap();
    let settings: Settings = [("delay".to_string(), "60".to_string())].into_iter().collect();
    let trigger = manager
        .add_trigger(id, "startdatedelay", "delay", &settings)
        .await
        .unwrap();
    assert!(manager.activate(id).await.unwrap());
    services.start_process(id, 5).await;

    {
        let state = StateFile::open(&path).unwrap();
        let snapshot = LifecycleSnapshot::new(store.snapshot().await, services.snapshot().await);
        state.save(&snapshot).await.unwrap();
    }

    let state = StateFile::open(&path).unwrap();
    let snapshot = state.load().await.unwrap();
    let store = MemoryWorkflowStore::from_table(snapshot.workflows);
    let services = Arc::new(MemorySubplugins::from_tables(snapshot.subplugins));
    let manager = manager_over(&store, &services);

    let workflow = manager.get_workflow(id).await.unwrap().unwrap();
    assert!(workflow.active);
    assert_eq!(workflow.sortindex, Some(1));
    assert!(manager.is_abortable(id).await.unwrap());
    let restored = services.get(trigger.id.0, SettingsType::Trigger).await.unwrap();
    assert_eq!(restored, settings);

    // Ids keep counting from where they were
    let next = manager.create_workflow("Next").await.unwrap();
    assert_eq!(next.id.map(|i| i.0), Some(id.0 + 1));
}

#[tokio::test]
async fn test_second_open_is_refused_while_locked() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("state.json");

    let first = StateFile::open(&path).unwrap();
    assert!(matches!(
        StateFile::open(&path),
        Err(LifecycleError::StateLocked { .. })
    ));

    drop(first);
    assert!(StateFile::open(&path).is_ok());
}

#[tokio::test]
async fn test_corrupt_state_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "{ not json").unwrap();

    let state = StateFile::open(&path).unwrap();
    assert!(matches!(
        state.load().await,
        Err(LifecycleError::Serialization(_))
    ));
}
