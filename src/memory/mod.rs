// In-memory backends for the lifecycle ports, persisted as a JSON state file

pub mod state_file;
pub mod store;
pub mod subplugins;

pub use state_file::{LifecycleSnapshot, StateFile, SNAPSHOT_VERSION};
pub use store::{MemoryTransaction, MemoryWorkflowStore, WorkflowTable};
pub use subplugins::{MemorySubplugins, SettingsRecord, SubpluginTables};
