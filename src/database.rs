use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::lifecycle::WorkflowStore;

#[cfg(feature = "database")]
use async_trait::async_trait;
#[cfg(feature = "database")]
use chrono::{DateTime, Utc};
#[cfg(feature = "database")]
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Sqlite, SqlitePool};
#[cfg(feature = "database")]
use tracing::info;

#[cfg(feature = "database")]
use crate::lifecycle::{
    LifecycleError, Result, Workflow, WorkflowFilter, WorkflowId, WorkflowTransaction,
};

#[cfg(feature = "database")]
/// Workflow store persisted in SQLite
#[derive(Debug, Clone)]
pub struct SqliteWorkflowStore {
    pool: SqlitePool,
}

#[cfg(feature = "database")]
impl SqliteWorkflowStore {
    /// Connect, creating the database file and running migrations when asked
    pub async fn connect(database_url: &str, max_connections: u32, auto_migrate: bool) -> Result<Self> {
        if !is_memory_url(database_url) && !Sqlite::database_exists(database_url).await? {
            info!("Creating database at {}", database_url);
            Sqlite::create_database(database_url).await?;
        }

        // Every connection to an in-memory database opens its own empty one
        let options = if is_memory_url(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections)
        };
        let pool = options.connect(database_url).await?;

        if auto_migrate {
            info!("Running database migrations...");
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Database migrations completed");
        }

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close database connections gracefully
    pub async fn shutdown(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
        info!("Database connections closed");
    }
}

#[cfg(feature = "database")]
fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

#[cfg(feature = "database")]
#[async_trait]
impl WorkflowStore for SqliteWorkflowStore {
    async fn begin(&self) -> Result<Box<dyn WorkflowTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteWorkflowTransaction { tx }))
    }
}

#[cfg(feature = "database")]
pub struct SqliteWorkflowTransaction {
    tx: sqlx::Transaction<'static, Sqlite>,
}

#[cfg(feature = "database")]
#[derive(sqlx::FromRow)]
struct WorkflowRow {
    id: i64,
    title: String,
    active: bool,
    manual: Option<bool>,
    sortindex: Option<i64>,
    timeactive: Option<i64>,
    timedeactive: Option<i64>,
}

#[cfg(feature = "database")]
impl From<WorkflowRow> for Workflow {
    fn from(row: WorkflowRow) -> Self {
        Workflow {
            id: Some(WorkflowId(row.id)),
            title: row.title,
            active: row.active,
            manual: row.manual,
            sortindex: row.sortindex.and_then(|i| u32::try_from(i).ok()),
            timeactive: row.timeactive.and_then(from_timestamp),
            timedeactive: row.timedeactive.and_then(from_timestamp),
        }
    }
}

#[cfg(feature = "database")]
fn from_timestamp(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

#[cfg(feature = "database")]
const SELECT_WORKFLOWS: &str =
    "SELECT id, title, active, manual, sortindex, timeactive, timedeactive FROM workflows";

#[cfg(feature = "database")]
fn filter_clause(filter: WorkflowFilter) -> &'static str {
    match filter {
        WorkflowFilter::All => "",
        WorkflowFilter::Active => " WHERE active = 1",
        WorkflowFilter::ActiveAutomatic => " WHERE active = 1 AND manual = 0",
        WorkflowFilter::ActiveManual => " WHERE active = 1 AND manual = 1",
    }
}

#[cfg(feature = "database")]
#[async_trait]
impl WorkflowTransaction for SqliteWorkflowTransaction {
    async fn get(&mut self, id: WorkflowId) -> Result<Option<Workflow>> {
        let row: Option<WorkflowRow> =
            sqlx::query_as(&format!("{SELECT_WORKFLOWS} WHERE id = ?1"))
                .bind(id.0)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(row.map(Workflow::from))
    }

    async fn list(&mut self, filter: WorkflowFilter) -> Result<Vec<Workflow>> {
        let sql = format!(
            "{SELECT_WORKFLOWS}{} ORDER BY sortindex IS NULL, sortindex, id",
            filter_clause(filter)
        );
        let rows: Vec<WorkflowRow> = sqlx::query_as(&sql).fetch_all(&mut *self.tx).await?;
        Ok(rows.into_iter().map(Workflow::from).collect())
    }

    async fn insert(&mut self, workflow: &Workflow) -> Result<WorkflowId> {
        let result = sqlx::query(
            r#"
            INSERT INTO workflows (title, active, manual, sortindex, timeactive, timedeactive)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(workflow.title.as_str())
        .bind(workflow.active)
        .bind(workflow.manual)
        .bind(workflow.sortindex.map(i64::from))
        .bind(workflow.timeactive.map(|t| t.timestamp()))
        .bind(workflow.timedeactive.map(|t| t.timestamp()))
        .execute(&mut *self.tx)
        .await?;
        Ok(WorkflowId(result.last_insert_rowid()))
    }

    async fn update(&mut self, workflow: &Workflow) -> Result<()> {
        let Some(id) = workflow.id else {
            return Err(LifecycleError::Collaborator(
                "cannot update a workflow that was never inserted".to_string(),
            ));
        };
        let result = sqlx::query(
            r#"
            UPDATE workflows
            SET title = ?2, active = ?3, manual = ?4, sortindex = ?5,
                timeactive = ?6, timedeactive = ?7
            WHERE id = ?1
            "#,
        )
        .bind(id.0)
        .bind(workflow.title.as_str())
        .bind(workflow.active)
        .bind(workflow.manual)
        .bind(workflow.sortindex.map(i64::from))
        .bind(workflow.timeactive.map(|t| t.timestamp()))
        .bind(workflow.timedeactive.map(|t| t.timestamp()))
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LifecycleError::WorkflowNotFound(id));
        }
        Ok(())
    }

    async fn delete(&mut self, id: WorkflowId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = ?1")
            .bind(id.0)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[cfg(feature = "database")]
/// Open the configured SQLite workflow store
pub async fn open_workflow_store(config: &DatabaseConfig) -> anyhow::Result<Arc<dyn WorkflowStore>> {
    info!("Initializing database at {}", config.url);
    let store =
        SqliteWorkflowStore::connect(&config.url, config.max_connections, config.auto_migrate)
            .await?;
    Ok(Arc::new(store))
}

// Stub implementation for when database feature is not enabled
#[cfg(not(feature = "database"))]
pub async fn open_workflow_store(config: &DatabaseConfig) -> anyhow::Result<Arc<dyn WorkflowStore>> {
    anyhow::bail!(
        "database {} is configured but this build has no database support; rebuild with --features database",
        config.url
    )
}

#[cfg(all(test, feature = "database"))]
mod tests {
    use super::*;

    async fn memory_store() -> SqliteWorkflowStore {
        SqliteWorkflowStore::connect("sqlite::memory:", 1, true)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_memory_database_uses_single_connection() {
        let store = SqliteWorkflowStore::connect("sqlite::memory:", 5, true)
            .await
            .unwrap();
        assert_eq!(store.pool().options().get_max_connections(), 1);

        let mut tx = store.begin().await.unwrap();
        let id = tx.insert(&Workflow::new("kept")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.get(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = memory_store().await;
        let mut workflow = Workflow::new("Delete old courses");
        workflow.active = true;
        workflow.manual = Some(false);
        workflow.sortindex = Some(1);
        workflow.timeactive = DateTime::from_timestamp(1_700_000_000, 0);

        let mut tx = store.begin().await.unwrap();
        let id = tx.insert(&workflow).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let stored = tx.get(id).await.unwrap().unwrap();
        workflow.id = Some(id);
        assert_eq!(stored, workflow);
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = memory_store().await;
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert(&Workflow::new("discarded")).await.unwrap();
        }
        let mut tx = store.begin().await.unwrap();
        assert!(tx.list(WorkflowFilter::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_filters_and_order() {
        let store = memory_store().await;
        let mut tx = store.begin().await.unwrap();
        for (title, manual, sortindex) in [
            ("second", Some(false), Some(2)),
            ("manual", Some(true), None),
            ("first", Some(false), Some(1)),
        ] {
            let mut workflow = Workflow::new(title);
            workflow.active = true;
            workflow.manual = manual;
            workflow.sortindex = sortindex;
            tx.insert(&workflow).await.unwrap();
        }
        tx.insert(&Workflow::new("draft")).await.unwrap();

        let titles = |workflows: Vec<Workflow>| -> Vec<String> {
            workflows.into_iter().map(|w| w.title).collect()
        };
        assert_eq!(
            titles(tx.list(WorkflowFilter::ActiveAutomatic).await.unwrap()),
            vec!["first", "second"]
        );
        assert_eq!(titles(tx.list(WorkflowFilter::ActiveManual).await.unwrap()), vec!["manual"]);
        assert_eq!(tx.list(WorkflowFilter::All).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_update_and_delete_unknown_rows() {
        let store = memory_store().await;
        let mut ghost = Workflow::new("ghost");
        ghost.id = Some(WorkflowId(12));

        let mut tx = store.begin().await.unwrap();
        assert!(matches!(
            tx.update(&ghost).await,
            Err(LifecycleError::WorkflowNotFound(WorkflowId(12)))
        ));
        assert!(!tx.delete(WorkflowId(12)).await.unwrap());
    }
}
