use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::store::{MergeChanges, TableSnapshot, TableStore};
use crate::types::{CompositeKey, TableName, TableSchema};

#[derive(Debug, Default)]
struct Inner {
    table_schema_calls: u64,
    lookup_rows_calls: u64,
    commit_merge_calls: u64,
    committed_changes: Vec<MergeChanges>,
    fail_next_commit: Option<ErrorKind>,
}

/// Test wrapper for [`TableStore`] implementations that records calls and injects failures.
///
/// Commits rejected through [`TestStoreWrapper::fail_next_commit`] never reach the wrapped store.
#[derive(Debug, Clone)]
pub struct TestStoreWrapper<S> {
    wrapped_store: S,
    inner: Arc<Mutex<Inner>>,
}

impl<S> TestStoreWrapper<S> {
    pub fn wrap(store: S) -> Self {
        Self {
            wrapped_store: store,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    pub fn wrapped_store(&self) -> &S {
        &self.wrapped_store
    }

    /// Makes the next [`TableStore::commit_merge`] call fail with `kind`.
    pub async fn fail_next_commit(&self, kind: ErrorKind) {
        self.inner.lock().await.fail_next_commit = Some(kind);
    }

    pub async fn table_schema_calls(&self) -> u64 {
        self.inner.lock().await.table_schema_calls
    }

    pub async fn lookup_rows_calls(&self) -> u64 {
        self.inner.lock().await.lookup_rows_calls
    }

    pub async fn commit_merge_calls(&self) -> u64 {
        self.inner.lock().await.commit_merge_calls
    }

    /// Returns the changes of every commit that reached the wrapped store.
    pub async fn committed_changes(&self) -> Vec<MergeChanges> {
        self.inner.lock().await.committed_changes.clone()
    }
}

impl<S> TableStore for TestStoreWrapper<S>
where
    S: TableStore + Send + Sync,
{
    fn name() -> &'static str {
        S::name()
    }

    async fn table_schema(&self, table_name: &TableName) -> EtlResult<Option<TableSchema>> {
        self.inner.lock().await.table_schema_calls += 1;

        self.wrapped_store.table_schema(table_name).await
    }

    async fn lookup_rows(
        &self,
        table_name: &TableName,
        key_columns: &[String],
        keys: &[CompositeKey],
    ) -> EtlResult<TableSnapshot> {
        self.inner.lock().await.lookup_rows_calls += 1;

        self.wrapped_store
            .lookup_rows(table_name, key_columns, keys)
            .await
    }

    async fn commit_merge(&self, table_name: &TableName, changes: MergeChanges) -> EtlResult<()> {
        {
            let mut inner = self.inner.lock().await;
            inner.commit_merge_calls += 1;

            if let Some(kind) = inner.fail_next_commit.take() {
                return Err(etl_error!(
                    kind,
                    "Injected commit failure",
                    format!("commit to {table_name} failed on request")
                ));
            }
        }

        self.wrapped_store
            .commit_merge(table_name, changes.clone())
            .await?;

        self.inner.lock().await.committed_changes.push(changes);

        Ok(())
    }
}
