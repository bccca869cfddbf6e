//! Table backend contract
//!
//! The ingestion engine never stores data itself. Every column batch is handed to a
//! [`BackendSession`], which returns an opaque table handle the engine must either
//! bind under a name or close.

mod store;

pub use store::{LocalTable, LocalTableStore, TableData, TableWriter};

use crate::types::{ColumnBatch, ColumnType};
use async_trait::async_trait;
use std::fmt::Debug;

/// A session with a table-processing backend
#[async_trait]
pub trait BackendSession: Send + Sync {
    /// Handle to one table living in the backend
    type Table: Send + Sync + Debug;

    /// Create a table from one column batch
    async fn create_table(
        &self,
        headers: &[String],
        types: &[ColumnType],
        columns: ColumnBatch,
        time_zone: &str,
    ) -> anyhow::Result<Self::Table>;

    /// Concatenate tables, in the given order, into a new one
    async fn merge_tables(&self, tables: &[Self::Table]) -> anyhow::Result<Self::Table>;

    /// Publish a table under a variable name
    async fn bind_table_to_variable(&self, table: &Self::Table, name: &str) -> anyhow::Result<()>;

    /// Release a table. Never fails; the handle is gone either way.
    fn close_table(&self, table: Self::Table);
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type CreateHook = Box<dyn Fn(usize) + Send + Sync>;

    /// Wraps a [`LocalTableStore`], counting calls and failing on request
    pub(crate) struct TrackingSession {
        pub(crate) store: LocalTableStore,
        creates: AtomicUsize,
        merges: AtomicUsize,
        binds: AtomicUsize,
        opened: AtomicUsize,
        closes: AtomicUsize,
        fail_create_at: Option<usize>,
        fail_merge: bool,
        fail_bind: bool,
        on_create: Option<CreateHook>,
    }

    impl TrackingSession {
        pub(crate) fn new() -> Self {
            Self {
                store: LocalTableStore::new(),
                creates: AtomicUsize::new(0),
                merges: AtomicUsize::new(0),
                binds: AtomicUsize::new(0),
                opened: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
                fail_create_at: None,
                fail_merge: false,
                fail_bind: false,
                on_create: None,
            }
        }

        /// Reject the `n`th create call (0-based)
        pub(crate) fn failing_create_at(mut self, n: usize) -> Self {
            self.fail_create_at = Some(n);
            self
        }

        pub(crate) fn failing_merge(mut self) -> Self {
            self.fail_merge = true;
            self
        }

        pub(crate) fn failing_bind(mut self) -> Self {
            self.fail_bind = true;
            self
        }

        /// Run `hook` with the call index after every successful create
        pub(crate) fn on_create(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
            self.on_create = Some(Box::new(hook));
            self
        }

        pub(crate) fn creates(&self) -> usize {
            self.creates.load(Ordering::SeqCst)
        }

        pub(crate) fn merges(&self) -> usize {
            self.merges.load(Ordering::SeqCst)
        }

        pub(crate) fn binds(&self) -> usize {
            self.binds.load(Ordering::SeqCst)
        }

        /// Tables handed out by successful create and merge calls
        pub(crate) fn opened(&self) -> usize {
            self.opened.load(Ordering::SeqCst)
        }

        pub(crate) fn closes(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BackendSession for TrackingSession {
        type Table = LocalTable;

        async fn create_table(
            &self,
            headers: &[String],
            types: &[ColumnType],
            columns: ColumnBatch,
            time_zone: &str,
        ) -> anyhow::Result<LocalTable> {
            let n = self.creates.fetch_add(1, Ordering::SeqCst);
            if self.fail_create_at == Some(n) {
                bail!("create #{} rejected", n);
            }
            let table = self.store.create_table(headers, types, columns, time_zone).await?;
            self.opened.fetch_add(1, Ordering::SeqCst);
            if let Some(hook) = &self.on_create {
                hook(n);
            }
            Ok(table)
        }

        async fn merge_tables(&self, tables: &[LocalTable]) -> anyhow::Result<LocalTable> {
            self.merges.fetch_add(1, Ordering::SeqCst);
            if self.fail_merge {
                bail!("merge rejected");
            }
            let merged = self.store.merge_tables(tables).await?;
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(merged)
        }

        async fn bind_table_to_variable(&self, table: &LocalTable, name: &str) -> anyhow::Result<()> {
            self.binds.fetch_add(1, Ordering::SeqCst);
            if self.fail_bind {
                bail!("bind rejected");
            }
            self.store.bind_table_to_variable(table, name).await
        }

        fn close_table(&self, table: LocalTable) {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.store.close_table(table)
        }
    }
}
