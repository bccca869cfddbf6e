use crate::backend::BackendSession;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag, shared between a run and whoever may stop it
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Mutable state of one run.
///
/// Table handles are keyed by the index their chunk was given when it was read,
/// so iterating them yields file order.
#[derive(Debug)]
pub struct RunState<T> {
    handles: BTreeMap<usize, T>,
    chunks_dispatched: usize,
    rows: usize,
    progress: u8,
    cancel: CancelToken,
}

impl<T> RunState<T> {
    pub fn new(cancel: CancelToken) -> Self {
        RunState {
            handles: BTreeMap::new(),
            chunks_dispatched: 0,
            rows: 0,
            progress: 0,
            cancel,
        }
    }

    /// Reserve the next chunk index
    pub fn dispatch(&mut self, rows: usize) -> usize {
        let index = self.chunks_dispatched;
        self.chunks_dispatched += 1;
        self.rows += rows;
        index
    }

    pub fn record(&mut self, index: usize, handle: T) {
        self.handles.insert(index, handle);
    }

    pub fn chunks_dispatched(&self) -> usize {
        self.chunks_dispatched
    }

    pub fn handles_created(&self) -> usize {
        self.handles.len()
    }

    /// Every dispatched chunk has a handle
    pub fn all_resolved(&self) -> bool {
        self.handles.len() == self.chunks_dispatched
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.is_canceled()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Raise the reported progress to `percent`, never lowering it. Returns the
    /// value to report.
    pub fn advance(&mut self, percent: u8) -> u8 {
        self.progress = self.progress.max(percent.min(100));
        self.progress
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// Hand over all handles in chunk order
    pub fn take_handles(&mut self) -> Vec<T> {
        std::mem::take(&mut self.handles).into_values().collect()
    }

    /// Close every handle still owned by the run
    pub fn close_all<S>(&mut self, session: &S)
    where
        S: BackendSession<Table = T> + ?Sized,
    {
        for (_, handle) in std::mem::take(&mut self.handles) {
            session.close_table(handle);
        }
    }
}
