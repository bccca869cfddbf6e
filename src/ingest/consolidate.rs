use crate::types::ColumnBatch;

/// Number of archive chunks merged into one upload
pub const DEFAULT_CONSOLIDATE_THRESHOLD: usize = 650;

/// Buffers small column batches and releases them as one larger batch.
///
/// Decompression streams produce many small chunks; uploading each one would
/// create thousands of tiny tables.
#[derive(Debug)]
pub struct ChunkConsolidator {
    threshold: usize,
    pending: Option<ColumnBatch>,
    merged: usize,
}

impl ChunkConsolidator {
    pub fn new(threshold: usize) -> Self {
        ChunkConsolidator {
            threshold: threshold.max(1),
            pending: None,
            merged: 0,
        }
    }

    /// Add a batch; returns the merged batch once `threshold` batches are buffered
    pub fn push(&mut self, batch: ColumnBatch) -> Option<ColumnBatch> {
        match &mut self.pending {
            Some(pending) => pending.append(batch),
            None => self.pending = Some(batch),
        }
        self.merged += 1;

        if self.merged >= self.threshold {
            self.take()
        } else {
            None
        }
    }

    /// Whatever is still buffered at end of stream
    pub fn finish(&mut self) -> Option<ColumnBatch> {
        self.take()
    }

    /// Batches currently buffered
    pub fn buffered(&self) -> usize {
        self.merged
    }

    fn take(&mut self) -> Option<ColumnBatch> {
        self.merged = 0;
        self.pending.take()
    }
}

impl Default for ChunkConsolidator {
    fn default() -> Self {
        ChunkConsolidator::new(DEFAULT_CONSOLIDATE_THRESHOLD)
    }
}
