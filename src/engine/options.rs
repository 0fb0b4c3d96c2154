use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::metadata::EntityMetadata;

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Runtime switches and callbacks consulted while a query executes.
pub trait QueryExecutionOptions {
    fn cancelled(&self) -> bool;

    fn block_update_without_where(&self) -> bool;

    fn block_delete_without_where(&self) -> bool;

    fn use_bulk_delete(&self) -> bool;

    fn batch_size(&self) -> usize;

    fn progress(&self, message: &str);

    /// Asked before each further page with the number of rows retrieved so far.
    fn continue_retrieve(&self, count: usize) -> bool;

    fn confirm_update(&self, count: usize, metadata: &EntityMetadata) -> bool;

    fn confirm_delete(&self, count: usize, metadata: &EntityMetadata) -> bool;
}

type ProgressFn = Box<dyn Fn(&str) + Send + Sync>;
type ContinueFn = Box<dyn Fn(usize) -> bool + Send + Sync>;
type ConfirmFn = Box<dyn Fn(usize, &EntityMetadata) -> bool + Send + Sync>;

/// Plain-field implementation of [`QueryExecutionOptions`].
///
/// Every callback is optional; a missing confirmation or continuation callback answers yes.
pub struct ExecutionSettings {
    pub batch_size: usize,
    pub block_update_without_where: bool,
    pub block_delete_without_where: bool,
    pub use_bulk_delete: bool,
    cancel: Arc<AtomicBool>,
    progress: Option<ProgressFn>,
    continue_retrieve: Option<ContinueFn>,
    confirm_update: Option<ConfirmFn>,
    confirm_delete: Option<ConfirmFn>,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            block_update_without_where: true,
            block_delete_without_where: true,
            use_bulk_delete: false,
            cancel: Arc::new(AtomicBool::new(false)),
            progress: None,
            continue_retrieve: None,
            confirm_update: None,
            confirm_delete: None,
        }
    }
}

impl ExecutionSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_block_update_without_where(mut self, block: bool) -> Self {
        self.block_update_without_where = block;
        self
    }

    pub fn with_block_delete_without_where(mut self, block: bool) -> Self {
        self.block_delete_without_where = block;
        self
    }

    pub fn with_bulk_delete(mut self, enabled: bool) -> Self {
        self.use_bulk_delete = enabled;
        self
    }

    pub fn with_progress(mut self, progress: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    pub fn with_continue_retrieve(mut self, callback: impl Fn(usize) -> bool + Send + Sync + 'static) -> Self {
        self.continue_retrieve = Some(Box::new(callback));
        self
    }

    pub fn with_confirm_update(mut self, callback: impl Fn(usize, &EntityMetadata) -> bool + Send + Sync + 'static) -> Self {
        self.confirm_update = Some(Box::new(callback));
        self
    }

    pub fn with_confirm_delete(mut self, callback: impl Fn(usize, &EntityMetadata) -> bool + Send + Sync + 'static) -> Self {
        self.confirm_delete = Some(Box::new(callback));
        self
    }

    /// Shared flag; setting it asks a running query to stop at its next page or batch.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

impl QueryExecutionOptions for ExecutionSettings {
    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn block_update_without_where(&self) -> bool {
        self.block_update_without_where
    }

    fn block_delete_without_where(&self) -> bool {
        self.block_delete_without_where
    }

    fn use_bulk_delete(&self) -> bool {
        self.use_bulk_delete
    }

    fn batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    fn progress(&self, message: &str) {
        if let Some(progress) = &self.progress {
            progress(message);
        }
    }

    fn continue_retrieve(&self, count: usize) -> bool {
        self.continue_retrieve.as_ref().is_none_or(|f| f(count))
    }

    fn confirm_update(&self, count: usize, metadata: &EntityMetadata) -> bool {
        self.confirm_update.as_ref().is_none_or(|f| f(count, metadata))
    }

    fn confirm_delete(&self, count: usize, metadata: &EntityMetadata) -> bool {
        self.confirm_delete.as_ref().is_none_or(|f| f(count, metadata))
    }
}
