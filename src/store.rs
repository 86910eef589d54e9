//! Record persistence.
//!
//! The pipeline talks to storage through [`NoticeStore`] so jobs can run
//! against anything from an in-memory vector (tests, dry runs) to a real
//! database adapter. [`MemoryStore`] is the reference implementation and the
//! one the CLI uses for single-shot runs.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::GazetteError;
use crate::model::{NoticeRecord, ProcessingStatus};

/// Persistence seam for notice records.
#[async_trait]
pub trait NoticeStore: Send + Sync {
    /// Persist a new record, assigning its id. Returns the stored record.
    async fn create(&self, record: NoticeRecord) -> Result<NoticeRecord, GazetteError>;

    /// Replace the record with the given id.
    async fn update(&self, record: NoticeRecord) -> Result<(), GazetteError>;

    /// All records currently in FAILED status, oldest first.
    async fn find_failed(&self) -> Result<Vec<NoticeRecord>, GazetteError>;

    /// All records created from the given source document.
    async fn find_by_document_path(&self, path: &str) -> Result<Vec<NoticeRecord>, GazetteError>;
}

/// In-memory store: a mutex-guarded vector with monotonically assigned ids.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    records: Vec<NoticeRecord>,
    next_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record, in insertion order.
    pub async fn all(&self) -> Vec<NoticeRecord> {
        self.inner.lock().await.records.clone()
    }
}

#[async_trait]
impl NoticeStore for MemoryStore {
    async fn create(&self, mut record: NoticeRecord) -> Result<NoticeRecord, GazetteError> {
        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        record.id = Some(inner.next_id);
        inner.records.push(record.clone());
        Ok(record)
    }

    async fn update(&self, record: NoticeRecord) -> Result<(), GazetteError> {
        let id = record
            .id
            .ok_or_else(|| GazetteError::StoreUnavailable("update without id".into()))?;
        let mut inner = self.inner.lock().await;
        match inner.records.iter_mut().find(|r| r.id == Some(id)) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(GazetteError::StoreUnavailable(format!(
                "no record with id {id}"
            ))),
        }
    }

    async fn find_failed(&self) -> Result<Vec<NoticeRecord>, GazetteError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .records
            .iter()
            .filter(|r| r.status == ProcessingStatus::Failed)
            .cloned()
            .collect())
    }

    async fn find_by_document_path(&self, path: &str) -> Result<Vec<NoticeRecord>, GazetteError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .records
            .iter()
            .filter(|r| r.original_document_path.as_deref() == Some(path))
            .cloned()
            .collect())
    }
}
