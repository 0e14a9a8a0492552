//! The abstract trust store contract

use async_trait::async_trait;

use crate::error::TrustStoreResult;
use crate::record::{TrustPatch, TrustRecord, TrustRecordDraft};

/// Abstract contract for trust record persistence.
///
/// Implementations must make `create`/`update`/`delete` visible to
/// `get_all` in call order within one handle, and converge across
/// handles after `flush_and_reload`.
#[async_trait]
pub trait TrustStore: Send + Sync {
    /// Look up a record by id.
    async fn get_by_id(&self, id: &str) -> TrustStoreResult<Option<TrustRecord>>;

    /// Create a record. When `id` is `None` the deterministic id for the
    /// `(sender, receiver)` pair is used. Fails with
    /// [`Conflict`](crate::TrustStoreError::Conflict) when the id is
    /// already present.
    async fn create(
        &self,
        draft: TrustRecordDraft,
        id: Option<String>,
    ) -> TrustStoreResult<TrustRecord>;

    /// Merge a patch over an existing record. Fails with
    /// [`NotFound`](crate::TrustStoreError::NotFound).
    async fn update(&self, id: &str, patch: TrustPatch) -> TrustStoreResult<TrustRecord>;

    /// Remove a record. Fails with
    /// [`NotFound`](crate::TrustStoreError::NotFound).
    async fn delete(&self, id: &str) -> TrustStoreResult<()>;

    /// All records, optionally filtered to one receiver.
    async fn get_all(&self, receiver_id: Option<&str>) -> TrustStoreResult<Vec<TrustRecord>>;

    /// Force any pending writes to disk now.
    async fn flush_now(&self) -> TrustStoreResult<()>;

    /// Flush, then re-read the backing file, adopting changes made by
    /// other processes.
    async fn flush_and_reload(&self) -> TrustStoreResult<()>;
}
