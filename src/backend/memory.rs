//! In-process backend used by the `demo` command and tests.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use super::error::BackendError;
use super::types::{Ack, ConfirmationRecord, Finalized, LockStatus, ShipmentRequest};
use super::WarehouseBackend;
use crate::scan::{PickLine, StepOrder};
use crate::workflow::ListKind;

const DEFAULT_LOCK_TIMEOUT_MINUTES: i64 = 30;

type ListKey = (ListKind, String);

#[derive(Debug, Clone)]
struct LockEntry {
    session_id: String,
    acquired_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    lists: HashMap<ListKey, Vec<PickLine>>,
    step_order: Option<StepOrder>,
    locks: HashMap<ListKey, LockEntry>,
    confirmations: Vec<ConfirmationRecord>,
    shipments: Vec<ShipmentRequest>,
    reject_confirmations: bool,
    documents_issued: u32,
    shipments_issued: u32,
}

impl Inner {
    fn list(&self, kind: ListKind, list_id: &str) -> Result<&Vec<PickLine>, BackendError> {
        self.lists
            .get(&(kind, list_id.to_string()))
            .ok_or_else(|| BackendError::UnknownList(list_id.to_string()))
    }
}

/// Pick lists, delivery notes and locks kept in process memory.
///
/// Finalizing a pick list creates one delivery note per group of confirmed
/// lines, ready to be packed.
pub struct MemoryBackend {
    inner: Mutex<Inner>,
    lock_timeout: TimeDelta,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            lock_timeout: TimeDelta::minutes(DEFAULT_LOCK_TIMEOUT_MINUTES),
        }
    }

    pub fn with_lock_timeout(mut self, timeout: TimeDelta) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub async fn insert_list(&self, list_id: impl Into<String>, lines: Vec<PickLine>) {
        self.insert(ListKind::Pick, list_id.into(), lines).await;
    }

    pub async fn insert_delivery_note(&self, note: impl Into<String>, lines: Vec<PickLine>) {
        self.insert(ListKind::Pack, note.into(), lines).await;
    }

    async fn insert(&self, kind: ListKind, id: String, lines: Vec<PickLine>) {
        self.inner.lock().await.lists.insert((kind, id), lines);
    }

    pub async fn set_step_order(&self, order: StepOrder) {
        self.inner.lock().await.step_order = Some(order);
    }

    /// Makes every following confirmation come back as rejected.
    pub async fn reject_confirmations(&self, reject: bool) {
        self.inner.lock().await.reject_confirmations = reject;
    }

    pub async fn confirmations(&self) -> Vec<ConfirmationRecord> {
        self.inner.lock().await.confirmations.clone()
    }

    pub async fn shipments(&self) -> Vec<ShipmentRequest> {
        self.inner.lock().await.shipments.clone()
    }

    pub async fn lines(&self, kind: ListKind, list_id: &str) -> Option<Vec<PickLine>> {
        self.inner
            .lock()
            .await
            .lists
            .get(&(kind, list_id.to_string()))
            .cloned()
    }

    pub async fn lock_holder(&self, kind: ListKind, key: &str) -> Option<String> {
        self.inner
            .lock()
            .await
            .locks
            .get(&(kind, key.to_string()))
            .map(|entry| entry.session_id.clone())
    }

    /// Takes a lock on behalf of another session at `acquired_at`.
    pub async fn hold_lock(
        &self,
        kind: ListKind,
        key: &str,
        session_id: &str,
        acquired_at: DateTime<Utc>,
    ) {
        self.inner.lock().await.locks.insert(
            (kind, key.to_string()),
            LockEntry {
                session_id: session_id.to_string(),
                acquired_at,
            },
        );
    }
}

#[async_trait]
impl WarehouseBackend for MemoryBackend {
    async fn fetch_work_items(
        &self,
        kind: ListKind,
        list_id: &str,
    ) -> Result<Vec<PickLine>, BackendError> {
        self.inner.lock().await.list(kind, list_id).cloned()
    }

    async fn fetch_step_order(&self, _config_id: &str) -> Result<Option<StepOrder>, BackendError> {
        Ok(self.inner.lock().await.step_order.clone())
    }

    async fn submit_confirmation(&self, record: &ConfirmationRecord) -> Result<Ack, BackendError> {
        let mut inner = self.inner.lock().await;
        if inner.reject_confirmations {
            return Ok(Ack::rejected(format!(
                "Failed to update {}",
                record.kind.noun().to_lowercase()
            )));
        }
        let lines = inner
            .lists
            .get_mut(&(record.kind, record.list_id.clone()))
            .ok_or_else(|| BackendError::UnknownList(record.list_id.clone()))?;
        let c = &record.confirmation;
        let Some(line) = lines.iter_mut().find(|line| line.item.idx == c.idx) else {
            return Ok(Ack::rejected(format!("Item not found in {}", record.list_id)));
        };
        line.confirmed_qty = c.confirmed_qty;
        if c.container.is_some() {
            line.item.assigned_container = c.container.clone();
        }
        inner.confirmations.push(record.clone());
        Ok(Ack::ok(match record.kind {
            ListKind::Pick => "Pick updated successfully",
            ListKind::Pack => "Packing updated successfully",
        }))
    }

    async fn acquire_lock(
        &self,
        kind: ListKind,
        key: &str,
        session_id: &str,
    ) -> Result<LockStatus, BackendError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let lock_key = (kind, key.to_string());
        if let Some(entry) = inner.locks.get(&lock_key)
            && entry.session_id != session_id
            && now - entry.acquired_at < self.lock_timeout
        {
            return Ok(LockStatus::held_by(entry.session_id.clone()));
        }
        inner.locks.insert(
            lock_key,
            LockEntry {
                session_id: session_id.to_string(),
                acquired_at: now,
            },
        );
        debug!(%kind, key, session_id, "lock granted");
        Ok(LockStatus::granted())
    }

    async fn release_lock(
        &self,
        kind: ListKind,
        key: &str,
        session_id: &str,
    ) -> Result<Ack, BackendError> {
        let mut inner = self.inner.lock().await;
        let lock_key = (kind, key.to_string());
        match inner.locks.get(&lock_key) {
            Some(entry) if entry.session_id == session_id => {
                inner.locks.remove(&lock_key);
                Ok(Ack::ok(format!("{kind} unlocked")))
            }
            _ => Ok(Ack::rejected("Not locked by you")),
        }
    }

    async fn finalize_list(&self, list_id: &str) -> Result<Finalized, BackendError> {
        let mut inner = self.inner.lock().await;
        let mut groups: BTreeMap<Option<String>, Vec<PickLine>> = BTreeMap::new();
        for line in inner.list(ListKind::Pick, list_id)? {
            if line.confirmed_qty == 0 {
                continue;
            }
            let group = groups.entry(line.item.group.clone()).or_default();
            let mut item = line.item.clone();
            item.idx = group.len() as u32 + 1;
            item.required_qty = line.confirmed_qty;
            group.push(PickLine::new(item));
        }

        let mut created_documents = Vec::with_capacity(groups.len());
        for (_, lines) in groups {
            inner.documents_issued += 1;
            let note = format!("DN-{:05}", inner.documents_issued);
            inner.lists.insert((ListKind::Pack, note.clone()), lines);
            created_documents.push(note);
        }
        Ok(Finalized { created_documents })
    }

    async fn create_shipment(&self, request: &ShipmentRequest) -> Result<Finalized, BackendError> {
        let mut inner = self.inner.lock().await;
        let unpacked = inner
            .list(ListKind::Pack, &request.delivery_note)?
            .iter()
            .any(|line| !line.is_completed());
        if unpacked {
            return Ok(Finalized::default());
        }
        inner.shipments_issued += 1;
        let shipment = format!("SHIP-{:05}", inner.shipments_issued);
        inner.shipments.push(request.clone());
        Ok(Finalized {
            created_documents: vec![shipment],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ShipmentDetails;
    use crate::scan::{Confirmation, WorkItem};
    use crate::workflow::ItemWorkflow;

    fn lines() -> Vec<PickLine> {
        vec![
            PickLine::new(WorkItem::new("SKU-1", 2).with_idx(1).with_group("SO-1")),
            PickLine::new(WorkItem::new("SKU-2", 1).with_idx(2).with_group("SO-2")),
        ]
    }

    fn record(kind: ListKind, list: &str, idx: u32, qty: u32) -> ConfirmationRecord {
        ConfirmationRecord::new(
            kind,
            list,
            Confirmation {
                idx,
                item_code: "SKU".into(),
                confirmed_qty: qty,
                container: Some("BOX-001".into()),
                location: "A1".into(),
                batch: None,
            },
        )
    }

    fn picked(idx: u32, qty: u32) -> ConfirmationRecord {
        record(ListKind::Pick, "PL-1", idx, qty)
    }

    #[tokio::test]
    async fn second_session_is_denied_until_release() {
        let backend = MemoryBackend::new();
        let pick = ListKind::Pick;
        assert!(backend.acquire_lock(pick, "PL-1", "s1").await.unwrap().granted);
        // Same session may re-acquire.
        assert!(backend.acquire_lock(pick, "PL-1", "s1").await.unwrap().granted);

        let denied = backend.acquire_lock(pick, "PL-1", "s2").await.unwrap();
        assert_eq!(denied, LockStatus::held_by("s1"));

        assert!(!backend.release_lock(pick, "PL-1", "s2").await.unwrap().success);
        assert!(backend.release_lock(pick, "PL-1", "s1").await.unwrap().success);
        assert!(backend.acquire_lock(pick, "PL-1", "s2").await.unwrap().granted);
    }

    #[tokio::test]
    async fn locks_are_scoped_by_kind() {
        let backend = MemoryBackend::new();
        assert!(backend.acquire_lock(ListKind::Pick, "X-1", "s1").await.unwrap().granted);
        assert!(backend.acquire_lock(ListKind::Pack, "X-1", "s2").await.unwrap().granted);
        assert_eq!(backend.lock_holder(ListKind::Pack, "X-1").await.as_deref(), Some("s2"));
    }

    #[tokio::test]
    async fn stale_lock_is_taken_over() {
        let backend = MemoryBackend::new();
        backend
            .hold_lock(ListKind::Pick, "PL-1", "s1", Utc::now() - TimeDelta::minutes(31))
            .await;
        assert!(backend.acquire_lock(ListKind::Pick, "PL-1", "s2").await.unwrap().granted);
        assert_eq!(backend.lock_holder(ListKind::Pick, "PL-1").await.as_deref(), Some("s2"));
    }

    #[tokio::test]
    async fn confirmation_updates_line() {
        let backend = MemoryBackend::new();
        backend.insert_list("PL-1", lines()).await;
        let ack = backend.submit_confirmation(&picked(1, 2)).await.unwrap();
        assert!(ack.success);

        let stored = backend.lines(ListKind::Pick, "PL-1").await.unwrap();
        assert_eq!(stored[0].confirmed_qty, 2);
        assert_eq!(stored[0].item.assigned_container.as_deref(), Some("BOX-001"));
        assert_eq!(backend.confirmations().await.len(), 1);
    }

    #[tokio::test]
    async fn unknown_row_is_rejected() {
        let backend = MemoryBackend::new();
        backend.insert_list("PL-1", lines()).await;
        let ack = backend.submit_confirmation(&picked(9, 1)).await.unwrap();
        assert!(!ack.success);
        assert!(backend.confirmations().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_list_is_an_error() {
        let backend = MemoryBackend::new();
        let err = backend.fetch_work_items(ListKind::Pick, "nope").await.unwrap_err();
        assert!(matches!(err, BackendError::UnknownList(id) if id == "nope"));
    }

    #[tokio::test]
    async fn finalize_creates_one_delivery_note_per_group() {
        let backend = MemoryBackend::new();
        backend.insert_list("PL-1", lines()).await;
        backend.submit_confirmation(&picked(1, 2)).await.unwrap();
        backend.submit_confirmation(&picked(2, 1)).await.unwrap();

        let finalized = backend.finalize_list("PL-1").await.unwrap();
        assert_eq!(finalized.created_documents, vec!["DN-00001", "DN-00002"]);

        let note = backend
            .fetch_work_items(ListKind::Pack, "DN-00001")
            .await
            .unwrap();
        assert_eq!(note.len(), 1);
        assert_eq!(note[0].item.item_code, "SKU-1");
        assert_eq!(note[0].item.required_qty, 2);
        assert_eq!(note[0].item.assigned_container.as_deref(), Some("BOX-001"));
        assert_eq!(note[0].confirmed_qty, 0);
    }

    #[tokio::test]
    async fn packing_progress_is_stored_per_delivery_note() {
        let backend = MemoryBackend::new();
        backend.insert_delivery_note("DN-1", lines()).await;
        let ack = backend
            .submit_confirmation(&record(ListKind::Pack, "DN-1", 2, 1))
            .await
            .unwrap();
        assert_eq!(ack, Ack::ok("Packing updated successfully"));

        let err = backend
            .submit_confirmation(&record(ListKind::Pick, "DN-1", 2, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::UnknownList(_)));
    }

    #[tokio::test]
    async fn shipment_requires_every_line_packed() {
        let backend = MemoryBackend::new();
        backend.insert_delivery_note("DN-1", lines()).await;
        let request = |packages| ShipmentRequest::new("DN-1", packages, &ShipmentDetails::default());

        let early = backend.create_shipment(&request(vec![])).await.unwrap();
        assert!(early.created_documents.is_empty());

        backend
            .submit_confirmation(&record(ListKind::Pack, "DN-1", 1, 2))
            .await
            .unwrap();
        backend
            .submit_confirmation(&record(ListKind::Pack, "DN-1", 2, 1))
            .await
            .unwrap();
        let packed = backend.lines(ListKind::Pack, "DN-1").await.unwrap();
        let packages = ItemWorkflow::packing(packed).unwrap().packages();

        let shipped = backend.create_shipment(&request(packages)).await.unwrap();
        assert_eq!(shipped.created_documents, vec!["SHIP-00001"]);
        let stored = backend.shipments().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].packages[0].package_no, "BOX-001");
        assert_eq!(stored[0].packages[0].items_count, 2);
    }
}
