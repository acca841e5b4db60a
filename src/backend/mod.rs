pub mod error;
pub mod http;
pub mod memory;
pub mod types;

use async_trait::async_trait;

pub use error::BackendError;
pub use http::HttpBackend;
pub use memory::MemoryBackend;
pub use types::{
    Ack, ConfirmationRecord, Finalized, LockStatus, ShipmentDetails, ShipmentRequest,
};

use crate::scan::{PickLine, StepOrder};
use crate::workflow::ListKind;

/// Server-side collaborators of a pick or pack session.
///
/// Everything that persists, locks or creates documents lives behind this
/// trait; the scan flow itself never does I/O. Locks are scoped by
/// [`ListKind`], so a pick list and a delivery note never contend.
#[async_trait]
pub trait WarehouseBackend: Send + Sync {
    async fn fetch_work_items(
        &self,
        kind: ListKind,
        list_id: &str,
    ) -> Result<Vec<PickLine>, BackendError>;

    /// Operator-configured pick step order, or `None` if none is configured.
    async fn fetch_step_order(&self, config_id: &str) -> Result<Option<StepOrder>, BackendError>;

    /// Stores picked or packed progress, depending on `record.kind`.
    async fn submit_confirmation(&self, record: &ConfirmationRecord) -> Result<Ack, BackendError>;

    async fn acquire_lock(
        &self,
        kind: ListKind,
        key: &str,
        session_id: &str,
    ) -> Result<LockStatus, BackendError>;

    async fn release_lock(
        &self,
        kind: ListKind,
        key: &str,
        session_id: &str,
    ) -> Result<Ack, BackendError>;

    /// Hands a fully picked list off as delivery notes.
    async fn finalize_list(&self, list_id: &str) -> Result<Finalized, BackendError>;

    /// Ships a fully packed delivery note.
    async fn create_shipment(&self, request: &ShipmentRequest) -> Result<Finalized, BackendError>;
}
