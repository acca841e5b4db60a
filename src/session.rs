//! One operator working one pick list or delivery note.
//!
//! A session holds the advisory lock from [`ListSession::open`] until
//! [`ListSession::close`]. Picking finishes by creating delivery notes;
//! packing finishes by creating a shipment.

use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::{
    ConfirmationRecord, Finalized, ShipmentDetails, ShipmentRequest, WarehouseBackend,
};
use crate::error::PickscanError;
use crate::scan::{ScanOutcome, ScanRules, ScanSequencer, StepOrder};
use crate::workflow::{Advance, ContainerPlan, ItemWorkflow, ListKind};

/// Knobs a session is opened with.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub kind: ListKind,
    /// Settings document to read the pick step order from.
    pub config_id: String,
    /// Order used when the server has none.
    pub fallback_order: StepOrder,
    pub rules: ScanRules,
    pub container_prefix: String,
    /// Carrier details for the shipment a finished pack creates.
    pub shipment: ShipmentDetails,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            kind: ListKind::Pick,
            config_id: "WMS Settings".to_string(),
            fallback_order: StepOrder::pick(),
            rules: ScanRules::default(),
            container_prefix: "BOX".to_string(),
            shipment: ShipmentDetails::default(),
        }
    }
}

impl SessionSettings {
    /// The same settings, for packing a delivery note.
    pub fn packing(self, shipment: ShipmentDetails) -> Self {
        Self {
            kind: ListKind::Pack,
            shipment,
            ..self
        }
    }
}

/// What a successful confirm led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Scanning moved on to the line at this index.
    Next(usize),
    /// Every line is done; the list was handed off and the lock released.
    Finished(Finalized),
}

/// Result of [`ListSession::open`].
pub enum Opened<'a, B: WarehouseBackend> {
    Ready(ListSession<'a, B>),
    /// Every line was already done on arrival. The list was handed off and
    /// the lock released without scanning anything.
    Finished(Finalized),
}

pub struct ListSession<'a, B: WarehouseBackend> {
    backend: &'a B,
    kind: ListKind,
    list_id: String,
    session_id: String,
    shipment: ShipmentDetails,
    workflow: ItemWorkflow,
    released: bool,
}

impl<'a, B: WarehouseBackend> ListSession<'a, B> {
    /// Locks the list, then loads it.
    ///
    /// Fails with [`PickscanError::LockDenied`] when another session holds
    /// the list; nothing is loaded in that case. Callers must call
    /// [`close`](Self::close) on every exit path of a ready session; the
    /// lock is not released on drop.
    pub async fn open(
        backend: &'a B,
        list_id: &str,
        settings: &SessionSettings,
    ) -> Result<Opened<'a, B>, PickscanError> {
        let kind = settings.kind;
        let session_id = Uuid::new_v4().to_string();
        let lock = backend.acquire_lock(kind, list_id, &session_id).await?;
        if !lock.granted {
            warn!(%kind, list_id, holder = ?lock.holder, "list is locked");
            return Err(PickscanError::LockDenied {
                kind,
                list: list_id.to_string(),
                holder: lock.holder,
            });
        }

        let workflow = match Self::load(backend, list_id, settings).await {
            Ok(workflow) => workflow,
            Err(e) => {
                release(backend, kind, list_id, &session_id).await;
                return Err(e);
            }
        };
        info!(
            %kind,
            list_id,
            session_id = %session_id,
            lines = workflow.total(),
            completed = workflow.completed_count(),
            "session opened"
        );

        let mut session = Self {
            backend,
            kind,
            list_id: list_id.to_string(),
            session_id,
            shipment: settings.shipment.clone(),
            workflow,
            released: false,
        };
        if session.workflow.is_all_complete() {
            info!(%kind, list_id, "nothing left to scan");
            return session.finish().await.map(Opened::Finished);
        }
        Ok(Opened::Ready(session))
    }

    async fn load(
        backend: &B,
        list_id: &str,
        settings: &SessionSettings,
    ) -> Result<ItemWorkflow, PickscanError> {
        let lines = backend.fetch_work_items(settings.kind, list_id).await?;
        let workflow = match settings.kind {
            ListKind::Pick => {
                let order = backend
                    .fetch_step_order(&settings.config_id)
                    .await?
                    .unwrap_or_else(|| settings.fallback_order.clone());
                let containers = ContainerPlan::for_lines(&lines, &settings.container_prefix);
                ItemWorkflow::new(lines, order, settings.rules, containers)?
            }
            ListKind::Pack => ItemWorkflow::packing(lines)?,
        };
        Ok(workflow)
    }

    pub fn kind(&self) -> ListKind {
        self.kind
    }

    pub fn list_id(&self) -> &str {
        &self.list_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn workflow(&self) -> &ItemWorkflow {
        &self.workflow
    }

    pub fn sequencer(&self) -> &ScanSequencer {
        self.workflow.sequencer()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn select_item(&mut self, index: usize) -> Result<&ScanSequencer, PickscanError> {
        Ok(self.workflow.select_item(index)?)
    }

    pub fn scan(&mut self, raw: &str) -> ScanOutcome {
        self.workflow.sequencer_mut().submit_scan(raw)
    }

    pub fn increment(&mut self) -> ScanOutcome {
        self.workflow.sequencer_mut().increment()
    }

    pub fn decrement(&mut self) -> ScanOutcome {
        self.workflow.sequencer_mut().decrement()
    }

    /// Sends the current line to the server and moves on.
    ///
    /// A rejected confirmation leaves the sequencer exactly as it was so the
    /// operator can retry.
    pub async fn confirm(&mut self) -> Result<ConfirmOutcome, PickscanError> {
        let confirmation = self.workflow.sequencer().confirm()?;
        let record = ConfirmationRecord::new(self.kind, &self.list_id, confirmation);
        let ack = self.backend.submit_confirmation(&record).await?;
        if !ack.success {
            warn!(
                list_id = %self.list_id,
                item = %record.confirmation.item_code,
                message = %ack.message,
                "confirmation rejected"
            );
            return Err(PickscanError::ConfirmationRejected(ack.message));
        }

        let confirmation = record.confirmation;
        self.workflow
            .record_confirmation(confirmation.confirmed_qty, confirmation.container);

        match self.workflow.advance_after_confirm()? {
            Advance::Next(index) => Ok(ConfirmOutcome::Next(index)),
            Advance::AllComplete => self.finish().await.map(ConfirmOutcome::Finished),
        }
    }

    // Hands the list off and releases the lock, whatever the hand-off did.
    async fn finish(&mut self) -> Result<Finalized, PickscanError> {
        let finalized = match self.kind {
            ListKind::Pick => self.backend.finalize_list(&self.list_id).await,
            ListKind::Pack => {
                let request =
                    ShipmentRequest::new(&self.list_id, self.workflow.packages(), &self.shipment);
                self.backend.create_shipment(&request).await
            }
        };
        self.close().await;
        let finalized = finalized?;
        info!(
            kind = %self.kind,
            list_id = %self.list_id,
            documents = ?finalized.created_documents,
            "list handed off"
        );
        Ok(finalized)
    }

    /// Releases the lock. Failures are logged, never returned.
    pub async fn close(&mut self) {
        if self.released {
            return;
        }
        release(self.backend, self.kind, &self.list_id, &self.session_id).await;
        self.released = true;
    }
}

async fn release<B: WarehouseBackend>(backend: &B, kind: ListKind, list_id: &str, session_id: &str) {
    match backend.release_lock(kind, list_id, session_id).await {
        Ok(ack) if ack.success => info!(%kind, list_id, "lock released"),
        Ok(ack) => warn!(%kind, list_id, message = %ack.message, "lock release refused"),
        Err(e) => warn!(%kind, list_id, error = %e, "lock release failed"),
    }
}
