//! Payloads exchanged with the warehouse server.
//!
//! The `Remote*` structs mirror the JSON the server's `wms.api` methods
//! return; the rest are the typed replies handed to the session layer.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::StepOrderError;
use crate::scan::{Confirmation, PickLine, StepOrder, WorkItem};
use crate::workflow::{ListKind, Package};

/// Envelope around every whitelisted method reply.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub message: T,
}

/// Reply of `get_pick_list_details`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemotePickList {
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub items: Vec<RemoteLine>,
}

/// A pick list row as the server reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteLine {
    pub idx: u32,
    pub item_code: String,
    #[serde(default)]
    pub qty: f64,
    #[serde(default)]
    pub picked_qty: f64,
    #[serde(default)]
    pub warehouse: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub batch_no: String,
    #[serde(default, deserialize_with = "flag")]
    pub has_batch_no: bool,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub order_ref: Option<String>,
    #[serde(default)]
    pub wms_box: Option<String>,
}

impl From<RemoteLine> for PickLine {
    fn from(line: RemoteLine) -> Self {
        let location = if line.location.is_empty() {
            line.warehouse
        } else {
            line.location
        };
        let item = WorkItem {
            idx: line.idx,
            expected_barcode: line
                .barcode
                .filter(|b| !b.is_empty() && *b != line.item_code),
            item_code: line.item_code,
            required_qty: whole_units(line.qty),
            has_batch_tracking: line.has_batch_no,
            target_location_hint: location,
            batch_hint: non_empty(line.batch_no),
            group: line.order_ref.and_then(non_empty),
            assigned_container: line.wms_box.and_then(non_empty),
        };
        PickLine {
            item,
            confirmed_qty: whole_units(line.picked_qty),
        }
    }
}

/// Reply of `get_delivery_note_details`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteDeliveryNote {
    pub name: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub items: Vec<RemotePackLine>,
}

/// A delivery note row with its packing progress.
#[derive(Debug, Clone, Deserialize)]
pub struct RemotePackLine {
    pub idx: u32,
    pub item_code: String,
    #[serde(default)]
    pub qty: f64,
    #[serde(default)]
    pub wms_packed_qty: f64,
    #[serde(default)]
    pub wms_box: Option<String>,
    #[serde(default)]
    pub wms_package_no: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
}

impl From<RemotePackLine> for PickLine {
    fn from(line: RemotePackLine) -> Self {
        let mut item = WorkItem::new(line.item_code, whole_units(line.qty)).with_idx(line.idx);
        item.expected_barcode = line
            .barcode
            .filter(|b| !b.is_empty() && *b != item.item_code);
        // A package chosen while packing wins over the box used for picking.
        item.assigned_container = line
            .wms_package_no
            .and_then(non_empty)
            .or_else(|| line.wms_box.and_then(non_empty));
        PickLine {
            item,
            confirmed_qty: whole_units(line.wms_packed_qty),
        }
    }
}

/// Reply of `get_wms_settings`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteSettings {
    #[serde(default)]
    pub scan_steps: Vec<RemoteScanStep>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteScanStep {
    #[serde(default)]
    pub sequence: u32,
    pub step_type: String,
}

impl RemoteSettings {
    /// The configured order sorted by `sequence`, or `None` when the server
    /// has no custom steps.
    pub fn step_order(mut self) -> Result<Option<StepOrder>, StepOrderError> {
        if self.scan_steps.is_empty() {
            return Ok(None);
        }
        self.scan_steps.sort_by_key(|s| s.sequence);
        StepOrder::parse(self.scan_steps.iter().map(|s| s.step_type.as_str())).map(Some)
    }
}

/// Reply of `lock_pick_list` and `lock_delivery_note`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteLockReply {
    pub success: bool,
    #[serde(default)]
    pub locked_by: Option<String>,
}

/// Reply of the progress and unlock methods.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteAck {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

/// Reply of `create_delivery_notes_from_pick_list`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteDeliveryNotes {
    pub success: bool,
    #[serde(default)]
    pub delivery_notes: Vec<String>,
}

/// Reply of `create_shipment`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteShipment {
    pub success: bool,
    #[serde(default)]
    pub shipment: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// Outcome of an advisory lock request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockStatus {
    pub granted: bool,
    pub holder: Option<String>,
}

impl LockStatus {
    pub fn granted() -> Self {
        Self {
            granted: true,
            holder: None,
        }
    }

    pub fn held_by(holder: impl Into<String>) -> Self {
        Self {
            granted: false,
            holder: Some(holder.into()),
        }
    }
}

impl From<RemoteLockReply> for LockStatus {
    fn from(reply: RemoteLockReply) -> Self {
        Self {
            granted: reply.success,
            holder: if reply.success { None } else { reply.locked_by },
        }
    }
}

/// A confirmed line, addressed to its pick list or delivery note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationRecord {
    pub kind: ListKind,
    pub list_id: String,
    #[serde(flatten)]
    pub confirmation: Confirmation,
    pub confirmed_at: DateTime<Utc>,
}

impl ConfirmationRecord {
    pub fn new(kind: ListKind, list_id: impl Into<String>, confirmation: Confirmation) -> Self {
        Self {
            kind,
            list_id: list_id.into(),
            confirmation,
            confirmed_at: Utc::now(),
        }
    }
}

/// Server answer to a confirmation or unlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub success: bool,
    pub message: String,
}

impl Ack {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl From<RemoteAck> for Ack {
    fn from(reply: RemoteAck) -> Self {
        Self {
            success: reply.success,
            message: reply.message,
        }
    }
}

/// Documents created when a finished list is handed off.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Finalized {
    pub created_documents: Vec<String>,
}

impl From<RemoteDeliveryNotes> for Finalized {
    fn from(reply: RemoteDeliveryNotes) -> Self {
        Self {
            created_documents: if reply.success {
                reply.delivery_notes
            } else {
                Vec::new()
            },
        }
    }
}

impl From<RemoteShipment> for Finalized {
    fn from(reply: RemoteShipment) -> Self {
        Self {
            created_documents: reply
                .shipment
                .filter(|_| reply.success)
                .into_iter()
                .collect(),
        }
    }
}

/// Carrier details entered when a packed delivery note ships.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentDetails {
    pub carrier: Option<String>,
    pub tracking_no: Option<String>,
    /// Defaults to today when the request is built.
    pub shipment_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Everything `create_shipment` needs for one delivery note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentRequest {
    pub delivery_note: String,
    pub packages: Vec<Package>,
    pub carrier: Option<String>,
    pub tracking_no: Option<String>,
    pub shipment_date: NaiveDate,
    pub notes: Option<String>,
}

impl ShipmentRequest {
    pub fn new(
        delivery_note: impl Into<String>,
        packages: Vec<Package>,
        details: &ShipmentDetails,
    ) -> Self {
        Self {
            delivery_note: delivery_note.into(),
            packages,
            carrier: details.carrier.clone(),
            tracking_no: details.tracking_no.clone(),
            shipment_date: details
                .shipment_date
                .unwrap_or_else(|| Utc::now().date_naive()),
            notes: details.notes.clone(),
        }
    }
}

fn whole_units(qty: f64) -> u32 {
    if qty.is_finite() && qty > 0.0 {
        qty.round().min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

// The server sends check fields as 0/1; accept booleans too.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Null(()),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(n) => n != 0,
        Flag::Null(()) => false,
    })
}
