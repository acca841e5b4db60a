use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::error::BackendError;
use super::types::{
    Ack, ConfirmationRecord, Envelope, Finalized, LockStatus, RemoteAck, RemoteDeliveryNote,
    RemoteDeliveryNotes, RemoteLockReply, RemotePickList, RemoteSettings, RemoteShipment,
    ShipmentRequest,
};
use super::WarehouseBackend;
use crate::scan::{PickLine, StepOrder};
use crate::workflow::{DEFAULT_PACKAGE, ListKind};

const METHOD_PREFIX: &str = "api/method/wms.api";

/// Talks to the warehouse server's whitelisted `wms.api` methods.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    auth: Option<String>,
}

impl HttpBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: &str,
        api_secret: &str,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        let auth = if api_key.is_empty() {
            None
        } else {
            Some(format!("token {api_key}:{api_secret}"))
        };
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, args: Value) -> Result<T, BackendError> {
        let url = format!("{}/{METHOD_PREFIX}.{method}", self.base_url);
        debug!(%url, "calling server method");

        let mut request = self.client.post(&url).json(&args);
        if let Some(auth) = &self.auth {
            request = request.header("Authorization", auth);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(BackendError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let envelope: Envelope<T> =
            serde_json::from_str(&body).map_err(|e| BackendError::Malformed {
                method: method.to_string(),
                reason: e.to_string(),
            })?;
        Ok(envelope.message)
    }
}

// Argument name the server expects for a list id.
fn list_arg(kind: ListKind) -> &'static str {
    match kind {
        ListKind::Pick => "pick_list",
        ListKind::Pack => "delivery_note",
    }
}

#[async_trait]
impl WarehouseBackend for HttpBackend {
    async fn fetch_work_items(
        &self,
        kind: ListKind,
        list_id: &str,
    ) -> Result<Vec<PickLine>, BackendError> {
        let args = json!({ list_arg(kind): list_id });
        let lines = match kind {
            ListKind::Pick => {
                let list: RemotePickList = self.call("get_pick_list_details", args).await?;
                list.items.into_iter().map(PickLine::from).collect()
            }
            ListKind::Pack => {
                let note: RemoteDeliveryNote =
                    self.call("get_delivery_note_details", args).await?;
                note.items.into_iter().map(PickLine::from).collect()
            }
        };
        Ok(lines)
    }

    async fn fetch_step_order(&self, config_id: &str) -> Result<Option<StepOrder>, BackendError> {
        let settings: RemoteSettings = self
            .call("get_wms_settings", json!({ "name": config_id }))
            .await?;
        settings
            .step_order()
            .map_err(|e| BackendError::Malformed {
                method: "get_wms_settings".to_string(),
                reason: e.to_string(),
            })
    }

    async fn submit_confirmation(&self, record: &ConfirmationRecord) -> Result<Ack, BackendError> {
        let c = &record.confirmation;
        let (method, args) = match record.kind {
            ListKind::Pick => (
                "update_pick_progress",
                json!({
                    "pick_list": record.list_id,
                    "item_idx": c.idx,
                    "picked_qty": c.confirmed_qty,
                    "location": c.location,
                    "batch_no": c.batch.clone().unwrap_or_default(),
                    "box": c.container,
                }),
            ),
            ListKind::Pack => (
                "update_packing_progress",
                json!({
                    "delivery_note": record.list_id,
                    "item_idx": c.idx,
                    "packed_qty": c.confirmed_qty,
                    "package_no": c.container.as_deref().unwrap_or(DEFAULT_PACKAGE),
                }),
            ),
        };
        let reply: RemoteAck = self.call(method, args).await?;
        Ok(reply.into())
    }

    async fn acquire_lock(
        &self,
        kind: ListKind,
        key: &str,
        session_id: &str,
    ) -> Result<LockStatus, BackendError> {
        let method = match kind {
            ListKind::Pick => "lock_pick_list",
            ListKind::Pack => "lock_delivery_note",
        };
        let reply: RemoteLockReply = self
            .call(method, json!({ list_arg(kind): key, "session_id": session_id }))
            .await?;
        Ok(reply.into())
    }

    async fn release_lock(
        &self,
        kind: ListKind,
        key: &str,
        session_id: &str,
    ) -> Result<Ack, BackendError> {
        let method = match kind {
            ListKind::Pick => "unlock_pick_list",
            ListKind::Pack => "unlock_delivery_note",
        };
        let reply: RemoteAck = self
            .call(method, json!({ list_arg(kind): key, "session_id": session_id }))
            .await?;
        Ok(reply.into())
    }

    async fn finalize_list(&self, list_id: &str) -> Result<Finalized, BackendError> {
        let reply: RemoteDeliveryNotes = self
            .call(
                "create_delivery_notes_from_pick_list",
                json!({ "pick_list": list_id }),
            )
            .await?;
        Ok(reply.into())
    }

    async fn create_shipment(&self, request: &ShipmentRequest) -> Result<Finalized, BackendError> {
        let args = serde_json::to_value(request).map_err(|e| BackendError::Malformed {
            method: "create_shipment".to_string(),
            reason: e.to_string(),
        })?;
        let reply: RemoteShipment = self.call("create_shipment", args).await?;
        if !reply.success {
            warn!(
                delivery_note = %request.delivery_note,
                message = %reply.message,
                "shipment not created"
            );
        }
        Ok(reply.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ShipmentDetails;
    use crate::scan::{Confirmation, StepKind};
    use crate::workflow::{Package, PackedItem};
    use chrono::NaiveDate;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn backend(server: &MockServer) -> HttpBackend {
        HttpBackend::new(server.uri(), "key", "secret").unwrap()
    }

    #[tokio::test]
    async fn fetches_pick_list_lines() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/method/wms.api.get_pick_list_details"))
            .and(header("Authorization", "token key:secret"))
            .and(body_partial_json(json!({ "pick_list": "PL-0001" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {
                    "name": "PL-0001",
                    "items": [
                        {"idx": 1, "item_code": "SKU-1", "qty": 2, "picked_qty": 0,
                         "warehouse": "Stores", "has_batch_no": 1}
                    ]
                }
            })))
            .mount(&server)
            .await;

        let lines = backend(&server)
            .await
            .fetch_work_items(ListKind::Pick, "PL-0001")
            .await
            .unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].item.item_code, "SKU-1");
        assert_eq!(lines[0].item.required_qty, 2);
        assert!(lines[0].item.has_batch_tracking);
    }

    #[tokio::test]
    async fn fetches_step_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/method/wms.api.get_wms_settings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"scan_steps": [
                    {"sequence": 2, "step_type": "Item"},
                    {"sequence": 1, "step_type": "Location"}
                ]}
            })))
            .mount(&server)
            .await;

        let order = backend(&server)
            .await
            .fetch_step_order("WMS Settings")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.kinds(), &[StepKind::Location, StepKind::Item]);
    }

    #[tokio::test]
    async fn invalid_step_type_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/method/wms.api.get_wms_settings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"scan_steps": [{"sequence": 1, "step_type": "Pallet"}]}
            })))
            .mount(&server)
            .await;

        let err = backend(&server)
            .await
            .fetch_step_order("WMS Settings")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Malformed { .. }));
    }

    #[tokio::test]
    async fn lock_denied_reports_holder() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/method/wms.api.lock_pick_list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"success": false, "locked": true, "locked_by": "Ana Souza"}
            })))
            .mount(&server)
            .await;

        let status = backend(&server)
            .await
            .acquire_lock(ListKind::Pick, "PL-0001", "session-1")
            .await
            .unwrap();
        assert!(!status.granted);
        assert_eq!(status.holder.as_deref(), Some("Ana Souza"));
    }

    #[tokio::test]
    async fn confirmation_sends_progress_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/method/wms.api.update_pick_progress"))
            .and(body_partial_json(json!({
                "pick_list": "PL-0001",
                "item_idx": 3,
                "picked_qty": 2,
                "location": "A1",
                "batch_no": "",
                "box": "BOX-001"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"success": true, "message": "Pick updated successfully"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let record = ConfirmationRecord::new(
            ListKind::Pick,
            "PL-0001",
            Confirmation {
                idx: 3,
                item_code: "SKU-1".into(),
                confirmed_qty: 2,
                container: Some("BOX-001".into()),
                location: "A1".into(),
                batch: None,
            },
        );
        let ack = backend(&server).await.submit_confirmation(&record).await.unwrap();
        assert!(ack.success);
    }

    #[tokio::test]
    async fn http_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Not permitted"))
            .mount(&server)
            .await;

        let err = backend(&server).await.finalize_list("PL-0001").await.unwrap_err();
        match err {
            BackendError::Server { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "Not permitted");
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_envelope_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;

        let err = backend(&server)
            .await
            .fetch_work_items(ListKind::Pick, "PL-0001")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Malformed { .. }));
    }

    #[tokio::test]
    async fn finalize_returns_created_documents() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/method/wms.api.create_delivery_notes_from_pick_list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"success": true, "count": 2,
                            "delivery_notes": ["DN-0001", "DN-0002"]}
            })))
            .mount(&server)
            .await;

        let finalized = backend(&server).await.finalize_list("PL-0001").await.unwrap();
        assert_eq!(finalized.created_documents, vec!["DN-0001", "DN-0002"]);
    }

    #[tokio::test]
    async fn fetches_delivery_note_lines() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/method/wms.api.get_delivery_note_details"))
            .and(body_partial_json(json!({ "delivery_note": "DN-0001" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {
                    "name": "DN-0001",
                    "items": [
                        {"idx": 1, "item_code": "SKU-1", "qty": 3, "wms_packed_qty": 1,
                         "wms_box": "BOX-002"}
                    ]
                }
            })))
            .mount(&server)
            .await;

        let lines = backend(&server)
            .await
            .fetch_work_items(ListKind::Pack, "DN-0001")
            .await
            .unwrap();
        assert_eq!(lines[0].confirmed_qty, 1);
        assert_eq!(lines[0].item.assigned_container.as_deref(), Some("BOX-002"));
    }

    #[tokio::test]
    async fn delivery_note_lock_and_unlock() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/method/wms.api.lock_delivery_note"))
            .and(body_partial_json(json!({
                "delivery_note": "DN-0001",
                "session_id": "session-1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"success": true}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/method/wms.api.unlock_delivery_note"))
            .and(body_partial_json(json!({ "delivery_note": "DN-0001" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"success": true, "message": "Delivery note unlocked"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = backend(&server).await;
        let status = backend
            .acquire_lock(ListKind::Pack, "DN-0001", "session-1")
            .await
            .unwrap();
        assert!(status.granted);
        let ack = backend
            .release_lock(ListKind::Pack, "DN-0001", "session-1")
            .await
            .unwrap();
        assert!(ack.success);
    }

    #[tokio::test]
    async fn packing_progress_defaults_package() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/method/wms.api.update_packing_progress"))
            .and(body_partial_json(json!({
                "delivery_note": "DN-0001",
                "item_idx": 2,
                "packed_qty": 4,
                "package_no": "PKG-001"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"success": true}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let record = ConfirmationRecord::new(
            ListKind::Pack,
            "DN-0001",
            Confirmation {
                idx: 2,
                item_code: "SKU-2".into(),
                confirmed_qty: 4,
                container: None,
                location: String::new(),
                batch: None,
            },
        );
        let ack = backend(&server).await.submit_confirmation(&record).await.unwrap();
        assert!(ack.success);
    }

    #[tokio::test]
    async fn shipment_sends_packages_and_carrier() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/method/wms.api.create_shipment"))
            .and(body_partial_json(json!({
                "delivery_note": "DN-0001",
                "carrier": "Correios",
                "tracking_no": "BR123",
                "shipment_date": "2026-10-16",
                "packages": [{"package_no": "BOX-001", "items_count": 1}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"success": true, "shipment": "SHIP-0001"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let details = ShipmentDetails {
            carrier: Some("Correios".into()),
            tracking_no: Some("BR123".into()),
            shipment_date: NaiveDate::from_ymd_opt(2026, 10, 16),
            notes: None,
        };
        let packages = vec![Package {
            package_no: "BOX-001".into(),
            items: vec![PackedItem {
                idx: 1,
                item_code: "SKU-1".into(),
                qty: 2,
            }],
            items_count: 1,
        }];
        let request = ShipmentRequest::new("DN-0001", packages, &details);
        let finalized = backend(&server).await.create_shipment(&request).await.unwrap();
        assert_eq!(finalized.created_documents, vec!["SHIP-0001"]);
    }
}
