//! Persistence seam. Rows go to PostgREST tables and PDFs to the storage
//! object API of the hosted backend; an in-memory store stands in when no
//! backend is configured.
//!
//! All calls block. Async callers run them through `spawn_blocking`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::registration::{ContactRole, RegistrationRecord, RsvpRecord};

pub const REGISTRATIONS_TABLE: &str = "acp_registrations";
pub const CONTACTS_TABLE: &str = "acp_contacts";
pub const RSVPS_TABLE: &str = "event_rsvps";
pub const REGISTRATIONS_VIEW: &str = "acp_registrations_with_contacts";
const CACHE_CONTROL_SECS: u32 = 3600;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("request timed out")]
    Timeout,
    #[error("{0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

// ============================================================================
// ROWS
// ============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RegistrationRow {
    pub acp_name: String,
    pub acp_address: String,
    pub city: String,
    pub state: String,
    pub post_code: String,
    pub telephone_no: String,
    pub fax_no: String,
    pub store_photo_url: Option<String>,
    pub id_card_no: String,
    pub tax_id: String,
    pub sbn_nib: String,
    pub pkp: String,
    pub agreement: bool,
    pub claim_credit_note_to: &'static str,
    pub distributor_name: Option<String>,
    pub master_dealer_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RegistrationRow {
    pub fn from_record(record: &RegistrationRecord, now: DateTime<Utc>) -> Self {
        use crate::registration::ClaimRouting::*;
        let (distributor_name, master_dealer_name) = match &record.claim_routing {
            Distributor { name } => (Some(name.clone()), None),
            MasterDealer { name } => (None, Some(name.clone())),
        };

        RegistrationRow {
            acp_name: record.acp_name.clone(),
            acp_address: record.acp_address.clone(),
            city: record.city.clone(),
            state: record.state.clone(),
            post_code: record.post_code.clone(),
            telephone_no: record.telephone_no.clone(),
            fax_no: record.fax_no.clone(),
            store_photo_url: record.photo_url.clone(),
            id_card_no: record.id_card_no.clone(),
            tax_id: record.tax_id.clone(),
            sbn_nib: record.sbn_nib.clone(),
            pkp: record.pkp.clone(),
            agreement: record.agreement,
            claim_credit_note_to: record.claim_routing.kind(),
            distributor_name,
            master_dealer_name,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ContactRow {
    pub acp_registration_id: String,
    pub contact_type: ContactRole,
    pub name: String,
    pub mobile_phone: String,
    pub email: String,
    pub whatsapp_no: String,
}

impl ContactRow {
    /// Rows for every populated contact of `record`.
    pub fn for_registration(registration_id: &str, record: &RegistrationRecord) -> Vec<ContactRow> {
        record
            .populated_contacts()
            .map(|c| ContactRow {
                acp_registration_id: registration_id.to_string(),
                contact_type: c.role,
                name: c.name.clone(),
                mobile_phone: c.mobile_phone.clone(),
                email: c.email.clone(),
                whatsapp_no: c.whatsapp_no.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub path: String,
    pub public_url: String,
}

// ============================================================================
// TRAITS
// ============================================================================

pub trait RegistrationStore: Send + Sync {
    /// Insert a registration and return its id.
    fn insert_registration(&self, row: &RegistrationRow) -> Result<String, StorageError>;
    fn insert_contacts(&self, rows: &[ContactRow]) -> Result<(), StorageError>;
    fn insert_rsvp(&self, rsvp: &RsvpRecord) -> Result<(), StorageError>;
    /// Set the stored document URL and return the updated row.
    fn update_pdf_url(
        &self,
        id: &str,
        pdf_url: &str,
        now: DateTime<Utc>,
    ) -> Result<Value, StorageError>;
    /// Registrations with their contacts, newest first.
    fn list_registrations(&self) -> Result<Vec<Value>, StorageError>;
}

pub trait ObjectStore: Send + Sync {
    fn put_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<StoredObject, StorageError>;
}

// ============================================================================
// HOSTED BACKEND
// ============================================================================

pub struct SupabaseClient {
    base_url: String,
    service_key: String,
    agent: ureq::Agent,
    upload_agent: ureq::Agent,
}

impl SupabaseClient {
    pub fn new(base_url: &str, service_key: &str, request_timeout: Duration, upload_timeout: Duration) -> Self {
        SupabaseClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            agent: ureq::AgentBuilder::new().timeout(request_timeout).build(),
            upload_agent: ureq::AgentBuilder::new().timeout(upload_timeout).build(),
        }
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            urlencoding::encode(bucket),
            encode_path(path)
        )
    }

    fn authed(&self, request: ureq::Request) -> ureq::Request {
        request
            .set("apikey", &self.service_key)
            .set("Authorization", &format!("Bearer {}", self.service_key))
    }

    fn insert_returning(&self, table: &str, body: Value) -> Result<Vec<Value>, StorageError> {
        let request = self
            .authed(self.agent.post(&self.rest_url(table)))
            .set("Prefer", "return=representation");
        let response = request.send_json(body).map_err(map_ureq)?;
        read_rows(response)
    }
}

impl RegistrationStore for SupabaseClient {
    fn insert_registration(&self, row: &RegistrationRow) -> Result<String, StorageError> {
        let body = serde_json::to_value(row).map_err(|e| StorageError::Decode(e.to_string()))?;
        let rows = self.insert_returning(REGISTRATIONS_TABLE, body)?;
        let id = rows
            .first()
            .and_then(|r| r.get("id"))
            .and_then(id_string)
            .ok_or_else(|| StorageError::Decode("inserted row has no id".into()))?;
        debug!("Inserted registration {}", id);
        Ok(id)
    }

    fn insert_contacts(&self, rows: &[ContactRow]) -> Result<(), StorageError> {
        if rows.is_empty() {
            return Ok(());
        }
        let body = serde_json::to_value(rows).map_err(|e| StorageError::Decode(e.to_string()))?;
        self.authed(self.agent.post(&self.rest_url(CONTACTS_TABLE)))
            .send_json(body)
            .map_err(map_ureq)?;
        Ok(())
    }

    fn insert_rsvp(&self, rsvp: &RsvpRecord) -> Result<(), StorageError> {
        let body = serde_json::to_value(rsvp).map_err(|e| StorageError::Decode(e.to_string()))?;
        self.authed(self.agent.post(&self.rest_url(RSVPS_TABLE)))
            .send_json(body)
            .map_err(map_ureq)?;
        Ok(())
    }

    fn update_pdf_url(
        &self,
        id: &str,
        pdf_url: &str,
        now: DateTime<Utc>,
    ) -> Result<Value, StorageError> {
        let url = format!(
            "{}?id=eq.{}",
            self.rest_url(REGISTRATIONS_TABLE),
            urlencoding::encode(id)
        );
        let response = self
            .authed(self.agent.request("PATCH", &url))
            .set("Prefer", "return=representation")
            .send_json(json!({
                "form_submission_pdf_format": pdf_url,
                "updated_at": now,
            }))
            .map_err(map_ureq)?;

        read_rows(response)?
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::Api {
                status: 404,
                message: format!("No registration with id {}", id),
            })
    }

    fn list_registrations(&self) -> Result<Vec<Value>, StorageError> {
        let url = format!(
            "{}?select=*&order=created_at.desc",
            self.rest_url(REGISTRATIONS_VIEW)
        );
        let response = self.authed(self.agent.get(&url)).call().map_err(map_ureq)?;
        read_rows(response)
    }
}

impl ObjectStore for SupabaseClient {
    fn put_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            urlencoding::encode(bucket),
            encode_path(path)
        );
        self.authed(self.upload_agent.post(&url))
            .set("Content-Type", content_type)
            .set("Cache-Control", &format!("max-age={}", CACHE_CONTROL_SECS))
            .set("x-upsert", "false")
            .send_bytes(bytes)
            .map_err(map_ureq)?;

        debug!("Stored {} bytes at {}/{}", bytes.len(), bucket, path);
        Ok(StoredObject {
            path: path.to_string(),
            public_url: self.public_url(bucket, path),
        })
    }
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn read_rows(response: ureq::Response) -> Result<Vec<Value>, StorageError> {
    match response
        .into_json::<Value>()
        .map_err(|e| StorageError::Decode(e.to_string()))?
    {
        Value::Array(rows) => Ok(rows),
        other => Ok(vec![other]),
    }
}

fn map_ureq(error: ureq::Error) -> StorageError {
    match error {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            StorageError::Api {
                status,
                message: api_message(&body).unwrap_or(body),
            }
        }
        ureq::Error::Transport(transport) => {
            let message = transport.to_string();
            if message.to_lowercase().contains("timed out") {
                StorageError::Timeout
            } else {
                StorageError::Transport(message)
            }
        }
    }
}

/// PostgREST and the storage API both report failures as `{"message": ...}`.
fn api_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error", "msg"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_string)
}

// ============================================================================
// IN-MEMORY BACKEND
// ============================================================================

#[derive(Default)]
struct Tables {
    next_id: u64,
    registrations: Vec<Value>,
    contacts: Vec<ContactRow>,
    rsvps: Vec<RsvpRecord>,
    objects: Vec<(String, usize)>,
}

/// Process-local store used when no backend is configured.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    pub fn contacts(&self) -> Vec<ContactRow> {
        self.tables().contacts.clone()
    }

    #[cfg(test)]
    pub fn rsvps(&self) -> Vec<RsvpRecord> {
        self.tables().rsvps.clone()
    }

    #[cfg(test)]
    pub fn object_paths(&self) -> Vec<String> {
        self.tables().objects.iter().map(|(p, _)| p.clone()).collect()
    }
}

impl RegistrationStore for MemoryStore {
    fn insert_registration(&self, row: &RegistrationRow) -> Result<String, StorageError> {
        let mut tables = self.tables();
        tables.next_id += 1;
        let id = format!("mem-{}", tables.next_id);

        let mut value = serde_json::to_value(row).map_err(|e| StorageError::Decode(e.to_string()))?;
        if let Value::Object(map) = &mut value {
            map.insert("id".into(), Value::String(id.clone()));
            map.insert("form_submission_pdf_format".into(), Value::Null);
        }
        tables.registrations.push(value);
        Ok(id)
    }

    fn insert_contacts(&self, rows: &[ContactRow]) -> Result<(), StorageError> {
        self.tables().contacts.extend_from_slice(rows);
        Ok(())
    }

    fn insert_rsvp(&self, rsvp: &RsvpRecord) -> Result<(), StorageError> {
        self.tables().rsvps.push(rsvp.clone());
        Ok(())
    }

    fn update_pdf_url(
        &self,
        id: &str,
        pdf_url: &str,
        now: DateTime<Utc>,
    ) -> Result<Value, StorageError> {
        let mut tables = self.tables();
        let row = tables
            .registrations
            .iter_mut()
            .find(|r| r.get("id").and_then(Value::as_str) == Some(id))
            .ok_or_else(|| StorageError::Api {
                status: 404,
                message: format!("No registration with id {}", id),
            })?;

        row["form_submission_pdf_format"] = Value::String(pdf_url.to_string());
        row["updated_at"] = json!(now);
        Ok(row.clone())
    }

    fn list_registrations(&self) -> Result<Vec<Value>, StorageError> {
        let tables = self.tables();
        let mut rows: Vec<Value> = tables
            .registrations
            .iter()
            .rev()
            .map(|registration| {
                let id = registration.get("id").and_then(Value::as_str).unwrap_or_default();
                let contacts: Vec<&ContactRow> = tables
                    .contacts
                    .iter()
                    .filter(|c| c.acp_registration_id == id)
                    .collect();
                let mut row = registration.clone();
                row["contacts"] = json!(contacts);
                row
            })
            .collect();
        rows.sort_by(|a, b| {
            let created = |v: &Value| v.get("created_at").and_then(Value::as_str).map(str::to_owned);
            created(b).cmp(&created(a))
        });
        Ok(rows)
    }
}

impl ObjectStore for MemoryStore {
    fn put_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        let mut tables = self.tables();
        if tables.objects.iter().any(|(p, _)| p == path) {
            return Err(StorageError::Api {
                status: 409,
                message: "The resource already exists".into(),
            });
        }
        tables.objects.push((path.to_string(), bytes.len()));
        Ok(StoredObject {
            path: path.to_string(),
            public_url: format!("memory://{}/{}", bucket, path),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::tests::sample_record;
    use crate::registration::ClaimRouting;

    #[test]
    fn registration_row_sets_only_the_selected_routing_name() {
        let mut record = sample_record();
        let row = RegistrationRow::from_record(&record, Utc::now());
        assert_eq!(row.claim_credit_note_to, "distributor");
        assert_eq!(row.distributor_name.as_deref(), Some("PT. SYNNEX METRODATA INDONESIA"));
        assert_eq!(row.master_dealer_name, None);

        record.claim_routing = ClaimRouting::MasterDealer { name: "Toko A".into() };
        let row = RegistrationRow::from_record(&record, Utc::now());
        assert_eq!(row.claim_credit_note_to, "master_dealer");
        assert_eq!(row.distributor_name, None);
        assert_eq!(row.master_dealer_name.as_deref(), Some("Toko A"));
    }

    #[test]
    fn contact_rows_skip_blank_contacts_and_use_wire_roles() {
        let rows = ContactRow::for_registration("42", &sample_record());
        assert_eq!(rows.len(), 1);
        let value = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(value["contact_type"], "Owner");
        assert_eq!(value["acp_registration_id"], "42");
    }

    #[test]
    fn memory_store_round_trips_registrations() {
        let store = MemoryStore::new();
        let record = sample_record();
        let id = store
            .insert_registration(&RegistrationRow::from_record(&record, Utc::now()))
            .unwrap();
        store
            .insert_contacts(&ContactRow::for_registration(&id, &record))
            .unwrap();

        let updated = store
            .update_pdf_url(&id, "https://cdn.example.com/a.pdf", Utc::now())
            .unwrap();
        assert_eq!(updated["form_submission_pdf_format"], "https://cdn.example.com/a.pdf");

        let listed = store.list_registrations().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["contacts"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn updating_an_unknown_id_is_not_found() {
        let store = MemoryStore::new();
        let err = store.update_pdf_url("nope", "x", Utc::now()).unwrap_err();
        assert!(matches!(err, StorageError::Api { status: 404, .. }));
    }

    #[test]
    fn objects_are_not_overwritten() {
        let store = MemoryStore::new();
        let stored = store.put_object("bucket", "folder/a.pdf", b"%PDF", "application/pdf").unwrap();
        assert_eq!(stored.public_url, "memory://bucket/folder/a.pdf");
        assert!(store.put_object("bucket", "folder/a.pdf", b"%PDF", "application/pdf").is_err());
    }

    #[test]
    fn object_paths_are_escaped_per_segment() {
        assert_eq!(encode_path("folder/a b.pdf"), "folder/a%20b.pdf");
        let client = SupabaseClient::new(
            "https://project.supabase.co/",
            "key",
            Duration::from_secs(1),
            Duration::from_secs(2),
        );
        assert_eq!(
            client.public_url("media", "pdf/x.pdf"),
            "https://project.supabase.co/storage/v1/object/public/media/pdf/x.pdf"
        );
    }

    #[test]
    fn api_errors_prefer_the_message_field() {
        assert_eq!(
            api_message(r#"{"statusCode":"409","error":"Duplicate","message":"The resource already exists"}"#),
            Some("The resource already exists".into())
        );
        assert_eq!(api_message("plain text"), None);
    }
}
