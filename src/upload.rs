use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::pdf::file_timestamp;
use crate::storage::{ObjectStore, StorageError};

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
pub const FALLBACK_FILE_NAME: &str = "document.pdf";
pub const UPLOAD_TIMEOUT_MESSAGE: &str =
    "Upload timeout - please try again with a smaller file or better connection";

/// Bucket and folder every generated document is stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub bucket: String,
    pub folder: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub path: String,
    pub public_url: String,
}

/// Outcome of one upload. Failures carry a message meant for the end user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<UploadedFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadResult {
    fn ok(file: UploadedFile) -> Self {
        UploadResult {
            success: true,
            data: Some(file),
            error: None,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        UploadResult {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.error.as_deref() == Some(UPLOAD_TIMEOUT_MESSAGE)
    }
}

/// `<folder>/<timestamp>-<filename>`, with `filename` reduced to a single
/// safe path segment.
pub fn object_path(folder: &str, filename: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}/{}-{}",
        folder.trim_end_matches('/'),
        file_timestamp(now),
        clean_file_name(filename)
    )
}

/// Last path component of `name`, restricted to `[A-Za-z0-9._-]`.
pub fn clean_file_name(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Store `blob` under the target folder within `timeout`. Never errors;
/// failures come back as `success: false` with a readable message.
pub async fn upload_pdf(
    objects: Arc<dyn ObjectStore>,
    blob: Vec<u8>,
    filename: &str,
    target: &UploadTarget,
    timeout: Duration,
    now: DateTime<Utc>,
) -> UploadResult {
    let path = object_path(&target.folder, filename, now);
    let bucket = target.bucket.clone();
    let size = blob.len();
    info!("Uploading {} ({} bytes) to {}", path, size, bucket);

    let task_path = path.clone();
    let task = tokio::task::spawn_blocking(move || {
        objects.put_object(&bucket, &task_path, &blob, PDF_CONTENT_TYPE)
    });

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(stored))) => {
            info!("Upload completed: {}", stored.public_url);
            UploadResult::ok(UploadedFile {
                path: stored.path,
                public_url: stored.public_url,
            })
        }
        Ok(Ok(Err(StorageError::Timeout))) | Err(_) => {
            error!("Upload of {} timed out after {:?}", path, timeout);
            UploadResult::failed(UPLOAD_TIMEOUT_MESSAGE)
        }
        Ok(Ok(Err(e))) => {
            error!("Storage upload failed for {}: {}", path, e);
            UploadResult::failed(format!("Storage upload failed: {}", e))
        }
        Ok(Err(e)) => {
            error!("Upload task failed for {}: {}", path, e);
            UploadResult::failed(format!("Upload failed: {}", e))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::{MemoryStore, StoredObject};
    use chrono::TimeZone;

    pub(crate) struct RejectingStore(pub &'static str);

    impl ObjectStore for RejectingStore {
        fn put_object(&self, _: &str, _: &str, _: &[u8], _: &str) -> Result<StoredObject, StorageError> {
            Err(StorageError::Api {
                status: 400,
                message: self.0.to_string(),
            })
        }
    }

    struct StallingStore;

    impl ObjectStore for StallingStore {
        fn put_object(&self, _: &str, path: &str, _: &[u8], _: &str) -> Result<StoredObject, StorageError> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(StoredObject {
                path: path.into(),
                public_url: String::new(),
            })
        }
    }

    fn target() -> UploadTarget {
        UploadTarget {
            bucket: "asus-pvp-master-media".into(),
            folder: "asus-acp-registration-pdf-form-submission".into(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 5).unwrap()
    }

    #[test]
    fn client_file_names_cannot_leave_the_folder() {
        assert_eq!(clean_file_name("../../etc/passwd.pdf"), "passwd.pdf");
        assert_eq!(clean_file_name(r"C:\Users\me\scan 1.pdf"), "scan-1.pdf");
        assert_eq!(clean_file_name(".."), FALLBACK_FILE_NAME);
        assert_eq!(clean_file_name("docs/"), FALLBACK_FILE_NAME);
        assert_eq!(
            object_path("pdfs", "../secret/a.pdf", now()),
            "pdfs/2026-10-19T08-30-05-000Z-a.pdf"
        );
    }

    #[test]
    fn object_path_prefixes_the_timestamp() {
        assert_eq!(
            object_path("pdfs/", "a.pdf", now()),
            "pdfs/2026-10-19T08-30-05-000Z-a.pdf"
        );
    }

    #[tokio::test]
    async fn successful_upload_returns_path_and_public_url() {
        let store = Arc::new(MemoryStore::new());
        let result = upload_pdf(
            store.clone(),
            b"%PDF-1.3".to_vec(),
            "a.pdf",
            &target(),
            Duration::from_secs(5),
            now(),
        )
        .await;

        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(
            data.path,
            "asus-acp-registration-pdf-form-submission/2026-10-19T08-30-05-000Z-a.pdf"
        );
        assert!(data.public_url.ends_with(&data.path));
        assert_eq!(store.object_paths(), vec![data.path]);
    }

    #[tokio::test]
    async fn backend_errors_keep_the_backend_message() {
        let result = upload_pdf(
            Arc::new(RejectingStore("Bucket not found")),
            vec![1, 2, 3],
            "a.pdf",
            &target(),
            Duration::from_secs(5),
            now(),
        )
        .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Storage upload failed: Bucket not found"));
    }

    #[tokio::test]
    async fn slow_uploads_time_out_with_a_specific_message() {
        let result = upload_pdf(
            Arc::new(StallingStore),
            vec![0; 16],
            "a.pdf",
            &target(),
            Duration::from_millis(20),
            now(),
        )
        .await;
        assert!(result.is_timeout());
        assert_eq!(result.error.as_deref(), Some(UPLOAD_TIMEOUT_MESSAGE));
    }

    #[test]
    fn results_serialize_in_camel_case() {
        let ok = UploadResult::ok(UploadedFile {
            path: "p".into(),
            public_url: "u".into(),
        });
        assert_eq!(
            serde_json::to_value(ok).unwrap(),
            serde_json::json!({"success": true, "data": {"path": "p", "publicUrl": "u"}})
        );
    }
}
