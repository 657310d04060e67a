use axum::{
    extract::{
        multipart::MultipartError, rejection::JsonRejection, DefaultBodyLimit, FromRequest,
        Multipart, Request, State,
    },
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::error::AppError;
use crate::pipeline::PublishOutcome;
use crate::registration::{PdfUrlPatch, RegistrationForm, RsvpRequest};
use crate::state::AppState;
use crate::storage::{ContactRow, RegistrationRow, StorageError};
use crate::summary::{self, LoginRequest, LoginResponse, AUTH_HEADER};
use crate::upload::{upload_pdf, UploadResult, UploadTarget, FALLBACK_FILE_NAME};

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/rsvp", post(rsvp_handler))
        .route("/api/acp-registration", post(registration_handler))
        .route("/api/update-pdf-url", put(update_pdf_url_handler))
        .route("/api/upload-pdf", post(upload_pdf_handler))
        .route("/api/acp-registration/pdf", post(render_pdf_handler))
        .route("/api/acp-registration/pdf/publish", post(publish_pdf_handler))
        .route("/api/acp-registration/summary/login", post(summary_login_handler))
        .route("/api/acp-registration/summary", get(summary_handler))
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// EXTRACTION
// ============================================================================

/// JSON body whose rejections answer in the same `{"error"}` shape as
/// every other failure.
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> AppError {
    AppError::BadRequest(rejection.body_text())
}

/// Run a blocking store call off the async executor.
async fn blocking<T, F>(f: F) -> Result<T, StorageError>
where
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StorageError::Transport(e.to_string()))?
}

// ============================================================================
// FORMS
// ============================================================================

pub async fn rsvp_handler(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RsvpRequest>,
) -> Result<Json<Value>, AppError> {
    let rsvp = request.into_record()?;
    let store = state.registrations.clone();
    blocking(move || store.insert_rsvp(&rsvp))
        .await
        .map_err(AppError::storage("Gagal menyimpan data"))?;

    Ok(Json(json!({ "success": true })))
}

pub async fn registration_handler(
    State(state): State<AppState>,
    JsonBody(form): JsonBody<RegistrationForm>,
) -> Result<Json<Value>, AppError> {
    let record = form.into_record()?;
    let row = RegistrationRow::from_record(&record, Utc::now());

    let store = state.registrations.clone();
    let id = blocking(move || store.insert_registration(&row))
        .await
        .map_err(AppError::storage("Gagal menyimpan data pendaftaran"))?;

    let contacts = ContactRow::for_registration(&id, &record);
    if !contacts.is_empty() {
        let store = state.registrations.clone();
        if let Err(e) = blocking(move || store.insert_contacts(&contacts)).await {
            // The registration itself is saved; contacts can be re-entered.
            warn!("Error inserting contacts for {}: {}", id, e);
        }
    }

    info!("Registered ACP {} ({})", record.acp_name, id);
    Ok(Json(json!({
        "success": true,
        "message": "Pendaftaran ACP berhasil dikirim",
        "id": id,
    })))
}

pub async fn update_pdf_url_handler(
    State(state): State<AppState>,
    JsonBody(patch): JsonBody<PdfUrlPatch>,
) -> Result<Json<Value>, AppError> {
    patch.validate()?;

    let store = state.registrations.clone();
    let data = blocking(move || store.update_pdf_url(&patch.id, &patch.pdf_url, Utc::now()))
        .await
        .map_err(AppError::storage("Failed to update PDF URL"))?;

    Ok(Json(json!({
        "success": true,
        "message": "PDF URL updated successfully",
        "data": data,
    })))
}

pub async fn upload_pdf_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResult>, AppError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut bucket = String::new();
    let mut folder = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e: MultipartError| AppError::BadRequest(e.body_text()))?
    {
        let bad_field = |e: MultipartError| AppError::BadRequest(e.body_text());
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field
                    .file_name()
                    .filter(|n| !n.is_empty())
                    .unwrap_or(FALLBACK_FILE_NAME)
                    .to_string();
                let bytes = field.bytes().await.map_err(bad_field)?;
                file = Some((file_name, bytes.to_vec()));
            }
            "bucket" => bucket = field.text().await.map_err(bad_field)?,
            "folder" => folder = field.text().await.map_err(bad_field)?,
            _ => {}
        }
    }

    let (filename, bytes) = file.ok_or_else(|| AppError::BadRequest("No file provided".into()))?;
    if bucket.trim().is_empty() || folder.trim().is_empty() {
        return Err(AppError::BadRequest("Bucket and folder are required".into()));
    }

    let target = UploadTarget { bucket, folder };
    let result = upload_pdf(
        state.objects.clone(),
        bytes,
        &filename,
        &target,
        state.config.upload_timeout,
        Utc::now(),
    )
    .await;

    match result.error {
        None => Ok(Json(result)),
        Some(message) if result.is_timeout() => Err(AppError::UploadTimeout(message)),
        Some(message) => Err(AppError::UploadFailed(message)),
    }
}

// ============================================================================
// DOCUMENTS
// ============================================================================

pub async fn render_pdf_handler(
    State(state): State<AppState>,
    JsonBody(form): JsonBody<RegistrationForm>,
) -> Result<Response, AppError> {
    let record = form.into_printable()?;
    let pdf = state.pipeline.generate(&record, Utc::now()).await?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", pdf.filename))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf.bytes,
    )
        .into_response())
}

pub async fn publish_pdf_handler(
    State(state): State<AppState>,
    JsonBody(form): JsonBody<RegistrationForm>,
) -> Result<Json<PublishOutcome>, AppError> {
    let record = form.into_printable()?;
    let outcome = state.pipeline.publish(&record, Utc::now()).await?;
    Ok(Json(outcome))
}

// ============================================================================
// SUMMARY
// ============================================================================

pub async fn summary_login_handler(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let response = summary::login(
        state.config.summary_password.as_deref(),
        &request.password,
        Utc::now(),
    )?;
    Ok(Json(response))
}

pub async fn summary_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Value>>, AppError> {
    let token = headers.get(AUTH_HEADER).and_then(|v| v.to_str().ok());
    summary::check_session(state.config.summary_password.as_deref(), token, Utc::now())?;

    let store = state.registrations.clone();
    let rows = blocking(move || store.list_registrations())
        .await
        .map_err(AppError::storage("Failed to load registrations"))?;
    Ok(Json(rows))
}
