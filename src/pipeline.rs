//! Document generation, end to end:
//! normalize -> prefetch -> render -> rasterize -> paginate -> package -> upload.
//!
//! Stages run strictly in sequence. Only the prefetch and the upload are
//! bounded by timeouts; the CPU-bound middle runs on the blocking pool and
//! cannot be cancelled once started.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::assets::{prefetch, AssetFetcher};
use crate::config::Config;
use crate::fonts::FontBook;
use crate::normalize::normalize_record;
use crate::paginate::{paginate, PageGeometry, PaginateError};
use crate::pdf::{assemble, derive_filename, PdfError};
use crate::raster::{rasterize, RasterError, RasterOptions, SurfaceRegistry};
use crate::registration::RegistrationRecord;
use crate::render::render_registration;
use crate::storage::{ObjectStore, RegistrationStore};
use crate::upload::{upload_pdf, UploadResult, UploadTarget};

const DOCUMENT_TITLE: &str = "ACP Registration";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("rasterization failed: {0}")]
    Raster(#[from] RasterError),
    #[error("pagination failed: {0}")]
    Paginate(#[from] PaginateError),
    #[error("packaging failed: {0}")]
    Pdf(#[from] PdfError),
    #[error("generation task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone)]
pub struct GeneratedPdf {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub page_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub success: bool,
    pub filename: String,
    pub page_count: usize,
    pub upload: UploadResult,
    /// Whether the record's document URL now points at the upload
    pub pdf_url_saved: bool,
}

/// Everything a generation call needs, built once at start-up.
pub struct Pipeline {
    pub fetcher: Arc<dyn AssetFetcher>,
    pub fonts: Arc<FontBook>,
    pub surfaces: SurfaceRegistry,
    pub registrations: Arc<dyn RegistrationStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub logo_url: Option<String>,
    pub asset_timeout: Duration,
    pub upload_timeout: Duration,
    pub raster: RasterOptions,
    pub geometry: PageGeometry,
    pub filename_prefix: String,
    pub target: UploadTarget,
}

impl Pipeline {
    pub fn from_config(
        config: &Config,
        fetcher: Arc<dyn AssetFetcher>,
        fonts: Arc<FontBook>,
        registrations: Arc<dyn RegistrationStore>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Pipeline {
            fetcher,
            fonts,
            surfaces: SurfaceRegistry::new(),
            registrations,
            objects,
            logo_url: config.logo_url.clone(),
            asset_timeout: config.asset_timeout,
            upload_timeout: config.upload_timeout,
            raster: RasterOptions {
                scale: config.raster_scale,
                max_height_px: config.max_raster_height_px,
            },
            geometry: PageGeometry::A4,
            filename_prefix: config.pdf_filename_prefix.clone(),
            target: UploadTarget {
                bucket: config.storage_bucket.clone(),
                folder: config.pdf_folder.clone(),
            },
        }
    }

    /// Render `record` to a PDF. Asset failures degrade to fallbacks; any
    /// rendering failure aborts this call.
    pub async fn generate(
        &self,
        record: &RegistrationRecord,
        now: DateTime<Utc>,
    ) -> Result<GeneratedPdf, PipelineError> {
        let normalized = normalize_record(record);
        let logo = prefetch(
            Arc::clone(&self.fetcher),
            self.logo_url.as_deref(),
            self.asset_timeout,
        )
        .await;

        let filename = derive_filename(&self.filename_prefix, Some(&normalized.acp_name), now);
        let fonts = Arc::clone(&self.fonts);
        let surfaces = self.surfaces.clone();
        let options = self.raster;
        let geometry = self.geometry;

        let (bytes, page_count) = tokio::task::spawn_blocking(move || {
            let document = render_registration(&normalized, &logo, now);
            let raster = rasterize(&document, &fonts, &options, &surfaces)?;
            let bands = paginate(&raster, &geometry)?;
            let bytes = assemble(&bands, &geometry, DOCUMENT_TITLE)?;
            Ok::<_, PipelineError>((bytes, bands.len().max(1)))
        })
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))??;

        info!(
            "Generated {} ({} page(s), {} bytes)",
            filename,
            page_count,
            bytes.len()
        );
        Ok(GeneratedPdf {
            bytes,
            filename,
            page_count,
        })
    }

    /// Generate, upload, and link the document to its record when the record
    /// has an id. Upload failures are reported in the outcome, not as errors.
    pub async fn publish(
        &self,
        record: &RegistrationRecord,
        now: DateTime<Utc>,
    ) -> Result<PublishOutcome, PipelineError> {
        let pdf = self.generate(record, now).await?;
        let upload = upload_pdf(
            Arc::clone(&self.objects),
            pdf.bytes,
            &pdf.filename,
            &self.target,
            self.upload_timeout,
            now,
        )
        .await;

        let pdf_url_saved = match (&record.id, &upload.data) {
            (Some(id), Some(file)) => self.link_document(id, &file.public_url, now).await,
            (None, Some(_)) => {
                warn!("Uploaded {} for a record without id; URL not saved", pdf.filename);
                false
            }
            _ => false,
        };

        Ok(PublishOutcome {
            success: upload.success,
            filename: pdf.filename,
            page_count: pdf.page_count,
            upload,
            pdf_url_saved,
        })
    }

    async fn link_document(&self, id: &str, url: &str, now: DateTime<Utc>) -> bool {
        let store = Arc::clone(&self.registrations);
        let (id, url) = (id.to_string(), url.to_string());
        let task_id = id.clone();
        let result =
            tokio::task::spawn_blocking(move || store.update_pdf_url(&task_id, &url, now)).await;

        match result {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                error!("Failed to save PDF URL for {}: {}", id, e);
                false
            }
            Err(e) => {
                error!("PDF URL update task failed for {}: {}", id, e);
                false
            }
        }
    }
}
