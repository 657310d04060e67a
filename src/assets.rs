//! Best-effort asset prefetch. Remote images are fetched once, checked, and
//! inlined as `data:` URLs so painting never touches the network.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const MAX_ASSET_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Invalid data URL format")]
    InvalidDataUrl,
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("Failed to read response: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of raw asset bytes. Implementations block; callers run them off
/// the async executor.
pub trait AssetFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, AssetError>;
}

/// Fetches `data:` URLs, http(s) URLs and local paths.
pub struct HttpAssetFetcher {
    agent: ureq::Agent,
}

impl HttpAssetFetcher {
    pub fn new(timeout: Duration) -> Self {
        HttpAssetFetcher {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    fn load_remote(&self, url: &str) -> Result<Vec<u8>, AssetError> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| AssetError::Http(e.to_string()))?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_ASSET_BYTES)
            .read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

impl AssetFetcher for HttpAssetFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, AssetError> {
        if url.starts_with("data:") {
            decode_data_url(url)
        } else if url.starts_with("http://") || url.starts_with("https://") {
            self.load_remote(url)
        } else {
            Ok(std::fs::read(url)?)
        }
    }
}

/// Decode the payload of a base64 `data:` URL.
pub fn decode_data_url(data_url: &str) -> Result<Vec<u8>, AssetError> {
    let (header, payload) = data_url
        .split_once(',')
        .ok_or(AssetError::InvalidDataUrl)?;
    if !header.ends_with(";base64") {
        return Err(AssetError::InvalidDataUrl);
    }
    Ok(STANDARD.decode(payload.trim())?)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedAsset {
    pub mime: &'static str,
    pub data_url: String,
}

/// Outcome of a prefetch. `Unavailable` is a normal result, never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Asset {
    Embedded(EmbeddedAsset),
    Unavailable(String),
}

impl Asset {
    pub fn data_url(&self) -> Option<&str> {
        match self {
            Asset::Embedded(asset) => Some(&asset.data_url),
            Asset::Unavailable(_) => None,
        }
    }
}

/// Fetch `url` within `timeout` and inline it. Any failure, including a
/// missing URL, yields `Asset::Unavailable`.
pub async fn prefetch(
    fetcher: Arc<dyn AssetFetcher>,
    url: Option<&str>,
    timeout: Duration,
) -> Asset {
    let Some(url) = url.filter(|u| !u.trim().is_empty()) else {
        return Asset::Unavailable("no asset configured".into());
    };

    let owned = url.to_string();
    let task = tokio::task::spawn_blocking(move || fetcher.fetch(&owned));

    let bytes = match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(bytes))) => bytes,
        Ok(Ok(Err(e))) => return unavailable(url, e.to_string()),
        Ok(Err(e)) => return unavailable(url, format!("fetch task failed: {}", e)),
        Err(_) => return unavailable(url, format!("timed out after {:?}", timeout)),
    };

    match embed(&bytes) {
        Some(asset) => {
            debug!("Embedded asset {} ({} bytes, {})", url, bytes.len(), asset.mime);
            Asset::Embedded(asset)
        }
        None => unavailable(url, "not a supported image".into()),
    }
}

fn unavailable(url: &str, reason: String) -> Asset {
    warn!("Asset {} unavailable, using fallback: {}", url, reason);
    Asset::Unavailable(reason)
}

fn embed(bytes: &[u8]) -> Option<EmbeddedAsset> {
    let mime = match image::guess_format(bytes).ok()? {
        image::ImageFormat::Png => "image/png",
        image::ImageFormat::Jpeg => "image/jpeg",
        image::ImageFormat::Gif => "image/gif",
        image::ImageFormat::WebP => "image/webp",
        image::ImageFormat::Bmp => "image/bmp",
        _ => return None,
    };
    Some(EmbeddedAsset {
        mime,
        data_url: format!("data:{};base64,{}", mime, STANDARD.encode(bytes)),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    pub(crate) fn png_bytes() -> Vec<u8> {
        let img = RgbImage::from_pixel(4, 4, Rgb([0, 102, 204]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    pub(crate) struct StaticFetcher(pub Vec<u8>);

    impl AssetFetcher for StaticFetcher {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>, AssetError> {
            Ok(self.0.clone())
        }
    }

    pub(crate) struct SlowFetcher(pub Duration);

    impl AssetFetcher for SlowFetcher {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>, AssetError> {
            std::thread::sleep(self.0);
            Ok(png_bytes())
        }
    }

    struct FailingFetcher;

    impl AssetFetcher for FailingFetcher {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>, AssetError> {
            Err(AssetError::Http("status code 404".into()))
        }
    }

    #[tokio::test]
    async fn png_is_embedded_as_data_url() {
        let asset = prefetch(
            Arc::new(StaticFetcher(png_bytes())),
            Some("https://cdn.example.com/logo.png"),
            Duration::from_secs(1),
        )
        .await;
        let url = asset.data_url().unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(decode_data_url(url).unwrap(), png_bytes());
    }

    #[tokio::test]
    async fn timeout_degrades_to_unavailable() {
        let asset = prefetch(
            Arc::new(SlowFetcher(Duration::from_millis(500))),
            Some("https://cdn.example.com/logo.png"),
            Duration::from_millis(20),
        )
        .await;
        assert!(matches!(asset, Asset::Unavailable(reason) if reason.contains("timed out")));
    }

    #[tokio::test]
    async fn fetch_errors_and_junk_bytes_degrade() {
        let failed = prefetch(Arc::new(FailingFetcher), Some("x"), Duration::from_secs(1)).await;
        assert!(matches!(failed, Asset::Unavailable(_)));

        let junk = prefetch(
            Arc::new(StaticFetcher(b"<html>not found</html>".to_vec())),
            Some("x"),
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(junk, Asset::Unavailable(_)));
    }

    #[tokio::test]
    async fn missing_url_is_unavailable() {
        let asset = prefetch(Arc::new(FailingFetcher), None, Duration::from_secs(1)).await;
        assert_eq!(asset.data_url(), None);
    }

    #[test]
    fn data_urls_without_base64_marker_are_rejected() {
        assert!(matches!(
            decode_data_url("data:image/png,abc"),
            Err(AssetError::InvalidDataUrl)
        ));
        assert!(decode_data_url("data:image/png;base64,AAAA").is_ok());
    }
}
