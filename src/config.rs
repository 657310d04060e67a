use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::raster::{DEFAULT_MAX_HEIGHT_PX, MIN_SCALE};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("UPLOAD_TIMEOUT_SECS ({upload}) must be longer than ASSET_TIMEOUT_SECS ({asset})")]
    TimeoutOrder { asset: u64, upload: u64 },
    #[error("SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY must be set together")]
    IncompleteBackend,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub url: String,
    pub service_key: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// `None` runs on the in-memory store
    pub backend: Option<BackendConfig>,
    pub storage_bucket: String,
    pub pdf_folder: String,
    pub logo_url: Option<String>,
    pub asset_timeout: Duration,
    pub upload_timeout: Duration,
    /// Bound on each database request to the hosted backend
    pub backend_timeout: Duration,
    pub raster_scale: f32,
    pub max_raster_height_px: u32,
    pub font_dir: Option<PathBuf>,
    pub summary_password: Option<String>,
    pub pdf_filename_prefix: String,
    pub max_body_bytes: usize,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let asset_secs: u64 = try_load(&var, "ASSET_TIMEOUT_SECS", "8")?;
        let upload_secs: u64 = try_load(&var, "UPLOAD_TIMEOUT_SECS", "60")?;
        if upload_secs <= asset_secs {
            return Err(ConfigError::TimeoutOrder {
                asset: asset_secs,
                upload: upload_secs,
            });
        }

        let backend_secs: u64 = try_load(&var, "BACKEND_TIMEOUT_SECS", "15")?;
        if backend_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "BACKEND_TIMEOUT_SECS",
                value: backend_secs.to_string(),
                reason: "must be at least one second".into(),
            });
        }

        let backend = match (var("SUPABASE_URL"), var("SUPABASE_SERVICE_ROLE_KEY")) {
            (Some(url), Some(service_key)) => Some(BackendConfig { url, service_key }),
            (None, None) => {
                warn!("SUPABASE_URL not set, registrations are kept in memory only");
                None
            }
            _ => return Err(ConfigError::IncompleteBackend),
        };

        let raster_scale: f32 = try_load(&var, "RASTER_SCALE", &MIN_SCALE.to_string())?;
        if !raster_scale.is_finite() || raster_scale <= 0.0 {
            return Err(ConfigError::Invalid {
                key: "RASTER_SCALE",
                value: raster_scale.to_string(),
                reason: "must be a positive number".into(),
            });
        }

        Ok(Config {
            host: try_load(&var, "HOST", "127.0.0.1")?,
            port: try_load(&var, "PORT", "3001")?,
            backend,
            storage_bucket: try_load(&var, "STORAGE_BUCKET", "asus-pvp-master-media")?,
            pdf_folder: try_load(&var, "PDF_FOLDER", "asus-acp-registration-pdf-form-submission")?,
            logo_url: var("LOGO_URL"),
            asset_timeout: Duration::from_secs(asset_secs),
            upload_timeout: Duration::from_secs(upload_secs),
            backend_timeout: Duration::from_secs(backend_secs),
            raster_scale,
            max_raster_height_px: try_load(
                &var,
                "MAX_RASTER_HEIGHT_PX",
                &DEFAULT_MAX_HEIGHT_PX.to_string(),
            )?,
            font_dir: var("FONT_DIR").map(PathBuf::from),
            summary_password: var("SUMMARY_PASSWORD"),
            pdf_filename_prefix: try_load(&var, "PDF_FILENAME_PREFIX", "ACP-Registration")?,
            max_body_bytes: try_load(&var, "MAX_BODY_BYTES", "10485760")?,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn try_load<T, F>(var: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let value = var(key).unwrap_or_else(|| {
        debug!("{key} not set, using default: {default}");
        default.to_string()
    });

    value.parse::<T>().map_err(|e| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid {
            key,
            value: value.clone(),
            reason: e.to_string(),
        }
    })
}

pub fn log_summary(config: &Config) {
    info!(
        "Config: address={}, backend={}, bucket={}, folder={}, raster_scale={}, asset_timeout={:?}, upload_timeout={:?}, backend_timeout={:?}",
        config.address(),
        if config.backend.is_some() { "supabase" } else { "memory" },
        config.storage_bucket,
        config.pdf_folder,
        config.raster_scale,
        config.asset_timeout,
        config.upload_timeout,
        config.backend_timeout,
    );
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    pub(crate) fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.address(), "127.0.0.1:3001");
        assert_eq!(config.backend, None);
        assert_eq!(config.storage_bucket, "asus-pvp-master-media");
        assert_eq!(config.pdf_folder, "asus-acp-registration-pdf-form-submission");
        assert_eq!(config.asset_timeout, Duration::from_secs(8));
        assert_eq!(config.upload_timeout, Duration::from_secs(60));
        assert_eq!(config.backend_timeout, Duration::from_secs(15));
        assert_eq!(config.raster_scale, 2.0);
        assert_eq!(config.max_raster_height_px, 32_760);
        assert_eq!(config.pdf_filename_prefix, "ACP-Registration");
        assert_eq!(config.max_body_bytes, 10 * 1024 * 1024);
        assert_eq!(config.summary_password, None);
    }

    #[test]
    fn backend_needs_both_url_and_key() {
        let config = config_from(&[
            ("SUPABASE_URL", "https://p.supabase.co"),
            ("SUPABASE_SERVICE_ROLE_KEY", "secret"),
        ])
        .unwrap();
        assert_eq!(
            config.backend,
            Some(BackendConfig {
                url: "https://p.supabase.co".into(),
                service_key: "secret".into()
            })
        );

        let err = config_from(&[("SUPABASE_URL", "https://p.supabase.co")]).unwrap_err();
        assert_eq!(err, ConfigError::IncompleteBackend);
    }

    #[test]
    fn upload_timeout_must_exceed_asset_timeout() {
        let err = config_from(&[("ASSET_TIMEOUT_SECS", "30"), ("UPLOAD_TIMEOUT_SECS", "30")])
            .unwrap_err();
        assert_eq!(err, ConfigError::TimeoutOrder { asset: 30, upload: 30 });
    }

    #[test]
    fn invalid_numbers_are_reported_with_their_key() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));

        let err = config_from(&[("RASTER_SCALE", "-1")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "RASTER_SCALE", .. }));

        let err = config_from(&[("BACKEND_TIMEOUT_SECS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "BACKEND_TIMEOUT_SECS", .. }));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = config_from(&[("LOGO_URL", "  "), ("FONT_DIR", "/opt/fonts")]).unwrap();
        assert_eq!(config.logo_url, None);
        assert_eq!(config.font_dir, Some(PathBuf::from("/opt/fonts")));
    }
}
