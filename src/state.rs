use std::sync::Arc;

use tracing::info;

use crate::assets::{AssetFetcher, HttpAssetFetcher};
use crate::config::Config;
use crate::fonts::FontBook;
use crate::pipeline::Pipeline;
use crate::storage::{MemoryStore, ObjectStore, RegistrationStore, SupabaseClient};

/// Shared, immutable handles. Built once in `main` and cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registrations: Arc<dyn RegistrationStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let (registrations, objects): (Arc<dyn RegistrationStore>, Arc<dyn ObjectStore>) =
            match &config.backend {
                Some(backend) => {
                    info!("Using hosted backend at {}", backend.url);
                    let client = Arc::new(SupabaseClient::new(
                        &backend.url,
                        &backend.service_key,
                        config.backend_timeout,
                        config.upload_timeout,
                    ));
                    (client.clone() as Arc<dyn RegistrationStore>, client as Arc<dyn ObjectStore>)
                }
                None => {
                    let store = Arc::new(MemoryStore::new());
                    (store.clone() as Arc<dyn RegistrationStore>, store as Arc<dyn ObjectStore>)
                }
            };

        let fetcher = Arc::new(HttpAssetFetcher::new(config.asset_timeout));
        let fonts = Arc::new(FontBook::discover(config.font_dir.as_deref()));
        Self::with_parts(config, registrations, objects, fetcher, fonts)
    }

    pub fn with_parts(
        config: Config,
        registrations: Arc<dyn RegistrationStore>,
        objects: Arc<dyn ObjectStore>,
        fetcher: Arc<dyn AssetFetcher>,
        fonts: Arc<FontBook>,
    ) -> Self {
        let pipeline = Pipeline::from_config(
            &config,
            fetcher,
            fonts,
            Arc::clone(&registrations),
            Arc::clone(&objects),
        );
        AppState {
            config: Arc::new(config),
            registrations,
            objects,
            pipeline: Arc::new(pipeline),
        }
    }
}
