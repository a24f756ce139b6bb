use std::sync::Arc;

use toon_dal::{Pool, stats::StatsPipeline};
use toon_store::file_store::FileStore;
use url::Url;

#[derive(Clone)]
pub struct AppState {
    state: Arc<AppStateInner>,
}

impl AppState {
    pub fn new(app_config: AppConfig, pool: Pool) -> Self {
        let store = FileStore::new(app_config.file_store_path.clone());
        AppState {
            state: Arc::new(AppStateInner {
                app_config,
                pool,
                store,
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.state.app_config
    }

    pub fn pool(&self) -> &Pool {
        &self.state.pool
    }

    pub fn store(&self) -> &FileStore {
        &self.state.store
    }

    pub fn pipeline(&self) -> StatsPipeline {
        StatsPipeline::new(self.state.pool.clone())
    }

    pub fn build_url(&self, relative_url: &str) -> anyhow::Result<Url> {
        let url = self.config().base_url.join(relative_url)?;
        Ok(url)
    }
}

struct AppStateInner {
    pool: Pool,
    store: FileStore,
    app_config: AppConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub base_url: Url,
    pub file_store_path: std::path::PathBuf,
    pub upload_limit_mb: usize,
    pub default_page_size: u32,
}
