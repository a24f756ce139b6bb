use std::path::PathBuf;

use crate::error::Result;
pub use clap::Parser;
use toon_types::config::BackendConfig;
use url::Url;

#[derive(Debug, Clone, clap::Parser)]
pub struct ServerConfig {
    #[arg(
        short,
        long,
        default_value_t = 3000,
        env = "TOON_LISTEN_PORT",
        help = "Port to listen on"
    )]
    pub port: u16,
    #[arg(
        short,
        long,
        default_value = "127.0.0.1",
        env = "TOON_LISTEN_ADDRESS",
        help = "Address to listen on"
    )]
    pub listen_address: String,

    #[arg(
        long,
        env = "TOON_BASE_URL",
        default_value = "http://localhost:3000",
        help = "Base URL of server, as visible to clients"
    )]
    pub base_url: Url,

    #[command(flatten)]
    pub backend: BackendConfig,

    #[arg(
        long,
        env = "TOON_UPLOAD_LIMIT_MB",
        default_value = "50",
        help = "Maximum image upload size in MB"
    )]
    pub upload_limit_mb: usize,

    #[arg(
        long,
        env = "TOON_DEFAULT_PAGE_SIZE",
        default_value = "100",
        help = "Default page size of listings"
    )]
    pub default_page_size: u32,

    #[arg(long, env = "TOON_NO_CORS", help = "Disable CORS")]
    pub no_cors: bool,
}

impl ServerConfig {
    pub fn load() -> Result<Self> {
        ServerConfig::try_parse().map_err(|e| e.into())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.backend.data_dir()
    }

    pub fn files_dir(&self) -> PathBuf {
        self.backend.files_dir()
    }

    pub fn database_url(&self) -> String {
        self.backend.database_url()
    }
}

impl From<&ServerConfig> for toon_app::state::AppConfig {
    fn from(config: &ServerConfig) -> Self {
        toon_app::state::AppConfig {
            base_url: config.base_url.clone(),
            file_store_path: config.files_dir(),
            upload_limit_mb: config.upload_limit_mb,
            default_page_size: config.default_page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config =
            ServerConfig::try_parse_from(["toon-server", "--data-dir", "/tmp/toon-test"]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.database_url(), "sqlite:///tmp/toon-test/toon.db");
        assert_eq!(config.files_dir(), PathBuf::from("/tmp/toon-test/objects"));
        assert!(!config.no_cors);
        let app_config: toon_app::state::AppConfig = (&config).into();
        assert_eq!(app_config.default_page_size, 100);
    }
}
