use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
pub struct BackendConfig {
    #[arg(
        long,
        env = "TOON_DATABASE_URL",
        help = "Database URL e.g. sqlite://file.db, default is sqlite://[data-dir]/toon.db, where data-dir is set by --data-dir"
    )]
    database_url: Option<String>,

    #[arg(
        long,
        env = "TOON_DATA_DIR",
        help = "Data directory (database, object store), default is system default like ~/.local/share/toon",
        default_value_t = default_data_dir()
    )]
    data_dir: String,

    #[arg(
        long,
        env = "TOON_FILES_DIR",
        help = "Root of object store (media, published manifests), default data_dir/objects"
    )]
    files_dir: Option<PathBuf>,
}

fn default_data_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("toon"))
        .unwrap_or_else(|| PathBuf::from("toon"))
        .to_string_lossy()
        .to_string()
}

impl BackendConfig {
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn files_dir(&self) -> PathBuf {
        self.files_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join("objects"))
    }

    pub fn database_url(&self) -> String {
        self.database_url
            .clone()
            .unwrap_or_else(|| format!("sqlite://{}/toon.db", self.data_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_paths() {
        let config =
            BackendConfig::try_parse_from(["toon", "--data-dir", "/tmp/toon-data"]).unwrap();
        assert_eq!(config.database_url(), "sqlite:///tmp/toon-data/toon.db");
        assert_eq!(config.files_dir(), PathBuf::from("/tmp/toon-data/objects"));

        let config = BackendConfig::try_parse_from([
            "toon",
            "--data-dir",
            "/tmp/toon-data",
            "--files-dir",
            "/srv/objects",
            "--database-url",
            "sqlite::memory:",
        ])
        .unwrap();
        assert_eq!(config.database_url(), "sqlite::memory:");
        assert_eq!(config.files_dir(), PathBuf::from("/srv/objects"));
    }
}
