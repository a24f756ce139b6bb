pub mod cleanup;
pub mod create_user;
pub mod publish;
pub mod recalculate;
pub mod repair;

use toon_types::config::BackendConfig;
use tracing::debug;

#[allow(async_fn_in_trait)]
pub trait Executor {
    async fn run(self) -> anyhow::Result<()>;
}

/// Opens database of the backend, schema is migrated to current version
pub async fn open_pool(backend: &BackendConfig) -> anyhow::Result<toon_dal::Pool> {
    let data_dir = backend.data_dir();
    if !data_dir.is_dir() {
        tokio::fs::create_dir_all(&data_dir).await?;
    }
    let db_url = backend.database_url();
    debug!("Opening database {db_url}");
    let pool = toon_dal::new_pool(&db_url).await?;
    toon_dal::migrate(&pool).await?;
    Ok(pool)
}

pub fn open_store(backend: &BackendConfig) -> toon_store::file_store::FileStore {
    toon_store::file_store::FileStore::new(backend.files_dir())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
