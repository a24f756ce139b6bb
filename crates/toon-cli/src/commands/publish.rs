use clap::Parser;
use toon_types::config::BackendConfig;

use crate::commands::{Executor, open_pool, open_store, print_json};

#[derive(Parser, Debug)]
pub struct PublishCmd {
    #[command(flatten)]
    backend: BackendConfig,
}

impl Executor for PublishCmd {
    async fn run(self) -> anyhow::Result<()> {
        let pool = open_pool(&self.backend).await?;
        let store = open_store(&self.backend);
        let report = toon_app::publish::publish_all(&pool, &store).await?;
        print_json(&report)
    }
}
