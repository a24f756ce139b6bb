use clap::Parser;
use toon_dal::media::MediaRepository;
use toon_store::Store as _;
use toon_types::config::BackendConfig;

use crate::commands::{Executor, open_pool, open_store};

#[derive(Parser, Debug)]
pub struct CleanupCmd {
    #[command(flatten)]
    backend: BackendConfig,
    #[arg(long, help = "Only list objects which would be deleted")]
    dry_run: bool,
}

impl Executor for CleanupCmd {
    async fn run(self) -> anyhow::Result<()> {
        let pool = open_pool(&self.backend).await?;
        let store = open_store(&self.backend);
        let repository = MediaRepository::new(pool);
        let orphans = toon_app::media::unreferenced_objects(&repository, &store).await?;
        for path in orphans {
            if self.dry_run {
                println!("Would delete {path}");
            } else {
                store.delete(&path).await?;
                println!("Deleted {path}");
            }
        }

        Ok(())
    }
}
