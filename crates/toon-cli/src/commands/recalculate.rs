use clap::Parser;
use toon_dal::stats::StatsPipeline;
use toon_types::config::BackendConfig;

use crate::commands::{Executor, open_pool, print_json};

#[derive(Parser, Debug)]
pub struct RecalculateCmd {
    #[command(flatten)]
    backend: BackendConfig,
    #[arg(
        short,
        long,
        help = "Recalculate only this series, all series if not provided"
    )]
    series_id: Option<i64>,
}

impl Executor for RecalculateCmd {
    async fn run(self) -> anyhow::Result<()> {
        let pool = open_pool(&self.backend).await?;
        let pipeline = StatsPipeline::new(pool);
        match self.series_id {
            Some(id) => print_json(&pipeline.run(id).await?),
            None => print_json(&pipeline.recalculate_all().await?),
        }
    }
}
