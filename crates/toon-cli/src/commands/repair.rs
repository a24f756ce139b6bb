use clap::{ArgGroup, Args, Parser};
use toon_dal::{relationship, stats::StatsPipeline};
use toon_types::config::BackendConfig;

use crate::commands::{Executor, open_pool};

#[derive(Parser, Debug)]
pub struct RepairCmd {
    #[command(flatten)]
    backend: BackendConfig,
    #[command(flatten)]
    work: RepairSelection,
}

#[derive(Args, Debug)]
#[command(
    group(
        ArgGroup::new("work")
            .required(true)
            .multiple(true)
            .args(["relationships", "backlog", "all"])
    )
)]
pub struct RepairSelection {
    #[arg(long, help = "Remove duplicate rows in relationship tables and fix positions")]
    relationships: bool,
    #[arg(long, help = "Rerun statistics of series which failed to update")]
    backlog: bool,
    #[arg(long, help = "Do all repair tasks")]
    all: bool,
}

impl Executor for RepairCmd {
    async fn run(self) -> anyhow::Result<()> {
        let pool = open_pool(&self.backend).await?;
        if self.work.relationships || self.work.all {
            let mut tx = pool.begin().await?;
            let reports = relationship::repair_all(&mut tx).await?;
            tx.commit().await?;
            for (relation, report) in reports {
                println!(
                    "{}: removed {}, renumbered {}",
                    relation.table(),
                    report.removed,
                    report.renumbered
                );
            }
        }
        if self.work.backlog || self.work.all {
            let repair = StatsPipeline::new(pool).repair_backlog().await?;
            println!(
                "Backlog: repaired {:?}, still failing {:?}",
                repair.repaired, repair.failed
            );
        }
        Ok(())
    }
}
