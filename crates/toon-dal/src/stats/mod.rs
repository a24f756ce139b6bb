//! Maintenance of denormalized statistics
//!
//! After any content change of a series the stages run in fixed order, each once,
//! within one transaction:
//! renumber global pages -> chapter stats -> series stats -> navigation links.
//! Page number allocation is done by the mutation itself (see [`numbering`]).

pub mod aggregate;
pub mod backlog;
pub mod navigation;
pub mod numbering;

use serde::{Deserialize, Serialize};
use sqlx::{Acquire, Executor, Pool};
use tracing::{debug, error};

use crate::{ChosenConnection, ChosenDB, error::Result};

pub use backlog::BacklogEntry;
pub use navigation::Navigation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Renumber,
    ChapterStats,
    SeriesStats,
    Navigation,
}

impl Stage {
    pub const ORDERED: [Stage; 4] = [
        Stage::Renumber,
        Stage::ChapterStats,
        Stage::SeriesStats,
        Stage::Navigation,
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub series_id: i64,
    pub renumbered: u64,
    pub chapters_updated: u64,
    pub series_updated: u64,
    pub links_updated: u64,
}

impl PipelineReport {
    pub fn new(series_id: i64) -> Self {
        Self {
            series_id,
            ..Default::default()
        }
    }

    pub fn updated(&self) -> u64 {
        self.renumbered + self.chapters_updated + self.series_updated + self.links_updated
    }

    fn record(&mut self, stage: Stage, updated: u64) {
        match stage {
            Stage::Renumber => self.renumbered += updated,
            Stage::ChapterStats => self.chapters_updated += updated,
            Stage::SeriesStats => self.series_updated += updated,
            Stage::Navigation => self.links_updated += updated,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BacklogRepair {
    pub repaired: Vec<i64>,
    pub failed: Vec<i64>,
}

pub async fn run_stage(conn: &mut ChosenConnection, series_id: i64, stage: Stage) -> Result<u64> {
    match stage {
        Stage::Renumber => numbering::renumber_series(conn, series_id).await,
        Stage::ChapterStats => aggregate::update_chapter_stats(conn, series_id).await,
        Stage::SeriesStats => aggregate::update_series_stats(conn, series_id).await,
        Stage::Navigation => navigation::relink_series(conn, series_id).await,
    }
}

/// All stages in order on given connection, caller owns the transaction
pub async fn run_all_stages(conn: &mut ChosenConnection, series_id: i64) -> Result<PipelineReport> {
    let mut report = PipelineReport::new(series_id);
    for stage in Stage::ORDERED {
        let updated = run_stage(conn, series_id, stage).await?;
        report.record(stage, updated);
    }
    Ok(report)
}

async fn series_exists(conn: &mut ChosenConnection, series_id: i64) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM series WHERE id = ?")
        .bind(series_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count > 0)
}

pub type StatsPipeline = StatsPipelineImpl<Pool<ChosenDB>>;

pub struct StatsPipelineImpl<E> {
    executor: E,
}

impl<'c, E> StatsPipelineImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB> + Acquire<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Complete pipeline for one series in a single transaction.
    /// Missing series yields an empty report.
    pub async fn run(&self, series_id: i64) -> Result<PipelineReport> {
        self.run_stages(series_id, &Stage::ORDERED).await
    }

    pub async fn run_stage(&self, series_id: i64, stage: Stage) -> Result<PipelineReport> {
        self.run_stages(series_id, &[stage]).await
    }

    async fn run_stages(&self, series_id: i64, stages: &[Stage]) -> Result<PipelineReport> {
        let mut tx = self.executor.begin().await?;
        let mut report = PipelineReport::new(series_id);
        if !series_exists(&mut tx, series_id).await? {
            debug!("Series {series_id} does not exist, nothing to recalculate");
            return Ok(report);
        }
        for stage in stages {
            let updated = run_stage(&mut tx, series_id, *stage).await?;
            report.record(*stage, updated);
        }
        tx.commit().await?;
        debug!("Stats pipeline for series {series_id}: {report:?}");
        Ok(report)
    }

    /// Recalculates every series, same code path as after single mutation
    pub async fn recalculate_all(&self) -> Result<Vec<PipelineReport>> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM series ORDER BY id")
            .fetch_all(&self.executor)
            .await?;
        let mut reports = Vec::with_capacity(ids.len());
        for id in ids {
            reports.push(self.run(id).await?);
        }
        Ok(reports)
    }

    /// To be called after committed content change. Failure does not propagate,
    /// series is queued to backlog instead.
    pub async fn after_mutation(&self, series_id: i64) -> Option<PipelineReport> {
        match self.run(series_id).await {
            Ok(report) => Some(report),
            Err(e) => {
                error!("Stats pipeline failed for series {series_id}: {e}");
                if let Err(e) = self.enqueue(series_id, &e.to_string()).await {
                    error!("Cannot queue series {series_id} for stats repair: {e}");
                }
                None
            }
        }
    }

    pub async fn enqueue(&self, series_id: i64, reason: &str) -> Result<bool> {
        let mut conn = self.executor.acquire().await?;
        backlog::enqueue(&mut *conn, series_id, reason).await
    }

    pub async fn backlog(&self) -> Result<Vec<BacklogEntry>> {
        let mut conn = self.executor.acquire().await?;
        backlog::list(&mut *conn).await
    }

    /// Retries all queued series, successful ones are removed from backlog
    pub async fn repair_backlog(&self) -> Result<BacklogRepair> {
        let mut result = BacklogRepair::default();
        for entry in self.backlog().await? {
            match self.run(entry.series_id).await {
                Ok(_) => {
                    let mut conn = self.executor.acquire().await?;
                    backlog::remove(&mut *conn, entry.series_id).await?;
                    result.repaired.push(entry.series_id);
                }
                Err(e) => {
                    error!("Repair of series {} failed again: {e}", entry.series_id);
                    self.enqueue(entry.series_id, &e.to_string()).await?;
                    result.failed.push(entry.series_id);
                }
            }
        }
        Ok(result)
    }
}
