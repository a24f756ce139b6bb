use serde::Serialize;

use crate::{ChosenConnection, error::Result};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BacklogEntry {
    pub series_id: i64,
    pub reason: String,
    pub attempts: i64,
    pub created: time::PrimitiveDateTime,
}

/// Records series with stale stats, repeated failures only bump attempts.
/// Returns false if series does not exist anymore.
pub async fn enqueue(conn: &mut ChosenConnection, series_id: i64, reason: &str) -> Result<bool> {
    let res = sqlx::query(
        "INSERT INTO stats_backlog (series_id, reason) \
         SELECT ?, ? WHERE EXISTS (SELECT 1 FROM series WHERE id = ?) \
         ON CONFLICT(series_id) DO UPDATE SET attempts = attempts + 1, reason = excluded.reason",
    )
    .bind(series_id)
    .bind(reason)
    .bind(series_id)
    .execute(&mut *conn)
    .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn list(conn: &mut ChosenConnection) -> Result<Vec<BacklogEntry>> {
    let entries = sqlx::query_as::<_, BacklogEntry>(
        "SELECT series_id, reason, attempts, created FROM stats_backlog ORDER BY created, series_id",
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(entries)
}

pub async fn remove(conn: &mut ChosenConnection, series_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM stats_backlog WHERE series_id = ?")
        .bind(series_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
