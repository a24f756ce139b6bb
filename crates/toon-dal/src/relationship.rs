//! Ordered many-to-many relationship tables
//!
//! Relationships are always written by replacing the complete set for an owner,
//! so duplicates can only come from older data, [`repair_duplicates`] cleans them up.

use serde::Serialize;
use tracing::debug;

use crate::{ChosenConnection, error::Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationTable {
    SeriesGenres,
    SeriesTags,
    SeriesCredits,
    PageImages,
}

impl RelationTable {
    pub const ALL: [RelationTable; 4] = [
        RelationTable::SeriesGenres,
        RelationTable::SeriesTags,
        RelationTable::SeriesCredits,
        RelationTable::PageImages,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            RelationTable::SeriesGenres => "series_genres",
            RelationTable::SeriesTags => "series_tags",
            RelationTable::SeriesCredits => "series_credits",
            RelationTable::PageImages => "page_images",
        }
    }

    pub fn owner_column(&self) -> &'static str {
        match self {
            RelationTable::PageImages => "page_id",
            _ => "series_id",
        }
    }

    /// Columns identifying one related item, duplicates share owner and all of these
    fn target_columns(&self) -> &'static str {
        match self {
            RelationTable::SeriesGenres => "genre_id",
            RelationTable::SeriesTags => "tag_id",
            RelationTable::SeriesCredits => "role, name",
            RelationTable::PageImages => "media_id",
        }
    }

    fn target_id_column(&self) -> Option<&'static str> {
        match self {
            RelationTable::SeriesGenres => Some("genre_id"),
            RelationTable::SeriesTags => Some("tag_id"),
            RelationTable::PageImages => Some("media_id"),
            RelationTable::SeriesCredits => None,
        }
    }
}

/// Replaces all targets of the owner, order of `targets` becomes position 1..n.
/// Repeated targets are written once. Must run inside caller's transaction.
pub async fn replace(
    conn: &mut ChosenConnection,
    relation: RelationTable,
    owner_id: i64,
    targets: &[i64],
) -> Result<()> {
    let target_column = relation.target_id_column().ok_or_else(|| {
        crate::Error::InvalidOperation(format!("{} are not id relations", relation.table()))
    })?;
    let table = relation.table();
    let owner_column = relation.owner_column();

    sqlx::query(&format!("DELETE FROM {table} WHERE {owner_column} = ?"))
        .bind(owner_id)
        .execute(&mut *conn)
        .await?;

    let mut seen = Vec::with_capacity(targets.len());
    for target in targets {
        if seen.contains(target) {
            continue;
        }
        seen.push(*target);
        sqlx::query(&format!(
            "INSERT INTO {table} ({owner_column}, {target_column}, position) VALUES (?, ?, ?)"
        ))
        .bind(owner_id)
        .bind(target)
        .bind(seen.len() as i64)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Ordered target ids of the owner
pub async fn targets(
    conn: &mut ChosenConnection,
    relation: RelationTable,
    owner_id: i64,
) -> Result<Vec<i64>> {
    let target_column = relation.target_id_column().ok_or_else(|| {
        crate::Error::InvalidOperation(format!("{} are not id relations", relation.table()))
    })?;
    let ids = sqlx::query_scalar(&format!(
        "SELECT {target_column} FROM {} WHERE {} = ? ORDER BY position, id",
        relation.table(),
        relation.owner_column()
    ))
    .bind(owner_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(ids)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairReport {
    pub removed: u64,
    pub renumbered: u64,
}

/// Removes duplicate rows keeping the lowest id per owner and target,
/// then makes positions contiguous from 1 within each owner
pub async fn repair_duplicates(
    conn: &mut ChosenConnection,
    relation: RelationTable,
) -> Result<RepairReport> {
    let table = relation.table();
    let owner = relation.owner_column();
    let target = relation.target_columns();

    let removed = sqlx::query(&format!(
        "DELETE FROM {table} WHERE id NOT IN \
         (SELECT min(id) FROM {table} GROUP BY {owner}, {target})"
    ))
    .execute(&mut *conn)
    .await?
    .rows_affected();

    let renumbered = sqlx::query(&format!(
        "UPDATE {table} SET position = ranked.new_position \
         FROM (SELECT id, row_number() OVER (PARTITION BY {owner} ORDER BY position, id) AS new_position \
               FROM {table}) AS ranked \
         WHERE {table}.id = ranked.id AND {table}.position IS NOT ranked.new_position"
    ))
    .execute(&mut *conn)
    .await?
    .rows_affected();

    debug!("Repaired {table}: removed {removed} duplicates, renumbered {renumbered}");
    Ok(RepairReport {
        removed,
        renumbered,
    })
}

pub async fn repair_all(
    conn: &mut ChosenConnection,
) -> Result<Vec<(RelationTable, RepairReport)>> {
    let mut reports = Vec::with_capacity(RelationTable::ALL.len());
    for relation in RelationTable::ALL {
        let report = repair_duplicates(conn, relation).await?;
        reports.push((relation, report));
    }
    Ok(reports)
}
