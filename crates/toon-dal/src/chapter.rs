use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Acquire, Executor, Pool};
use tracing::debug;

use crate::{ChosenConnection, ChosenDB, Error, error::Result};

pub const UNASSIGNED_CHAPTER_TITLE: &str = "Unassigned Pages";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateChapter {
    #[garde(skip)]
    pub series_id: i64,
    #[garde(length(min = 1, max = 255))]
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateChapter {
    #[garde(length(min = 1, max = 255))]
    pub title: String,
    #[garde(range(min = 0))]
    pub version: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Chapter {
    pub id: i64,
    pub series_id: i64,
    pub title: String,
    #[serde(rename = "order")]
    pub chapter_order: i64,
    pub is_unassigned: bool,
    pub page_count: i64,
    pub first_global_page: Option<i64>,
    pub last_global_page: Option<i64>,
    pub version: i64,
    pub created: time::PrimitiveDateTime,
    pub modified: time::PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChapterDeletion {
    pub series_id: i64,
    pub moved_pages: u64,
    pub moved_to: Option<i64>,
}

const SELECT_CHAPTER: &str = "SELECT id, series_id, title, chapter_order, is_unassigned, page_count, \
     first_global_page, last_global_page, version, created, modified FROM chapter";

pub(crate) async fn load_chapter(conn: &mut ChosenConnection, id: i64) -> Result<Chapter> {
    sqlx::query_as::<_, Chapter>(&format!("{SELECT_CHAPTER} WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::RecordNotFound("Chapter".to_string()))
}

async fn next_order(conn: &mut ChosenConnection, series_id: i64) -> Result<i64> {
    let next = sqlx::query_scalar(
        "SELECT COALESCE(MAX(chapter_order), 0) + 1 FROM chapter WHERE series_id = ?",
    )
    .bind(series_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(next)
}

/// Chapter collecting pages of deleted chapters, created on first use
pub(crate) async fn unassigned_chapter(conn: &mut ChosenConnection, series_id: i64) -> Result<i64> {
    let existing: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM chapter WHERE series_id = ? AND is_unassigned ORDER BY id LIMIT 1",
    )
    .bind(series_id)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let order = next_order(conn, series_id).await?;
    let res = sqlx::query(
        "INSERT INTO chapter (series_id, title, chapter_order, is_unassigned, version) \
         VALUES (?, ?, ?, 1, 1)",
    )
    .bind(series_id)
    .bind(UNASSIGNED_CHAPTER_TITLE)
    .bind(order)
    .execute(&mut *conn)
    .await?;
    debug!("Created unassigned chapter for series {series_id}");
    Ok(res.last_insert_rowid())
}

pub type ChapterRepository = ChapterRepositoryImpl<Pool<ChosenDB>>;

pub struct ChapterRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> ChapterRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB> + Acquire<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateChapter) -> Result<Chapter> {
        let mut tx = self.executor.begin().await?;
        let series: i64 = sqlx::query_scalar("SELECT count(*) FROM series WHERE id = ?")
            .bind(payload.series_id)
            .fetch_one(&mut *tx)
            .await?;
        if series == 0 {
            return Err(Error::InvalidReference(format!(
                "series {} does not exist",
                payload.series_id
            )));
        }

        let order = next_order(&mut tx, payload.series_id).await?;
        let res = sqlx::query(
            "INSERT INTO chapter (series_id, title, chapter_order, version) VALUES (?, ?, ?, 1)",
        )
        .bind(payload.series_id)
        .bind(&payload.title)
        .bind(order)
        .execute(&mut *tx)
        .await?;
        let chapter = load_chapter(&mut tx, res.last_insert_rowid()).await?;
        tx.commit().await?;
        Ok(chapter)
    }

    pub async fn update(&self, id: i64, payload: UpdateChapter) -> Result<Chapter> {
        let version = payload.version.ok_or_else(|| {
            debug!("No version provided");
            Error::MissingVersion
        })?;
        let res = sqlx::query(
            "UPDATE chapter SET title = ?, version = ?, modified = CURRENT_TIMESTAMP \
             WHERE id = ? AND version = ?",
        )
        .bind(&payload.title)
        .bind(version + 1)
        .bind(id)
        .bind(version)
        .execute(&self.executor)
        .await?;
        if res.rows_affected() == 0 {
            Err(Error::FailedUpdate { id, version })
        } else {
            self.get(id).await
        }
    }

    pub async fn get(&self, id: i64) -> Result<Chapter> {
        sqlx::query_as::<_, Chapter>(&format!("{SELECT_CHAPTER} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.executor)
            .await?
            .ok_or_else(|| Error::RecordNotFound("Chapter".to_string()))
    }

    pub async fn list_for_series(&self, series_id: i64) -> Result<Vec<Chapter>> {
        let chapters = sqlx::query_as::<_, Chapter>(&format!(
            "{SELECT_CHAPTER} WHERE series_id = ? ORDER BY chapter_order, id"
        ))
        .bind(series_id)
        .fetch_all(&self.executor)
        .await?;
        Ok(chapters)
    }

    /// Deletes chapter, its pages are moved to the end of series' unassigned chapter
    pub async fn delete(&self, id: i64) -> Result<ChapterDeletion> {
        let mut tx = self.executor.begin().await?;
        let chapter = load_chapter(&mut tx, id).await?;
        let pages: i64 = sqlx::query_scalar("SELECT count(*) FROM page WHERE chapter_id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        let mut moved_to = None;
        let mut moved_pages = 0;
        if pages > 0 {
            if chapter.is_unassigned {
                return Err(Error::InvalidOperation(
                    "unassigned chapter still contains pages".to_string(),
                ));
            }
            let target = unassigned_chapter(&mut tx, chapter.series_id).await?;
            let base: i64 = sqlx::query_scalar(
                "SELECT COALESCE(MAX(chapter_page_number), 0) FROM page WHERE chapter_id = ?",
            )
            .bind(target)
            .fetch_one(&mut *tx)
            .await?;
            moved_pages = sqlx::query(
                "UPDATE page SET chapter_id = ?, chapter_page_number = ? + ranked.n, \
                   modified = CURRENT_TIMESTAMP \
                 FROM (SELECT id, row_number() OVER (ORDER BY chapter_page_number, id) AS n \
                       FROM page WHERE chapter_id = ?) AS ranked \
                 WHERE page.id = ranked.id",
            )
            .bind(target)
            .bind(base)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            moved_to = Some(target);
            debug!("Moved {moved_pages} pages from chapter {id} to {target}");
        }

        sqlx::query("DELETE FROM chapter WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let remaining: i64 = sqlx::query_scalar(
            "SELECT (SELECT count(*) FROM chapter WHERE id = ?) + \
             (SELECT count(*) FROM page WHERE chapter_id = ?)",
        )
        .bind(id)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if remaining > 0 {
            return Err(Error::DeleteNotConfirmed {
                entity: "Chapter".to_string(),
                id,
            });
        }
        tx.commit().await?;

        Ok(ChapterDeletion {
            series_id: chapter.series_id,
            moved_pages,
            moved_to,
        })
    }

    /// Listed chapters get order 1..n, other chapters of the series follow in their current order
    pub async fn reorder(&self, series_id: i64, ordered_ids: &[i64]) -> Result<u64> {
        let mut tx = self.executor.begin().await?;
        let current: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM chapter WHERE series_id = ? ORDER BY chapter_order, id",
        )
        .bind(series_id)
        .fetch_all(&mut *tx)
        .await?;

        for (idx, id) in ordered_ids.iter().enumerate() {
            if !current.contains(id) {
                return Err(Error::InvalidReorder(format!(
                    "chapter {id} does not belong to series {series_id}"
                )));
            }
            if ordered_ids[..idx].contains(id) {
                return Err(Error::InvalidReorder(format!("chapter {id} is listed twice")));
            }
        }

        let rest = current.iter().filter(|id| !ordered_ids.contains(id));
        let mut changed = 0;
        for (idx, id) in ordered_ids.iter().chain(rest).enumerate() {
            let order = idx as i64 + 1;
            changed += sqlx::query(
                "UPDATE chapter SET chapter_order = ?, modified = CURRENT_TIMESTAMP \
                 WHERE id = ? AND chapter_order != ?",
            )
            .bind(order)
            .bind(id)
            .bind(order)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }
        tx.commit().await?;
        Ok(changed)
    }
}
