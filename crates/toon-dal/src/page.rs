use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Acquire, Executor, Pool};
use time::PrimitiveDateTime;
use tracing::debug;

use crate::{
    ChosenConnection, ChosenDB, Error,
    chapter::load_chapter,
    error::Result,
    relationship::{self, RelationTable},
    stats::{Navigation, numbering},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PageStatus {
    #[default]
    Draft,
    Scheduled,
    Published,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePage {
    #[garde(skip)]
    pub series_id: i64,
    #[garde(skip)]
    pub chapter_id: Option<i64>,
    #[garde(length(max = 255))]
    pub title: Option<String>,
    #[garde(length(max = 2000))]
    pub alt_text: Option<String>,
    /// Position in chapter, following pages move down. Allocated as next in chapter
    /// when not given.
    #[garde(range(min = 1))]
    pub chapter_page_number: Option<i64>,
    /// Draft on create, stored status kept on update when not given
    #[garde(skip)]
    pub status: Option<PageStatus>,
    /// Stored date kept on update when not given
    #[garde(skip)]
    pub published_date: Option<PrimitiveDateTime>,
    #[garde(skip)]
    #[serde(default)]
    pub images: Vec<i64>,
    #[garde(range(min = 0))]
    pub version: Option<i64>,
}

impl CreatePage {
    pub fn new(series_id: i64, chapter_id: Option<i64>) -> Self {
        Self {
            series_id,
            chapter_id,
            title: None,
            alt_text: None,
            chapter_page_number: None,
            status: None,
            published_date: None,
            images: Vec::new(),
            version: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Page {
    pub id: i64,
    pub series_id: i64,
    pub chapter_id: Option<i64>,
    pub title: Option<String>,
    pub alt_text: Option<String>,
    pub chapter_page_number: i64,
    pub global_page_number: Option<i64>,
    #[sqlx(flatten)]
    pub navigation: Navigation,
    pub status: PageStatus,
    pub published_date: Option<PrimitiveDateTime>,
    #[sqlx(skip)]
    pub images: Vec<i64>,
    pub version: i64,
    pub created: PrimitiveDateTime,
    pub modified: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageReorder {
    pub series_id: i64,
    pub updated: u64,
}

const SELECT_PAGE: &str = "SELECT id, series_id, chapter_id, title, alt_text, chapter_page_number, \
     global_page_number, previous_page_id, next_page_id, is_first, is_last, status, \
     published_date, version, created, modified FROM page";

async fn load_page(conn: &mut ChosenConnection, id: i64) -> Result<Page> {
    let mut page = sqlx::query_as::<_, Page>(&format!("{SELECT_PAGE} WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::RecordNotFound("Page".to_string()))?;
    page.images = relationship::targets(conn, RelationTable::PageImages, id).await?;
    Ok(page)
}

async fn check_parents(conn: &mut ChosenConnection, payload: &CreatePage) -> Result<()> {
    let series: i64 = sqlx::query_scalar("SELECT count(*) FROM series WHERE id = ?")
        .bind(payload.series_id)
        .fetch_one(&mut *conn)
        .await?;
    if series == 0 {
        return Err(Error::InvalidReference(format!(
            "series {} does not exist",
            payload.series_id
        )));
    }
    if let Some(chapter_id) = payload.chapter_id {
        let chapter = load_chapter(conn, chapter_id).await.map_err(|e| match e {
            Error::RecordNotFound(_) => {
                Error::InvalidReference(format!("chapter {chapter_id} does not exist"))
            }
            other => other,
        })?;
        if chapter.series_id != payload.series_id {
            return Err(Error::InvalidReference(format!(
                "chapter {chapter_id} does not belong to series {}",
                payload.series_id
            )));
        }
    }
    for media_id in &payload.images {
        let found: i64 = sqlx::query_scalar("SELECT count(*) FROM media WHERE id = ?")
            .bind(media_id)
            .fetch_one(&mut *conn)
            .await?;
        if found == 0 {
            return Err(Error::InvalidReference(format!(
                "media {media_id} does not exist"
            )));
        }
    }
    Ok(())
}

fn now() -> PrimitiveDateTime {
    let now = time::OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

/// Published page always has a date, scheduled page needs one
fn publication(
    status: PageStatus,
    published_date: Option<PrimitiveDateTime>,
) -> Result<(PageStatus, Option<PrimitiveDateTime>)> {
    match (status, published_date) {
        (PageStatus::Published, None) => Ok((status, Some(now()))),
        (PageStatus::Scheduled, None) => Err(Error::InvalidOperation(
            "scheduled page requires published_date".to_string(),
        )),
        (status, date) => Ok((status, date)),
    }
}

pub type PageRepository = PageRepositoryImpl<Pool<ChosenDB>>;

pub struct PageRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> PageRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB> + Acquire<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreatePage) -> Result<Page> {
        let (status, published_date) =
            publication(payload.status.unwrap_or_default(), payload.published_date)?;
        let mut tx = self.executor.begin().await?;
        check_parents(&mut tx, &payload).await?;

        let number = match payload.chapter_page_number {
            Some(n) => {
                numbering::open_position(&mut tx, payload.series_id, payload.chapter_id, n, None)
                    .await?;
                n
            }
            None => {
                numbering::next_chapter_page_number(&mut tx, payload.series_id, payload.chapter_id)
                    .await?
            }
        };
        let res = sqlx::query(
            "INSERT INTO page (series_id, chapter_id, title, alt_text, chapter_page_number, \
             status, published_date, version) VALUES (?, ?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(payload.series_id)
        .bind(payload.chapter_id)
        .bind(&payload.title)
        .bind(&payload.alt_text)
        .bind(number)
        .bind(status)
        .bind(published_date)
        .execute(&mut *tx)
        .await?;
        let id = res.last_insert_rowid();
        relationship::replace(&mut tx, RelationTable::PageImages, id, &payload.images).await?;
        if payload.chapter_page_number.is_some() {
            numbering::compact_chapter(&mut tx, payload.series_id, payload.chapter_id).await?;
        }

        let page = load_page(&mut tx, id).await?;
        tx.commit().await?;
        debug!(
            "Created page {id} as number {} in chapter {:?}",
            page.chapter_page_number, payload.chapter_id
        );
        Ok(page)
    }

    /// Moving to other chapter without explicit number appends the page there,
    /// the chapter left is compacted. Explicit number inserts the page at that position.
    pub async fn update(&self, id: i64, payload: CreatePage) -> Result<Page> {
        let version = payload.version.ok_or_else(|| {
            debug!("No version provided");
            Error::MissingVersion
        })?;
        let mut tx = self.executor.begin().await?;
        let current = load_page(&mut tx, id).await?;
        let (status, published_date) = publication(
            payload.status.unwrap_or(current.status),
            payload.published_date.or(current.published_date),
        )?;
        if current.series_id != payload.series_id {
            return Err(Error::InvalidOperation(
                "page cannot be moved to another series".to_string(),
            ));
        }
        check_parents(&mut tx, &payload).await?;

        let moved = current.chapter_id != payload.chapter_id;
        let number = match (payload.chapter_page_number, moved) {
            (Some(n), _) => {
                numbering::open_position(&mut tx, payload.series_id, payload.chapter_id, n, Some(id))
                    .await?;
                n
            }
            (None, false) => current.chapter_page_number,
            (None, true) => {
                numbering::next_chapter_page_number(&mut tx, payload.series_id, payload.chapter_id)
                    .await?
            }
        };

        let res = sqlx::query(
            "UPDATE page SET chapter_id = ?, title = ?, alt_text = ?, chapter_page_number = ?, \
             status = ?, published_date = ?, version = ?, modified = CURRENT_TIMESTAMP \
             WHERE id = ? AND version = ?",
        )
        .bind(payload.chapter_id)
        .bind(&payload.title)
        .bind(&payload.alt_text)
        .bind(number)
        .bind(status)
        .bind(published_date)
        .bind(version + 1)
        .bind(id)
        .bind(version)
        .execute(&mut *tx)
        .await?;
        if res.rows_affected() == 0 {
            return Err(Error::FailedUpdate { id, version });
        }
        relationship::replace(&mut tx, RelationTable::PageImages, id, &payload.images).await?;
        if moved {
            numbering::compact_chapter(&mut tx, current.series_id, current.chapter_id).await?;
        }
        if payload.chapter_page_number.is_some() {
            numbering::compact_chapter(&mut tx, payload.series_id, payload.chapter_id).await?;
        }

        let page = load_page(&mut tx, id).await?;
        tx.commit().await?;
        Ok(page)
    }

    pub async fn get(&self, id: i64) -> Result<Page> {
        let mut conn = self.executor.acquire().await?;
        load_page(&mut *conn, id).await
    }

    pub async fn list_for_series(&self, series_id: i64) -> Result<Vec<Page>> {
        self.list_where("series_id = ?", series_id).await
    }

    pub async fn list_for_chapter(&self, chapter_id: i64) -> Result<Vec<Page>> {
        self.list_where("chapter_id = ?", chapter_id).await
    }

    async fn list_where(&self, condition: &str, value: i64) -> Result<Vec<Page>> {
        let mut conn = self.executor.acquire().await?;
        let mut pages = sqlx::query_as::<_, Page>(&format!(
            "{SELECT_PAGE} WHERE {condition} \
             ORDER BY global_page_number IS NULL, global_page_number, chapter_page_number, id"
        ))
        .bind(value)
        .fetch_all(&mut *conn)
        .await?;
        for page in pages.iter_mut() {
            page.images = relationship::targets(&mut *conn, RelationTable::PageImages, page.id).await?;
        }
        Ok(pages)
    }

    /// Deletes page and closes the gap in its chapter, returns series id
    pub async fn delete(&self, id: i64) -> Result<i64> {
        let mut tx = self.executor.begin().await?;
        let page = load_page(&mut tx, id).await?;
        sqlx::query("DELETE FROM page WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let remaining: i64 = sqlx::query_scalar(
            "SELECT (SELECT count(*) FROM page WHERE id = ?) + \
             (SELECT count(*) FROM page_images WHERE page_id = ?)",
        )
        .bind(id)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if remaining > 0 {
            return Err(Error::DeleteNotConfirmed {
                entity: "Page".to_string(),
                id,
            });
        }
        numbering::compact_chapter(&mut tx, page.series_id, page.chapter_id).await?;
        tx.commit().await?;
        Ok(page.series_id)
    }

    /// Pages get chapter page numbers by position in `ordered_ids`,
    /// any id not from the chapter rejects the whole request
    pub async fn reorder(&self, chapter_id: i64, ordered_ids: &[i64]) -> Result<PageReorder> {
        let mut tx = self.executor.begin().await?;
        let chapter = load_chapter(&mut tx, chapter_id).await?;
        let members: Vec<i64> = sqlx::query_scalar("SELECT id FROM page WHERE chapter_id = ?")
            .bind(chapter_id)
            .fetch_all(&mut *tx)
            .await?;
        for (idx, id) in ordered_ids.iter().enumerate() {
            if !members.contains(id) {
                return Err(Error::InvalidReorder(format!(
                    "page {id} does not belong to chapter {chapter_id}"
                )));
            }
            if ordered_ids[..idx].contains(id) {
                return Err(Error::InvalidReorder(format!("page {id} is listed twice")));
            }
        }
        let updated = numbering::apply_page_order(&mut tx, chapter_id, ordered_ids).await?;
        tx.commit().await?;
        Ok(PageReorder {
            series_id: chapter.series_id,
            updated,
        })
    }

    /// Publishes scheduled pages which are due, returns affected series
    pub async fn publish_due(&self, now: PrimitiveDateTime) -> Result<Vec<i64>> {
        let mut series: Vec<i64> = sqlx::query_scalar(
            "UPDATE page SET status = 'published', modified = CURRENT_TIMESTAMP \
             WHERE status = 'scheduled' AND published_date <= ? RETURNING series_id",
        )
        .bind(now)
        .fetch_all(&self.executor)
        .await?;
        series.sort_unstable();
        series.dedup();
        Ok(series)
    }
}
