use futures::TryStreamExt as _;
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Acquire, Executor, Pool};
use toon_types::{claim::Authorization as _, general::is_valid_optional_slug, utils::naming::slugify};
use tracing::debug;

use crate::{
    Batch, ChosenConnection, ChosenDB, Error, ListingParams,
    error::Result,
    relationship::{self, RelationTable},
    user::load_user,
};

const VALID_ORDER_FIELDS: &[&str] = &[
    "id",
    "title",
    "slug",
    "status",
    "total_pages",
    "last_published_at",
    "created",
    "modified",
];

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SeriesStatus {
    #[default]
    Draft,
    Live,
    Hiatus,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, sqlx::FromRow)]
pub struct Credit {
    #[garde(length(min = 1, max = 100))]
    pub role: String,
    #[garde(length(min = 1, max = 255))]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateSeries {
    #[garde(length(min = 1, max = 255))]
    pub title: String,
    /// Derived from title when not given
    #[garde(custom(is_valid_optional_slug))]
    pub slug: Option<String>,
    #[garde(length(max = 10_000))]
    pub description: Option<String>,
    #[garde(skip)]
    pub status: Option<SeriesStatus>,
    #[garde(dive)]
    #[serde(default)]
    pub credits: Vec<Credit>,
    #[garde(skip)]
    #[serde(default)]
    pub genres: Vec<i64>,
    #[garde(skip)]
    #[serde(default)]
    pub tags: Vec<i64>,
    #[garde(skip)]
    pub created_by: Option<i64>,
    #[garde(range(min = 0))]
    pub version: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TermShort {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub total_pages: i64,
    pub total_chapters: i64,
    pub last_published_at: Option<time::PrimitiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub status: SeriesStatus,
    pub stats: SeriesStats,
    pub credits: Vec<Credit>,
    pub genres: Vec<TermShort>,
    pub tags: Vec<TermShort>,
    pub created_by: Option<i64>,
    pub version: i64,
    pub created: time::PrimitiveDateTime,
    pub modified: time::PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SeriesShort {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub status: SeriesStatus,
    pub total_pages: i64,
    pub total_chapters: i64,
    pub last_published_at: Option<time::PrimitiveDateTime>,
}

#[derive(Debug, sqlx::FromRow)]
struct SeriesRow {
    id: i64,
    title: String,
    slug: String,
    description: Option<String>,
    status: SeriesStatus,
    total_pages: i64,
    total_chapters: i64,
    last_published_at: Option<time::PrimitiveDateTime>,
    created_by: Option<i64>,
    version: i64,
    created: time::PrimitiveDateTime,
    modified: time::PrimitiveDateTime,
}

const SELECT_SERIES: &str = "SELECT id, title, slug, description, status, total_pages, total_chapters, \
     last_published_at, created_by, version, created, modified FROM series";

const SELECT_SHORT: &str =
    "SELECT id, title, slug, status, total_pages, total_chapters, last_published_at FROM series";

pub(crate) async fn load_series(conn: &mut ChosenConnection, id: i64) -> Result<Series> {
    let row = sqlx::query_as::<_, SeriesRow>(&format!("{SELECT_SERIES} WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::RecordNotFound("Series".to_string()))?;
    with_relations(conn, row).await
}

async fn with_relations(conn: &mut ChosenConnection, row: SeriesRow) -> Result<Series> {
    let credits = sqlx::query_as::<_, Credit>(
        "SELECT role, name FROM series_credits WHERE series_id = ? ORDER BY position, id",
    )
    .bind(row.id)
    .fetch_all(&mut *conn)
    .await?;
    let genres = sqlx::query_as::<_, TermShort>(
        "SELECT g.id, g.name, g.slug FROM genre g JOIN series_genres sg ON sg.genre_id = g.id \
         WHERE sg.series_id = ? ORDER BY sg.position, sg.id",
    )
    .bind(row.id)
    .fetch_all(&mut *conn)
    .await?;
    let tags = sqlx::query_as::<_, TermShort>(
        "SELECT t.id, t.name, t.slug FROM tag t JOIN series_tags st ON st.tag_id = t.id \
         WHERE st.series_id = ? ORDER BY st.position, st.id",
    )
    .bind(row.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Series {
        id: row.id,
        title: row.title,
        slug: row.slug,
        description: row.description,
        status: row.status,
        stats: SeriesStats {
            total_pages: row.total_pages,
            total_chapters: row.total_chapters,
            last_published_at: row.last_published_at,
        },
        credits,
        genres,
        tags,
        created_by: row.created_by,
        version: row.version,
        created: row.created,
        modified: row.modified,
    })
}

async fn check_terms(conn: &mut ChosenConnection, table: &str, ids: &[i64]) -> Result<()> {
    for id in ids {
        let found: i64 = sqlx::query_scalar(&format!("SELECT count(*) FROM {table} WHERE id = ?"))
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;
        if found == 0 {
            return Err(Error::InvalidReference(format!("{table} {id} does not exist")));
        }
    }
    Ok(())
}

async fn check_slug(conn: &mut ChosenConnection, slug: &str, own_id: Option<i64>) -> Result<()> {
    let taken: i64 = sqlx::query_scalar("SELECT count(*) FROM series WHERE slug = ? AND id IS NOT ?")
        .bind(slug)
        .bind(own_id)
        .fetch_one(&mut *conn)
        .await?;
    if taken > 0 {
        Err(Error::Conflict(format!("series slug {slug} is already used")))
    } else {
        Ok(())
    }
}

async fn replace_credits(
    conn: &mut ChosenConnection,
    series_id: i64,
    credits: &[Credit],
) -> Result<()> {
    sqlx::query("DELETE FROM series_credits WHERE series_id = ?")
        .bind(series_id)
        .execute(&mut *conn)
        .await?;
    for (idx, credit) in credits.iter().enumerate() {
        sqlx::query(
            "INSERT INTO series_credits (series_id, position, role, name) VALUES (?, ?, ?, ?)",
        )
        .bind(series_id)
        .bind(idx as i64 + 1)
        .bind(&credit.role)
        .bind(&credit.name)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn replace_relations(
    conn: &mut ChosenConnection,
    series_id: i64,
    payload: &CreateSeries,
) -> Result<()> {
    replace_credits(conn, series_id, &payload.credits).await?;
    relationship::replace(conn, RelationTable::SeriesGenres, series_id, &payload.genres).await?;
    relationship::replace(conn, RelationTable::SeriesTags, series_id, &payload.tags).await?;
    Ok(())
}

pub type SeriesRepository = SeriesRepositoryImpl<Pool<ChosenDB>>;

pub struct SeriesRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> SeriesRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB> + Acquire<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateSeries) -> Result<Series> {
        let mut tx = self.executor.begin().await?;

        let creator_id = payload
            .created_by
            .ok_or_else(|| Error::InvalidRole("series must have a creator".to_string()))?;
        let creator = load_user(&mut tx, creator_id)
            .await?
            .ok_or_else(|| Error::InvalidReference(format!("user {creator_id} does not exist")))?;
        if !creator.can_create_series() {
            return Err(Error::InvalidRole(format!(
                "user {creator_id} is not allowed to create series"
            )));
        }

        let slug = payload
            .slug
            .clone()
            .unwrap_or_else(|| slugify(&payload.title));
        if slug.is_empty() {
            return Err(Error::InvalidOperation(
                "cannot derive slug from title".to_string(),
            ));
        }
        check_slug(&mut tx, &slug, None).await?;
        check_terms(&mut tx, "genre", &payload.genres).await?;
        check_terms(&mut tx, "tag", &payload.tags).await?;

        let result = sqlx::query(
            "INSERT INTO series (title, slug, description, status, created_by, version) \
             VALUES (?, ?, ?, ?, ?, 1)",
        )
        .bind(&payload.title)
        .bind(&slug)
        .bind(&payload.description)
        .bind(payload.status.unwrap_or_default())
        .bind(creator_id)
        .execute(&mut *tx)
        .await?;
        let id = result.last_insert_rowid();

        replace_relations(&mut tx, id, &payload).await?;
        let series = load_series(&mut tx, id).await?;
        tx.commit().await?;
        debug!("Created series {id} ({slug})");
        Ok(series)
    }

    /// Full update, relations are replaced with the given lists
    pub async fn update(&self, id: i64, payload: CreateSeries) -> Result<Series> {
        let version = payload.version.ok_or_else(|| {
            debug!("No version provided");
            Error::MissingVersion
        })?;
        let mut tx = self.executor.begin().await?;

        if let Some(slug) = payload.slug.as_deref() {
            check_slug(&mut tx, slug, Some(id)).await?;
        }
        check_terms(&mut tx, "genre", &payload.genres).await?;
        check_terms(&mut tx, "tag", &payload.tags).await?;

        let result = sqlx::query(
            "UPDATE series SET title = ?, slug = COALESCE(?, slug), description = ?, \
             status = COALESCE(?, status), version = ?, modified = CURRENT_TIMESTAMP \
             WHERE id = ? AND version = ?",
        )
        .bind(&payload.title)
        .bind(&payload.slug)
        .bind(&payload.description)
        .bind(payload.status)
        .bind(version + 1)
        .bind(id)
        .bind(version)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::FailedUpdate { id, version });
        }

        replace_relations(&mut tx, id, &payload).await?;
        let series = load_series(&mut tx, id).await?;
        tx.commit().await?;
        Ok(series)
    }

    pub async fn get(&self, id: i64) -> Result<Series> {
        let mut conn = self.executor.acquire().await?;
        load_series(&mut *conn, id).await
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Series> {
        let mut conn = self.executor.acquire().await?;
        let row = sqlx::query_as::<_, SeriesRow>(&format!("{SELECT_SERIES} WHERE slug = ?"))
            .bind(slug)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| Error::RecordNotFound("Series".to_string()))?;
        with_relations(&mut *conn, row).await
    }

    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM series")
            .fetch_one(&self.executor)
            .await?;
        Ok(count as u64)
    }

    pub async fn list(&self, params: ListingParams) -> Result<Batch<SeriesShort>> {
        let order = params.ordering(VALID_ORDER_FIELDS)?;
        let rows = sqlx::query_as::<_, SeriesShort>(&format!(
            "{SELECT_SHORT} {order} LIMIT ? OFFSET ?"
        ))
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(&self.executor)
        .await?;
        let total = self.count().await?;
        Ok(Batch {
            offset: params.offset,
            limit: params.limit,
            total,
            rows,
        })
    }

    /// All series visible to readers (anything not draft)
    pub async fn list_public(&self) -> Result<Vec<SeriesShort>> {
        let rows = sqlx::query_as::<_, SeriesShort>(&format!(
            "{SELECT_SHORT} WHERE status != 'draft' ORDER BY title, id"
        ))
        .fetch(&self.executor)
        .try_collect::<Vec<_>>()
        .await?;
        Ok(rows)
    }

    pub async fn all_ids(&self) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar("SELECT id FROM series ORDER BY id")
            .fetch_all(&self.executor)
            .await?;
        Ok(ids)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let mut tx = self.executor.begin().await?;
        let res = sqlx::query("DELETE FROM series WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if res.rows_affected() == 0 {
            return Err(Error::RecordNotFound("Series".to_string()));
        }
        let remaining: i64 = sqlx::query_scalar(
            "SELECT (SELECT count(*) FROM series WHERE id = ?) + \
             (SELECT count(*) FROM page WHERE series_id = ?) + \
             (SELECT count(*) FROM chapter WHERE series_id = ?)",
        )
        .bind(id)
        .bind(id)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if remaining > 0 {
            return Err(Error::DeleteNotConfirmed {
                entity: "Series".to_string(),
                id,
            });
        }
        tx.commit().await?;
        Ok(())
    }
}
