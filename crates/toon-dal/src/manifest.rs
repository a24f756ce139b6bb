//! Public JSON documents describing published content
//!
//! Only published pages are included, their numbers and links are computed
//! over the published subset, so readers never see gaps.

use serde::Serialize;
use sqlx::{Acquire, Executor, Pool, types::Json};
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::{
    ChosenConnection, ChosenDB,
    chapter::Chapter,
    error::Result,
    media::MediaVariant,
    series::{Credit, SeriesStatus, load_series},
    stats::navigation::compute_links,
};

fn utc(dt: Option<PrimitiveDateTime>) -> Option<OffsetDateTime> {
    dt.map(|d| d.assume_utc())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComicSummary {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub page_count: i64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub latest_page_date: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComicInfo {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub status: SeriesStatus,
    pub credits: Vec<Credit>,
    pub genres: Vec<String>,
    pub tags: Vec<String>,
    pub total_pages: i64,
    pub total_chapters: i64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_published_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterEntry {
    pub id: i64,
    pub title: String,
    pub order: i64,
    pub page_count: i64,
    pub first_page: Option<i64>,
    pub last_page: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageEntry {
    pub media_id: i64,
    pub object_key: String,
    pub mime_type: String,
    pub width: i64,
    pub height: i64,
    pub alt_text: Option<String>,
    pub sizes: Vec<MediaVariant>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEntry {
    pub id: i64,
    pub chapter_id: Option<i64>,
    pub title: Option<String>,
    pub alt_text: Option<String>,
    pub page_number: i64,
    pub chapter_page_number: i64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_date: Option<OffsetDateTime>,
    pub previous_page_id: Option<i64>,
    pub next_page_id: Option<i64>,
    pub is_first: bool,
    pub is_last: bool,
    pub images: Vec<ImageEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestNavigation {
    pub first_page: Option<i64>,
    pub last_page: Option<i64>,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComicManifest {
    pub comic: ComicInfo,
    pub chapters: Vec<ChapterEntry>,
    pub pages: Vec<PageEntry>,
    pub navigation: ManifestNavigation,
}

#[derive(Debug, sqlx::FromRow)]
struct PublishedPage {
    id: i64,
    chapter_id: Option<i64>,
    title: Option<String>,
    alt_text: Option<String>,
    chapter_page_number: i64,
    published_date: Option<PrimitiveDateTime>,
}

#[derive(Debug, sqlx::FromRow)]
struct ImageRow {
    id: i64,
    object_key: String,
    mime_type: String,
    width: i64,
    height: i64,
    alt_text: Option<String>,
    sizes: Json<Vec<MediaVariant>>,
}

impl From<ImageRow> for ImageEntry {
    fn from(row: ImageRow) -> Self {
        ImageEntry {
            media_id: row.id,
            object_key: row.object_key,
            mime_type: row.mime_type,
            width: row.width,
            height: row.height,
            alt_text: row.alt_text,
            sizes: row.sizes.0,
        }
    }
}

async fn page_images(conn: &mut ChosenConnection, page_id: i64) -> Result<Vec<ImageEntry>> {
    let rows = sqlx::query_as::<_, ImageRow>(
        "SELECT m.id, m.object_key, m.mime_type, m.width, m.height, m.alt_text, m.sizes \
         FROM media m JOIN page_images pi ON pi.media_id = m.id \
         WHERE pi.page_id = ? ORDER BY pi.position, pi.id",
    )
    .bind(page_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(ImageEntry::from).collect())
}

fn chapter_entries(chapters: Vec<Chapter>, pages: &[PageEntry]) -> Vec<ChapterEntry> {
    chapters
        .into_iter()
        .filter_map(|c| {
            let numbers = pages
                .iter()
                .filter(|p| p.chapter_id == Some(c.id))
                .map(|p| p.page_number)
                .collect::<Vec<_>>();
            if numbers.is_empty() && c.is_unassigned {
                return None;
            }
            Some(ChapterEntry {
                id: c.id,
                title: c.title,
                order: c.chapter_order,
                page_count: numbers.len() as i64,
                first_page: numbers.iter().min().copied(),
                last_page: numbers.iter().max().copied(),
            })
        })
        .collect()
}

pub type ManifestBuilder = ManifestBuilderImpl<Pool<ChosenDB>>;

pub struct ManifestBuilderImpl<E> {
    executor: E,
}

impl<'c, E> ManifestBuilderImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB> + Acquire<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Comics visible to readers (not draft)
    pub async fn index(&self) -> Result<Vec<ComicSummary>> {
        let rows: Vec<(i64, String, String, i64, Option<PrimitiveDateTime>)> = sqlx::query_as(
            "SELECT id, slug, title, total_pages, last_published_at FROM series \
             WHERE status != 'draft' ORDER BY title, id",
        )
        .fetch_all(&self.executor)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, slug, title, page_count, latest)| ComicSummary {
                id,
                slug,
                title,
                page_count,
                latest_page_date: utc(latest),
            })
            .collect())
    }

    pub async fn comic(&self, series_id: i64) -> Result<ComicManifest> {
        let mut tx = self.executor.begin().await?;
        let series = load_series(&mut tx, series_id).await?;

        let published = sqlx::query_as::<_, PublishedPage>(
            "SELECT p.id, p.chapter_id, p.title, p.alt_text, p.chapter_page_number, p.published_date \
             FROM page p WHERE p.series_id = ? AND p.status = 'published' \
             ORDER BY p.global_page_number IS NULL, p.global_page_number, p.id",
        )
        .bind(series_id)
        .fetch_all(&mut *tx)
        .await?;
        let chapters = sqlx::query_as::<_, Chapter>(
            "SELECT id, series_id, title, chapter_order, is_unassigned, page_count, \
             first_global_page, last_global_page, version, created, modified \
             FROM chapter WHERE series_id = ? ORDER BY chapter_order, id",
        )
        .bind(series_id)
        .fetch_all(&mut *tx)
        .await?;

        let ids = published.iter().map(|p| p.id).collect::<Vec<_>>();
        let mut pages = Vec::with_capacity(published.len());
        for (idx, (page, (_, nav))) in published.into_iter().zip(compute_links(&ids)).enumerate() {
            let images = page_images(&mut tx, page.id).await?;
            pages.push(PageEntry {
                id: page.id,
                chapter_id: page.chapter_id,
                title: page.title,
                alt_text: page.alt_text,
                page_number: idx as i64 + 1,
                chapter_page_number: page.chapter_page_number,
                published_date: utc(page.published_date),
                previous_page_id: nav.previous_page_id,
                next_page_id: nav.next_page_id,
                is_first: nav.is_first,
                is_last: nav.is_last,
                images,
            });
        }
        tx.commit().await?;

        let navigation = ManifestNavigation {
            first_page: pages.first().map(|p| p.id),
            last_page: pages.last().map(|p| p.id),
            total_pages: pages.len() as i64,
        };
        Ok(ComicManifest {
            comic: ComicInfo {
                id: series.id,
                slug: series.slug,
                title: series.title,
                description: series.description,
                status: series.status,
                credits: series.credits,
                genres: series.genres.into_iter().map(|g| g.name).collect(),
                tags: series.tags.into_iter().map(|t| t.name).collect(),
                total_pages: series.stats.total_pages,
                total_chapters: series.stats.total_chapters,
                last_published_at: utc(series.stats.last_published_at),
            },
            chapters: chapter_entries(chapters, &pages),
            navigation,
            pages,
        })
    }
}
