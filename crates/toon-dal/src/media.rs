use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, types::Json};
use tracing::debug;

use crate::{Batch, ChosenDB, Error, ListingParams, error::Result};

const VALID_ORDER_FIELDS: &[&str] = &["id", "original_name", "file_size", "created"];

/// Generated rendition of an image, kept only inside media's sizes document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaVariant {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub object_key: String,
    pub file_size: u64,
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateMedia {
    #[garde(length(min = 1, max = 1024))]
    pub object_key: String,
    #[garde(length(max = 255))]
    pub original_name: Option<String>,
    #[garde(length(min = 3, max = 255))]
    pub mime_type: String,
    #[garde(range(min = 0))]
    pub file_size: i64,
    #[garde(range(min = 1))]
    pub width: i64,
    #[garde(range(min = 1))]
    pub height: i64,
    #[garde(length(max = 2000))]
    pub alt_text: Option<String>,
    #[garde(length(min = 1, max = 255))]
    pub hash: String,
    #[garde(skip)]
    pub created_by: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Media {
    pub id: i64,
    pub object_key: String,
    pub original_name: Option<String>,
    pub mime_type: String,
    pub file_size: i64,
    pub width: i64,
    pub height: i64,
    pub alt_text: Option<String>,
    pub hash: String,
    pub sizes: Json<Vec<MediaVariant>>,
    pub created_by: Option<i64>,
    pub created: time::PrimitiveDateTime,
}

impl Media {
    pub fn variant(&self, name: &str) -> Option<&MediaVariant> {
        self.sizes.iter().find(|v| v.name == name)
    }
}

const SELECT_MEDIA: &str = "SELECT id, object_key, original_name, mime_type, file_size, width, \
     height, alt_text, hash, sizes, created_by, created FROM media";

pub type MediaRepository = MediaRepositoryImpl<Pool<ChosenDB>>;

pub struct MediaRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> MediaRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateMedia) -> Result<Media> {
        let res = sqlx::query(
            "INSERT INTO media (object_key, original_name, mime_type, file_size, width, height, \
             alt_text, hash, created_by) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&payload.object_key)
        .bind(&payload.original_name)
        .bind(&payload.mime_type)
        .bind(payload.file_size)
        .bind(payload.width)
        .bind(payload.height)
        .bind(&payload.alt_text)
        .bind(&payload.hash)
        .bind(payload.created_by)
        .execute(&self.executor)
        .await?;
        self.get(res.last_insert_rowid()).await
    }

    /// Replaces whole variants document
    pub async fn set_variants(&self, id: i64, variants: Vec<MediaVariant>) -> Result<Media> {
        let res = sqlx::query("UPDATE media SET sizes = ? WHERE id = ?")
            .bind(Json(variants))
            .bind(id)
            .execute(&self.executor)
            .await?;
        if res.rows_affected() == 0 {
            return Err(Error::RecordNotFound("Media".to_string()));
        }
        self.get(id).await
    }

    pub async fn get(&self, id: i64) -> Result<Media> {
        sqlx::query_as::<_, Media>(&format!("{SELECT_MEDIA} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.executor)
            .await?
            .ok_or_else(|| Error::RecordNotFound("Media".to_string()))
    }

    pub async fn find_by_hash(&self, hash: &str) -> Result<Option<Media>> {
        let media = sqlx::query_as::<_, Media>(&format!("{SELECT_MEDIA} WHERE hash = ? LIMIT 1"))
            .bind(hash)
            .fetch_optional(&self.executor)
            .await?;
        Ok(media)
    }

    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM media")
            .fetch_one(&self.executor)
            .await?;
        Ok(count as u64)
    }

    pub async fn list(&self, params: ListingParams) -> Result<Batch<Media>> {
        let order = params.ordering(VALID_ORDER_FIELDS)?;
        let rows = sqlx::query_as::<_, Media>(&format!("{SELECT_MEDIA} {order} LIMIT ? OFFSET ?"))
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

    /// Object keys of originals and all variants known to database
    pub async fn object_keys(&self) -> Result<Vec<String>> {
        let rows: Vec<(String, Json<Vec<MediaVariant>>)> =
            sqlx::query_as("SELECT object_key, sizes FROM media")
                .fetch_all(&self.executor)
                .await?;
        let keys = rows
            .into_iter()
            .flat_map(|(key, sizes)| {
                std::iter::once(key).chain(sizes.0.into_iter().map(|v| v.object_key))
            })
            .collect();
        Ok(keys)
    }

    /// Media used by a page cannot be deleted
    pub async fn delete(&self, id: i64) -> Result<Media> {
        let media = self.get(id).await?;
        let used: i64 = sqlx::query_scalar("SELECT count(*) FROM page_images WHERE media_id = ?")
            .bind(id)
            .fetch_one(&self.executor)
            .await?;
        if used > 0 {
            return Err(Error::InvalidOperation(format!(
                "media {id} is used by {used} page(s)"
            )));
        }
        sqlx::query("DELETE FROM media WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;
        let remaining: i64 = sqlx::query_scalar("SELECT count(*) FROM media WHERE id = ?")
            .bind(id)
            .fetch_one(&self.executor)
            .await?;
        if remaining > 0 {
            return Err(Error::DeleteNotConfirmed {
                entity: "Media".to_string(),
                id,
            });
        }
        debug!("Deleted media {id} ({})", media.object_key);
        Ok(media)
    }
}
