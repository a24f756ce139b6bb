//! Uploaded images: original goes to `media/`, generated sizes to `pub/media/{size}/`

use sha2::{Digest, Sha256};
use tokio::task::spawn_blocking;
use toon_dal::media::{CreateMedia, Media, MediaRepository, MediaVariant};
use toon_image::{ImageSize, VARIANT_EXTENSION, VARIANT_MIME_TYPE, Variant};
use toon_store::{Store, ValidPath, error::StoreError, media_path, variant_path};
use toon_types::utils::naming::object_name;
use tracing::{debug, error};

use crate::error::{ApiError, ApiResult};

#[derive(Debug)]
pub struct Upload {
    pub original_name: String,
    pub alt_text: Option<String>,
    pub created_by: Option<i64>,
    pub data: bytes::Bytes,
}

#[derive(Debug)]
pub struct Ingested {
    pub media: Media,
    /// false when identical image was already stored
    pub created: bool,
}

fn variant_file_name(original: &ValidPath) -> String {
    let name = original.file_name();
    let stem = name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name);
    format!("{stem}.{VARIANT_EXTENSION}")
}

async fn store_variant<S: Store>(
    store: &S,
    original: &ValidPath,
    variant: Variant,
) -> ApiResult<MediaVariant> {
    let path = variant_path(variant.size.name(), &variant_file_name(original))?;
    let info = store.store_data(&path, &variant.data).await?;
    Ok(MediaVariant {
        name: variant.size.name().to_string(),
        width: variant.width,
        height: variant.height,
        object_key: info.final_path.into(),
        file_size: info.size,
        mime_type: VARIANT_MIME_TYPE.to_string(),
    })
}

/// Stores original, registers media and generates all sizes.
/// Size that fails to generate or store is logged and left out.
pub async fn ingest<S: Store>(
    repository: &MediaRepository,
    store: &S,
    upload: Upload,
) -> ApiResult<Ingested> {
    if upload.data.is_empty() {
        return Err(ApiError::InvalidRequest("Empty upload".to_string()));
    }
    let hash = base16ct::lower::encode_string(&Sha256::digest(&upload.data));
    if let Some(media) = repository.find_by_hash(&hash).await? {
        debug!("Image {} already stored as media {}", upload.original_name, media.id);
        return Ok(Ingested {
            media,
            created: false,
        });
    }

    let data = upload.data.clone();
    let info = spawn_blocking(move || toon_image::image_info(&data))
        .await?
        .map_err(|e| ApiError::UnprocessableRequest(format!("Not a supported image: {e}")))?;

    let path = media_path(&object_name(&upload.original_name))?;
    let stored = store.store_data(&path, &upload.data).await?;
    let original = stored.final_path.clone();

    let payload = CreateMedia {
        object_key: stored.final_path.into(),
        original_name: Some(upload.original_name),
        mime_type: info.mime_type,
        file_size: stored.size as i64,
        width: info.width as i64,
        height: info.height as i64,
        alt_text: upload.alt_text,
        hash,
        created_by: upload.created_by,
    };
    let media = match repository.create(payload).await {
        Ok(media) => media,
        Err(e) => {
            if let Err(e) = store.delete(&original).await {
                error!("Cannot remove orphaned original {original}: {e}");
            }
            return Err(e.into());
        }
    };

    let data = upload.data;
    let generated = spawn_blocking(move || toon_image::generate_variants(&data))
        .await?
        .map_err(|e| ApiError::ImageError(e.to_string()))?;
    let mut variants = Vec::with_capacity(generated.len());
    for (size, variant) in generated {
        let variant = match variant {
            Ok(variant) => variant,
            Err(e) => {
                error!("Cannot generate {size} of media {}: {e}", media.id);
                continue;
            }
        };
        match store_variant(store, &original, variant).await {
            Ok(v) => variants.push(v),
            Err(e) => error!("Cannot store {size} of media {}: {e}", media.id),
        }
    }
    let media = repository.set_variants(media.id, variants).await?;
    debug!("Ingested media {} with {} sizes", media.id, media.sizes.len());
    Ok(Ingested {
        media,
        created: true,
    })
}

/// Object keys of the original and all its sizes
pub fn media_objects(media: &Media) -> Vec<String> {
    std::iter::once(media.object_key.clone())
        .chain(media.sizes.iter().map(|v| v.object_key.clone()))
        .collect()
}

/// Removes objects from store, already missing objects are skipped
pub async fn delete_objects<S: Store>(store: &S, keys: &[String]) -> ApiResult<u64> {
    let mut deleted = 0;
    for key in keys {
        let path = ValidPath::new(key.as_str())?;
        match store.delete(&path).await {
            Ok(()) => deleted += 1,
            Err(StoreError::NotFound(_)) => debug!("Object {key} already gone"),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(deleted)
}

/// Deletes media record, then its objects
pub async fn remove<S: Store>(repository: &MediaRepository, store: &S, id: i64) -> ApiResult<Media> {
    let media = repository.delete(id).await?;
    delete_objects(store, &media_objects(&media)).await?;
    Ok(media)
}

/// Objects under media prefixes not referenced by any media record
pub async fn unreferenced_objects<S: Store>(
    repository: &MediaRepository,
    store: &S,
) -> ApiResult<Vec<ValidPath>> {
    let known = repository
        .object_keys()
        .await?
        .into_iter()
        .collect::<std::collections::HashSet<_>>();
    let mut prefixes = vec![toon_store::StorePrefix::Media];
    prefixes.extend(
        ImageSize::ALL
            .iter()
            .map(|s| toon_store::StorePrefix::PublicMedia(s.name().to_string())),
    );
    let mut orphans = Vec::new();
    for prefix in prefixes {
        for path in store.list(&prefix).await? {
            if !known.contains(path.as_ref()) {
                orphans.push(path);
            }
        }
    }
    Ok(orphans)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgb, RgbImage};
    use sqlx::sqlite::SqlitePoolOptions;
    use toon_store::file_store::FileStore;

    use super::*;

    fn sample_png() -> bytes::Bytes {
        let img = RgbImage::from_fn(640, 320, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 7]));
        let mut data = Cursor::new(Vec::new());
        img.write_to(&mut data, ImageFormat::Png).unwrap();
        data.into_inner().into()
    }

    async fn init_db() -> toon_dal::Pool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        toon_dal::migrate(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_ingest_and_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());
        let pool = init_db().await;
        let repository = MediaRepository::new(pool.clone());

        let upload = || Upload {
            original_name: "Page 01.PNG".to_string(),
            alt_text: Some("harbor at night".to_string()),
            created_by: None,
            data: sample_png(),
        };
        let ingested = ingest(&repository, &store, upload()).await.unwrap();
        assert!(ingested.created);
        let media = ingested.media;
        assert_eq!(media.object_key, "media/page-01.png");
        assert_eq!((media.width, media.height), (640, 320));
        assert_eq!(media.sizes.len(), 4);
        let thumb = media.variant("thumbnail").unwrap();
        assert_eq!(thumb.object_key, "pub/media/thumbnail/page-01.png");
        assert_eq!((thumb.width, thumb.height), (150, 75));
        // never upscaled
        let large = media.variant("large").unwrap();
        assert_eq!((large.width, large.height), (640, 320));

        let again = ingest(&repository, &store, upload()).await.unwrap();
        assert!(!again.created);
        assert_eq!(again.media.id, media.id);

        let stray = ValidPath::new("media/stray.png").unwrap();
        store.store_data(&stray, b"stray").await.unwrap();
        let orphans = unreferenced_objects(&repository, &store).await.unwrap();
        assert_eq!(orphans, vec![stray]);

        remove(&repository, &store, media.id).await.unwrap();
        for key in media_objects(&media) {
            assert!(!store.exists(&ValidPath::new(key).unwrap()).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_reject_non_image() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());
        let repository = MediaRepository::new(init_db().await);
        let upload = Upload {
            original_name: "notes.txt".to_string(),
            alt_text: None,
            created_by: None,
            data: bytes::Bytes::from_static(b"just some text"),
        };
        let res = ingest(&repository, &store, upload).await;
        assert!(matches!(res, Err(ApiError::UnprocessableRequest(_))));
        assert!(
            store
                .list(&toon_store::StorePrefix::Media)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
