//! Writing of public JSON documents into the store

use std::collections::HashSet;

use serde::Serialize;
use time::{OffsetDateTime, PrimitiveDateTime};
use toon_dal::{Pool, manifest::ManifestBuilder, page::PageRepository, stats::StatsPipeline};
use toon_store::{MANIFEST_FILE, Store, StorePrefix, ValidPath, index_path, manifest_path};
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Default, Serialize)]
pub struct PublishReport {
    /// Series with scheduled pages which became published
    pub released: Vec<i64>,
    pub manifests: u64,
    pub removed: u64,
}

fn now() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

async fn write_json<S, T>(store: &S, path: &ValidPath, value: &T) -> ApiResult<()>
where
    S: Store,
    T: Serialize,
{
    let data = serde_json::to_vec_pretty(value)
        .map_err(|e| ApiError::InternalError(format!("Cannot serialize {path}: {e}")))?;
    store.store_data_overwrite(path, &data).await?;
    debug!("Written {path}");
    Ok(())
}

/// Slug of `pub/{slug}/manifest.json`
fn manifest_slug(path: &ValidPath) -> Option<&str> {
    let mut segments = path.as_ref().split('/');
    match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(slug), Some(MANIFEST_FILE), None) => Some(slug),
        _ => None,
    }
}

/// Releases scheduled pages that are due, then rewrites index and manifests of all
/// series visible to readers. Manifests of series no longer visible are removed.
pub async fn publish_all<S: Store>(pool: &Pool, store: &S) -> ApiResult<PublishReport> {
    let mut report = PublishReport::default();
    let pipeline = StatsPipeline::new(pool.clone());
    report.released = PageRepository::new(pool.clone()).publish_due(now()).await?;
    for series_id in &report.released {
        pipeline.after_mutation(*series_id).await;
    }

    let builder = ManifestBuilder::new(pool.clone());
    let index = builder.index().await?;
    write_json(store, &index_path(), &index).await?;

    let mut published = HashSet::with_capacity(index.len());
    for comic in &index {
        let manifest = builder.comic(comic.id).await?;
        write_json(store, &manifest_path(&comic.slug)?, &manifest).await?;
        published.insert(comic.slug.as_str());
        report.manifests += 1;
    }

    for path in store.list(&StorePrefix::Public).await? {
        if let Some(slug) = manifest_slug(&path) {
            if !published.contains(slug) {
                store.delete(&path).await?;
                report.removed += 1;
            }
        }
    }
    info!(
        "Published {} manifests, removed {}, released pages in {} series",
        report.manifests,
        report.removed,
        report.released.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_slug() {
        let path = manifest_path("moon-harbor").unwrap();
        assert_eq!(manifest_slug(&path), Some("moon-harbor"));
        assert_eq!(manifest_slug(&index_path()), None);
        let variant = ValidPath::new("pub/media/small/manifest.json").unwrap();
        assert_eq!(manifest_slug(&variant), None);
    }
}
