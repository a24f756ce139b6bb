#![allow(async_fn_in_trait)]
use std::{fmt::Display, str::FromStr};

use bytes::Bytes;
use error::{StoreError, StoreResult};
use futures::{Stream, TryStreamExt as _};

pub mod error;
pub mod file_store;
use tracing::debug;

const MEDIA_PATH_PREFIX: &str = "media";
const PUBLIC_PATH_PREFIX: &str = "pub";

const MAX_PATH_LEN: usize = 4095;
const MAX_SEGMENT_LEN: usize = 255;
const MAX_PATH_DEPTH: usize = 10;
const PATH_INVALID_CHARS: &str = r#"/\:"#;

pub const INDEX_FILE: &str = "index.json";
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorePrefix {
    /// uploaded originals
    Media,
    /// everything readers can fetch
    Public,
    /// generated image variant of given size
    PublicMedia(String),
}

impl Display for StorePrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorePrefix::Media => f.write_str(MEDIA_PATH_PREFIX),
            StorePrefix::Public => f.write_str(PUBLIC_PATH_PREFIX),
            StorePrefix::PublicMedia(size) => {
                write!(f, "{PUBLIC_PATH_PREFIX}/{MEDIA_PATH_PREFIX}/{size}")
            }
        }
    }
}

fn is_segment_invalid(s: &str) -> bool {
    s.is_empty()
        || s.starts_with(".")
        || s.len() > MAX_SEGMENT_LEN
        || s.chars()
            .any(|c| PATH_INVALID_CHARS.contains(c) || c.is_ascii_control())
}

fn validate_path(path: &str) -> StoreResult<()> {
    if path.is_empty() || path.len() > MAX_PATH_LEN {
        return Err(StoreError::InvalidPath);
    }
    let segments = path.split('/').collect::<Vec<_>>();
    if segments.len() > MAX_PATH_DEPTH || segments.into_iter().any(is_segment_invalid) {
        Err(StoreError::InvalidPath)
    } else {
        Ok(())
    }
}

/// relative path, utf8, validated not to escape root and use . segments and some special chars
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValidPath(String);

impl ValidPath {
    pub fn new(path: impl Into<String>) -> StoreResult<Self> {
        let path = path.into();
        validate_path(path.as_str()).inspect_err(|_| debug!("Invalid path: {path}"))?;
        Ok(ValidPath(path))
    }

    pub fn with_prefix(self, prefix: StorePrefix) -> Self {
        ValidPath(format!("{}/{}", prefix, self.0))
    }

    pub fn has_prefix(&self, prefix: &StorePrefix) -> bool {
        self.0
            .strip_prefix(&prefix.to_string())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Last segment of the path
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl FromStr for ValidPath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ValidPath::new(s)
    }
}

impl AsRef<str> for ValidPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<ValidPath> for String {
    fn from(value: ValidPath) -> Self {
        value.0
    }
}

impl Display for ValidPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path for uploaded original, file name must be already sanitized
pub fn media_path(file_name: &str) -> StoreResult<ValidPath> {
    Ok(ValidPath::new(file_name)?.with_prefix(StorePrefix::Media))
}

pub fn variant_path(size: &str, file_name: &str) -> StoreResult<ValidPath> {
    Ok(ValidPath::new(file_name)?.with_prefix(StorePrefix::PublicMedia(size.to_string())))
}

pub fn index_path() -> ValidPath {
    ValidPath(format!("{PUBLIC_PATH_PREFIX}/{INDEX_FILE}"))
}

pub fn manifest_path(slug: &str) -> StoreResult<ValidPath> {
    Ok(ValidPath::new(format!("{slug}/{MANIFEST_FILE}"))?.with_prefix(StorePrefix::Public))
}

#[derive(Debug)]
pub struct StoreInfo {
    /// final path were the file is stored, can be different from the requested path
    pub final_path: ValidPath,
    pub size: u64,
    /// SHA256 hash
    pub hash: String,
}

pub trait Store {
    /// Never overwrites, stores under numbered name if path is taken
    async fn store_data(&self, path: &ValidPath, data: &[u8]) -> StoreResult<StoreInfo>;
    async fn store_data_overwrite(&self, path: &ValidPath, data: &[u8]) -> StoreResult<StoreInfo>;
    async fn store_stream<S, E>(&self, path: &ValidPath, stream: S) -> StoreResult<StoreInfo>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<StoreError>;
    async fn load_data(
        &self,
        path: &ValidPath,
    ) -> Result<impl Stream<Item = StoreResult<Bytes>> + 'static, StoreError>;
    async fn size(&self, path: &ValidPath) -> StoreResult<u64>;
    async fn exists(&self, path: &ValidPath) -> StoreResult<bool>;
    /// Removes object and checks it is really gone
    async fn delete(&self, path: &ValidPath) -> StoreResult<()>;
    /// All objects under prefix
    async fn list(&self, prefix: &StorePrefix) -> StoreResult<Vec<ValidPath>>;

    async fn load_bytes(&self, path: &ValidPath) -> StoreResult<Vec<u8>> {
        let data = self
            .load_data(path)
            .await?
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_path() {
        assert!(ValidPath::new("a/b/c").is_ok());
        assert!(ValidPath::new("a/b/c/").is_err());
        assert!(ValidPath::new("/a/b").is_err());
        assert!(ValidPath::new("a/b/c/..").is_err());
        assert!(ValidPath::new("a/.hidden").is_err());
        assert!(ValidPath::new("a:b").is_err());
    }

    #[test]
    fn test_prefixes() {
        let path = media_path("page-1.png").unwrap();
        assert_eq!(path.as_ref(), "media/page-1.png");
        assert!(path.has_prefix(&StorePrefix::Media));
        assert!(!path.has_prefix(&StorePrefix::Public));

        let path = variant_path("thumbnail", "page-1.png").unwrap();
        assert_eq!(path.as_ref(), "pub/media/thumbnail/page-1.png");
        assert!(path.has_prefix(&StorePrefix::Public));
        assert_eq!(path.file_name(), "page-1.png");

        assert_eq!(index_path().as_ref(), "pub/index.json");
        assert_eq!(
            manifest_path("moon-harbor").unwrap().as_ref(),
            "pub/moon-harbor/manifest.json"
        );
        assert!(manifest_path("../etc").is_err());
    }
}
