use std::{
    fmt::Display,
    path::{Path, PathBuf},
    sync::Arc,
};

use bytes::Bytes;
use futures::{Stream, StreamExt as _, TryFutureExt as _, TryStreamExt as _, pin_mut};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tokio::{fs, io::AsyncWriteExt as _, task::spawn_blocking};
use tokio_util::io::ReaderStream;
use tracing::{debug, error};

use super::{
    Store, StoreInfo, StorePrefix, ValidPath,
    error::{StoreError, StoreResult},
};

const MAX_SAME_FILES: usize = 10;
const TMP_SUFFIX: &str = ".tmp";

#[inline]
fn hex(bytes: &[u8]) -> String {
    base16ct::lower::encode_string(bytes)
}

/// Alternative names for taken path: `name(1).ext`, `name(2).ext` ...
fn numbered_names(path: &str) -> impl Iterator<Item = String> + '_ {
    let (base, ext) = match path.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() && !base.ends_with('/') && !ext.contains('/') => {
            (base, Some(ext))
        }
        _ => (path, None),
    };
    (1..=MAX_SAME_FILES).map(move |i| match ext {
        Some(ext) => format!("{base}({i}).{ext}"),
        None => format!("{base}({i})"),
    })
}

async fn ensure_parent(path: &Path) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        match fs::metadata(parent).await {
            Ok(meta) if !meta.is_dir() => {
                error!("Parent is not a directory: {parent:?}");
                return Err(StoreError::InvalidPath);
            }
            Ok(_) => (),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                fs::create_dir_all(parent).await?;
            }
            Err(e) => {
                error!("Failed to stat parent: {parent:?}: {e}");
                return Err(e.into());
            }
        }
    }
    Ok(())
}

/// Free path in store, must be called under store lock
async fn unique_path(root: &Path, path: &str) -> StoreResult<PathBuf> {
    let full_path = root.join(path);
    if fs::metadata(&full_path).await.is_ok_and(|m| m.is_dir()) {
        return Err(StoreError::InvalidPath);
    }
    if !fs::try_exists(&full_path).await? {
        ensure_parent(&full_path).await?;
        return Ok(full_path);
    }
    for name in numbered_names(path) {
        let candidate = root.join(name);
        if !fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
    }
    Err(StoreError::PathConflict)
}

async fn cleanup<E: Display>(path: &Path, error: E) -> Result<(), E> {
    error!("Failed to store file to path {path:?}: {error}");
    if path.exists() {
        fs::remove_file(path)
            .await
            .map_err(|e| error!("Failed to remove file {path:?}: {e}"))
            .ok();
    }
    Err(error)
}

struct FileStoreInner {
    root: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

#[derive(Clone)]
pub struct FileStore {
    inner: Arc<FileStoreInner>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(FileStoreInner {
                root: root.into(),
                lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    fn relative_path(&self, path: &Path) -> StoreResult<ValidPath> {
        let relative = path
            .strip_prefix(&self.inner.root)
            .map_err(|_| StoreError::InvalidPath)?;
        let relative = relative.to_str().ok_or(StoreError::InvalidPath)?;
        ValidPath::new(relative)
    }

    fn info(&self, final_path: &Path, size: u64, hash: String) -> StoreResult<StoreInfo> {
        Ok(StoreInfo {
            final_path: self.relative_path(final_path)?,
            size,
            hash,
        })
    }
}

impl Store for FileStore {
    async fn store_data(&self, path: &ValidPath, data: &[u8]) -> StoreResult<StoreInfo> {
        let (final_path, mut new_file) = {
            let _lock = self.inner.lock.lock().await;
            let final_path = unique_path(&self.inner.root, path.as_ref()).await?;
            let new_file = fs::File::create(&final_path).await?;
            (final_path, new_file)
        };
        new_file
            .write_all(data)
            .or_else(|e| cleanup(&final_path, e))
            .await?;
        new_file.flush().await?;
        debug!("Stored {} bytes to {final_path:?}", data.len());
        self.info(&final_path, data.len() as u64, hex(&Sha256::digest(data)))
    }

    async fn store_data_overwrite(&self, path: &ValidPath, data: &[u8]) -> StoreResult<StoreInfo> {
        let final_path = self.inner.root.join(path.as_ref());
        ensure_parent(&final_path).await?;
        let folder = final_path
            .parent()
            .ok_or(StoreError::InvalidPath)?
            .to_path_buf();
        let content = data.to_vec();
        let target = final_path.clone();
        // written to temporary file in same folder, then atomically renamed
        spawn_blocking(move || -> StoreResult<()> {
            let mut tmp = NamedTempFile::new_in(folder)?;
            std::io::Write::write_all(&mut tmp, &content)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&target).map_err(|e| StoreError::from(e.error))?;
            Ok(())
        })
        .await??;
        self.info(&final_path, data.len() as u64, hex(&Sha256::digest(data)))
    }

    async fn store_stream<S, E>(&self, path: &ValidPath, stream: S) -> StoreResult<StoreInfo>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<StoreError>,
    {
        let tmp_path = {
            let mut name = self.inner.root.join(path.as_ref()).into_os_string();
            name.push(format!(".{}{TMP_SUFFIX}", uuid::Uuid::new_v4()));
            PathBuf::from(name)
        };
        ensure_parent(&tmp_path).await?;
        let mut file = fs::File::create(&tmp_path)
            .await
            .inspect_err(|e| error!("Failed to create tmp file {tmp_path:?}: {e}"))?;
        let mut size = 0;
        pin_mut!(stream);
        let mut digester = Sha256::new();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk.map_err(|e| e.into()) {
                Ok(chunk) => chunk,
                Err(e) => {
                    return cleanup(&tmp_path, e).await.and(Err(StoreError::InvalidPath));
                }
            };
            file.write_all(&chunk)
                .or_else(|e| cleanup(&tmp_path, e))
                .await?;
            size += chunk.len() as u64;
            digester.update(&chunk);
        }
        file.flush().await?;
        let final_path = {
            let _lock = self.inner.lock.lock().await;
            let final_path = unique_path(&self.inner.root, path.as_ref()).await?;
            fs::rename(&tmp_path, &final_path).await?;
            final_path
        };
        debug!("Stored {size} bytes to {final_path:?}");
        self.info(&final_path, size, hex(&digester.finalize()))
    }

    async fn load_data(
        &self,
        path: &ValidPath,
    ) -> Result<impl Stream<Item = StoreResult<Bytes>> + 'static, StoreError> {
        let final_path = self.inner.root.join(path.as_ref());
        let file = fs::File::open(&final_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(path.to_string())
            } else {
                e.into()
            }
        })?;
        let stream = ReaderStream::new(file).map_err(StoreError::from);
        Ok(stream)
    }

    async fn size(&self, path: &ValidPath) -> StoreResult<u64> {
        let final_path = self.inner.root.join(path.as_ref());
        let meta = fs::metadata(&final_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(path.to_string())
            } else {
                e.into()
            }
        })?;
        Ok(meta.len())
    }

    async fn exists(&self, path: &ValidPath) -> StoreResult<bool> {
        Ok(fs::try_exists(self.inner.root.join(path.as_ref())).await?)
    }

    async fn delete(&self, path: &ValidPath) -> StoreResult<()> {
        let full_path = self.inner.root.join(path.as_ref());
        let _lock = self.inner.lock.lock().await;
        match fs::remove_file(&full_path).await {
            Ok(()) => (),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(path.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        if fs::try_exists(&full_path).await? {
            error!("File {full_path:?} still exists after delete");
            return Err(StoreError::DeleteNotConfirmed(path.to_string()));
        }
        debug!("Deleted {path}");
        Ok(())
    }

    async fn list(&self, prefix: &StorePrefix) -> StoreResult<Vec<ValidPath>> {
        let start = self.inner.root.join(prefix.to_string());
        let mut found = Vec::new();
        let mut dirs = vec![start];
        while let Some(dir) = dirs.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    dirs.push(path);
                } else if file_type.is_file()
                    && !path.to_string_lossy().ends_with(TMP_SUFFIX)
                {
                    match self.relative_path(&path) {
                        Ok(valid) => found.push(valid),
                        Err(_) => debug!("Skipping unexpected file {path:?}"),
                    }
                }
            }
        }
        found.sort();
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use futures::stream::try_unfold;

    use super::*;

    #[test]
    fn test_numbered_names() {
        let names = numbered_names("media/page.png").take(2).collect::<Vec<_>>();
        assert_eq!(names, vec!["media/page(1).png", "media/page(2).png"]);
        let names = numbered_names("media/noext").take(1).collect::<Vec<_>>();
        assert_eq!(names, vec!["media/noext(1)"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 3)]
    async fn test_store() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let content = b"first page of the comic";
        let store = FileStore::new(tmp_dir.path());
        let store2 = store.clone();
        // store must be usable from other task
        let validated_path = ValidPath::new("media/page-1.png").unwrap();
        let validated_path2 = validated_path.clone();
        let handle =
            tokio::spawn(async move { store2.store_data(&validated_path2, content).await });
        let res = handle.await.unwrap().unwrap();
        assert_eq!(res.size, content.len() as u64);
        assert_eq!(res.final_path.as_ref(), "media/page-1.png");
        assert_eq!(res.hash.len(), 64);
        let res_path = store.root().join("media/page-1.png");
        assert_eq!(fs::read(res_path).await.unwrap(), content);

        let res2 = store.store_data(&validated_path, content).await.unwrap();
        assert_eq!(res2.final_path.as_ref(), "media/page-1(1).png");
        assert_eq!(res2.hash, res.hash);
    }

    #[tokio::test]
    async fn test_overwrite() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp_dir.path());
        let path = ValidPath::new("pub/moon/manifest.json").unwrap();
        store.store_data_overwrite(&path, b"{}").await.unwrap();
        let res = store
            .store_data_overwrite(&path, br#"{"pages":[]}"#)
            .await
            .unwrap();
        assert_eq!(res.final_path, path);
        assert_eq!(store.load_bytes(&path).await.unwrap(), br#"{"pages":[]}"#);
        let listed = store.list(&StorePrefix::Public).await.unwrap();
        assert_eq!(listed, vec![path]);
    }

    fn data_generator(size_kb: u8) -> impl Stream<Item = StoreResult<Bytes>> {
        try_unfold(size_kb, |mut count| async move {
            if count == 0 {
                Ok::<_, StoreError>(None)
            } else {
                let data = rand::random::<[u8; 1024]>();
                count -= 1;
                Ok(Some((Bytes::from(data.to_vec()), count)))
            }
        })
    }

    #[tracing_test::traced_test]
    #[tokio::test(flavor = "multi_thread", worker_threads = 3)]
    async fn test_stream_and_load() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp_dir.path());
        let validated_path = ValidPath::new("media/upload.bin").unwrap();
        let res = store
            .store_stream(&validated_path, data_generator(10))
            .await
            .unwrap();
        assert_eq!(res.final_path.as_ref(), "media/upload.bin");
        assert_eq!(res.size, 10240);
        assert_eq!(store.size(&validated_path).await.unwrap(), 10240);

        let data = store.load_bytes(&validated_path).await.unwrap();
        let original = fs::read(tmp_dir.path().join("media/upload.bin"))
            .await
            .unwrap();
        assert_eq!(data, original);
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp_dir.path());
        let a = ValidPath::new("media/a.png").unwrap();
        let b = ValidPath::new("pub/media/small/a.png").unwrap();
        store.store_data(&a, b"a").await.unwrap();
        store.store_data(&b, b"b").await.unwrap();

        assert_eq!(store.list(&StorePrefix::Media).await.unwrap(), vec![a.clone()]);
        assert_eq!(
            store
                .list(&StorePrefix::PublicMedia("small".to_string()))
                .await
                .unwrap(),
            vec![b.clone()]
        );
        assert!(
            store
                .list(&StorePrefix::PublicMedia("large".to_string()))
                .await
                .unwrap()
                .is_empty()
        );

        store.delete(&a).await.unwrap();
        assert!(!store.exists(&a).await.unwrap());
        assert!(matches!(
            store.delete(&a).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.load_data(&a).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(store.exists(&b).await.unwrap());
    }
}
