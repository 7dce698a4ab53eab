//! Tests for custom FileSystem implementations
//!
//! These verify that every type needed to implement another backing is
//! exported, and that such a backing gets a working `walk` from the trait's
//! default implementation.

use memvfs::{
    DirEntry, Error, FileHandle, FileSystem, FileType, InMemoryFs, Metadata, OpenOptions, Result,
    VfsPath, WalkControl, async_trait,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

/// A minimal flat-map backing: path -> optional file contents.
/// `None` marks a directory.
struct MinimalFs {
    entries: RwLock<BTreeMap<String, Option<Arc<Mutex<Vec<u8>>>>>>,
}

impl MinimalFs {
    fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert("/".to_string(), None);
        Self {
            entries: RwLock::new(entries),
        }
    }

    fn key(path: &Path) -> Result<(String, Option<String>)> {
        let path = VfsPath::new(path)?;
        let parent = path.split_last().map(|(parent, _)| parent.to_string());
        Ok((path.to_string(), parent))
    }

    fn metadata(entry: &Option<Arc<Mutex<Vec<u8>>>>) -> Metadata {
        match entry {
            Some(data) => Metadata {
                size: data.lock().unwrap().len() as u64,
                ..Metadata::default()
            },
            None => Metadata {
                file_type: FileType::Directory,
                mode: 0o755,
                ..Metadata::default()
            },
        }
    }
}

struct MinimalHandle {
    path: PathBuf,
    data: Arc<Mutex<Vec<u8>>>,
    cursor: usize,
    closed: bool,
}

#[async_trait]
impl FileHandle for MinimalHandle {
    async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.closed {
            return Err(Error::Closed);
        }
        let mut data = self.data.lock().unwrap();
        let end = self.cursor + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[self.cursor..end].copy_from_slice(buf);
        self.cursor = end;
        Ok(buf.len())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.closed {
            return Err(Error::Closed);
        }
        let data = self.data.lock().unwrap();
        let n = buf.len().min(data.len().saturating_sub(self.cursor));
        buf[..n].copy_from_slice(&data[self.cursor..self.cursor + n]);
        self.cursor += n;
        Ok(n)
    }

    async fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        match pos {
            SeekFrom::Start(offset) => self.cursor = offset as usize,
            _ => return Err(Error::InvalidInput("only SeekFrom::Start".to_string())),
        }
        Ok(self.cursor as u64)
    }

    async fn set_len(&mut self, size: u64) -> Result<()> {
        self.data.lock().unwrap().resize(size as usize, 0);
        Ok(())
    }

    async fn stat(&self) -> Result<Metadata> {
        Ok(MinimalFs::metadata(&Some(Arc::clone(&self.data))))
    }

    fn path(&self) -> PathBuf {
        self.path.clone()
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        self.closed = true;
        Ok(())
    }
}

#[async_trait]
impl FileSystem for MinimalFs {
    async fn mkdir(&self, path: &Path, _mode: u32) -> Result<()> {
        let (key, parent) = Self::key(path)?;
        let mut entries = self.entries.write().unwrap();
        if entries.contains_key(&key) {
            return Err(Error::AlreadyExists(path.to_path_buf()));
        }
        match parent.and_then(|p| entries.get(&p).cloned()) {
            Some(None) => {
                entries.insert(key, None);
                Ok(())
            }
            Some(Some(_)) => Err(Error::NotADirectory(path.to_path_buf())),
            None => Err(Error::NotFound(path.to_path_buf())),
        }
    }

    async fn mkdir_all(&self, path: &Path, mode: u32) -> Result<()> {
        let full = VfsPath::new(path)?;
        let mut current = VfsPath::root();
        for name in full.components() {
            current = current.join(name);
            match self.mkdir(&current.to_path_buf(), mode).await {
                Ok(()) => {}
                Err(err) if err.is_already_exists() => {
                    if !self.stat(&current.to_path_buf()).await?.is_dir() {
                        return Err(Error::NotADirectory(path.to_path_buf()));
                    }
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    async fn create(&self, path: &Path) -> Result<Box<dyn FileHandle>> {
        let (key, parent) = Self::key(path)?;
        let mut entries = self.entries.write().unwrap();
        if !matches!(parent.and_then(|p| entries.get(&p).cloned()), Some(None)) {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        let data = Arc::new(Mutex::new(Vec::new()));
        entries.insert(key.clone(), Some(Arc::clone(&data)));
        Ok(Box::new(MinimalHandle {
            path: PathBuf::from(key),
            data,
            cursor: 0,
            closed: false,
        }))
    }

    async fn open(&self, path: &Path) -> Result<Box<dyn FileHandle>> {
        let (key, _) = Self::key(path)?;
        let entries = self.entries.read().unwrap();
        match entries.get(&key) {
            Some(Some(data)) => Ok(Box::new(MinimalHandle {
                path: PathBuf::from(key.clone()),
                data: Arc::clone(data),
                cursor: 0,
                closed: false,
            })),
            Some(None) => Err(Error::IsADirectory(path.to_path_buf())),
            None => Err(Error::NotFound(path.to_path_buf())),
        }
    }

    async fn open_file(&self, path: &Path, options: &OpenOptions) -> Result<Box<dyn FileHandle>> {
        options.validate()?;
        self.open(path).await
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        let (key, _) = Self::key(path)?;
        let mut entries = self.entries.write().unwrap();
        let prefix = format!("{}/", key.trim_end_matches('/'));
        if entries.keys().any(|k| k.starts_with(&prefix)) {
            return Err(Error::NotEmpty(path.to_path_buf()));
        }
        entries
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(path.to_path_buf()))
    }

    async fn remove_all(&self, path: &Path) -> Result<()> {
        let (key, _) = Self::key(path)?;
        let prefix = format!("{}/", key);
        self.entries
            .write()
            .unwrap()
            .retain(|k, _| k != &key && !k.starts_with(&prefix));
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<Metadata> {
        let (key, _) = Self::key(path)?;
        let entries = self.entries.read().unwrap();
        entries
            .get(&key)
            .map(Self::metadata)
            .ok_or_else(|| Error::NotFound(path.to_path_buf()))
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let (key, _) = Self::key(path)?;
        let entries = self.entries.read().unwrap();
        let mut result = Vec::new();
        for (entry_key, entry) in entries.iter() {
            let (child, parent) = Self::key(Path::new(entry_key))?;
            if parent.as_deref() == Some(key.as_str()) {
                let name = child.rsplit('/').next().unwrap_or_default().to_string();
                result.push(DirEntry {
                    name,
                    metadata: Self::metadata(entry),
                });
            }
        }
        Ok(result)
    }

    async fn chmod(&self, _path: &Path, _mode: u32) -> Result<()> {
        Ok(())
    }
}

async fn populate(fs: &dyn FileSystem) -> Result<()> {
    fs.mkdir_all(Path::new("/data/a"), 0o755).await?;
    fs.mkdir_all(Path::new("/data/b/c"), 0o755).await?;
    for path in ["/data/a/1.txt", "/data/b/2.txt", "/data/b/c/3.txt"] {
        let mut f = fs.create(Path::new(path)).await?;
        f.write_all(path.as_bytes()).await?;
        f.close().await?;
    }
    Ok(())
}

async fn walked(fs: &dyn FileSystem, root: &str, skip: Option<&str>) -> Vec<String> {
    let mut seen = Vec::new();
    fs.walk(Path::new(root), &mut |path, _| {
        seen.push(path.display().to_string());
        if path.to_str() == skip {
            WalkControl::SkipSubtree
        } else {
            WalkControl::Continue
        }
    })
    .await
    .unwrap();
    seen
}

#[tokio::test]
async fn test_custom_fs_default_walk_matches_in_memory() {
    let custom: Arc<dyn FileSystem> = Arc::new(MinimalFs::new());
    let memory: Arc<dyn FileSystem> = Arc::new(InMemoryFs::new());
    populate(custom.as_ref()).await.unwrap();
    populate(memory.as_ref()).await.unwrap();

    let expected = vec![
        "/data",
        "/data/a",
        "/data/a/1.txt",
        "/data/b",
        "/data/b/2.txt",
        "/data/b/c",
        "/data/b/c/3.txt",
    ];
    assert_eq!(walked(custom.as_ref(), "/data", None).await, expected);
    assert_eq!(walked(memory.as_ref(), "/data", None).await, expected);
}

#[tokio::test]
async fn test_custom_fs_default_walk_prunes() {
    let fs = MinimalFs::new();
    populate(&fs).await.unwrap();
    assert_eq!(
        walked(&fs, "/data", Some("/data/b")).await,
        vec!["/data", "/data/a", "/data/a/1.txt", "/data/b"]
    );
}

#[tokio::test]
async fn test_custom_fs_default_walk_aborts() {
    let fs = MinimalFs::new();
    populate(&fs).await.unwrap();
    let mut visited = 0;
    fs.walk(Path::new("/data"), &mut |_, _| {
        visited += 1;
        if visited == 2 {
            WalkControl::Abort
        } else {
            WalkControl::Continue
        }
    })
    .await
    .unwrap();
    assert_eq!(visited, 2);
}

#[tokio::test]
async fn test_custom_fs_default_exists() {
    let fs = MinimalFs::new();
    populate(&fs).await.unwrap();
    assert!(fs.exists(Path::new("/data/b/c")).await.unwrap());
    assert!(!fs.exists(Path::new("/data/zzz")).await.unwrap());
}

#[tokio::test]
async fn test_default_walk_missing_root() {
    let fs = MinimalFs::new();
    let err = fs
        .walk(Path::new("/nope"), &mut |_, _| WalkControl::Continue)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
