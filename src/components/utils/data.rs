//! JSON file backed data.
//!
//! A [`Data`] holds the whole content of one JSON file in memory. Readers share the
//! lock, writers are serialized: [`Data::update`] keeps the exclusive lock from the
//! modification until the file is written, so two read-modify-write sequences on the
//! same file never interleave.

use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug)]
pub struct Data<T> {
    value: RwLock<T>,
    path: PathBuf,
}

impl<T> Data<T> {
    pub fn new<P: AsRef<Path>>(path: P, data: T) -> Self {
        Self { value: RwLock::new(data), path: path.as_ref().to_path_buf() }
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T: DeserializeOwned> Data<T> {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file_content = std::fs::read_to_string(&path)
            .map_err(|source| Error::Io { path: path.clone(), source })?;
        let data = serde_json::from_str(&file_content)
            .map_err(|source| Error::Serde { path: path.clone(), source })?;
        Ok(Self { value: RwLock::new(data), path })
    }
}

impl<T: DeserializeOwned + Default> Data<T> {
    /// Load the file, or start from `T::default()` when it does not exist yet.
    /// An empty file counts as absent.
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => Ok(Self::new(path, T::default())),
            Ok(_) => Self::from_file(path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new(path, T::default())),
            Err(source) => Err(Error::Io { path: path.to_path_buf(), source }),
        }
    }
}

impl<T: Serialize + Clone> Data<T> {
    /// Run `f` against the current value.
    pub async fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&*self.value.read().await)
    }
    pub async fn snapshot(&self) -> T {
        self.value.read().await.clone()
    }
    /// Modify the value and write it through to the file.
    ///
    /// `f` works on a copy; the copy replaces the in-memory value only once the file
    /// has been written, so a failed write leaves both untouched.
    pub async fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, Error> {
        let mut guard = self.value.write().await;
        let mut next = guard.clone();
        let result = f(&mut next);
        self.save(&next).await?;
        *guard = next;
        Ok(result)
    }
    async fn save(&self, value: &T) -> Result<(), Error> {
        let content = serde_json::to_string_pretty(value)
            .map_err(|source| Error::Serde { path: self.path.clone(), source })?;
        let io_err = |source| Error::Io { path: self.path.clone(), source };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, content).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn missing_file_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        let data: Data<Vec<u64>> = Data::from_file_or_default(dir.path().join("absent.json")).unwrap();
        assert!(data.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn update_writes_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("map.json");
        let data: Data<BTreeMap<u64, String>> = Data::from_file_or_default(&path).unwrap();
        let previous = data.update(|m| m.insert(7, "seven".to_string())).await.unwrap();
        assert!(previous.is_none());

        let reloaded: Data<BTreeMap<u64, String>> = Data::from_file(&path).unwrap();
        assert_eq!(reloaded.snapshot().await, data.snapshot().await);
        assert_eq!(reloaded.read(|m| m.get(&7).cloned()).await.as_deref(), Some("seven"));
    }

    #[tokio::test]
    async fn failed_write_keeps_memory() {
        let dir = tempfile::tempdir().unwrap();
        // The target is a directory, so the final rename fails.
        let path = dir.path().join("blocked");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("inner"), "x").unwrap();
        let data: Data<Vec<u64>> = Data::new(&path, vec![1]);
        assert!(data.update(|v| v.push(2)).await.is_err());
        assert_eq!(data.snapshot().await, vec![1]);
    }

    #[test]
    fn invalid_json_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let res: Result<Data<Vec<u64>>, _> = Data::from_file_or_default(&path);
        assert!(matches!(res, Err(Error::Serde { .. })));
    }
}
