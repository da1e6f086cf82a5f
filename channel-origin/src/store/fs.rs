//! Filesystem content store.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<name>                  object bytes
//! <root>/.owners/<name>.owner    JSON owner record
//! ```
//!
//! Files are written to a dot-prefixed temporary name and renamed into
//! place, so readers never see a partial object. POST writes the owner
//! record before the object and DELETE removes the object before the
//! record; a crash can therefore leave a record without an object, never
//! an object that looks owned by nobody. Such stale records are swept when
//! the store is opened.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::locks::KeyLocks;
use super::{ContentStore, ObjectName, Owner};
use crate::error::{StoreError, StoreResult};

const OWNERS_DIR: &str = ".owners";
const OWNER_SUFFIX: &str = ".owner";
const TEMP_PREFIX: &str = ".tmp-";

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Content store rooted at a directory.
#[derive(Debug)]
pub struct FsStore {
    root: PathBuf,
    owners: PathBuf,
    locks: KeyLocks,
}

impl FsStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// Removes owner records whose object is gone and leftover temporary
    /// files from interrupted writes.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        let owners = root.join(OWNERS_DIR);
        fs::create_dir_all(&owners).await.map_err(io_error(&owners))?;

        let store = Self {
            root,
            owners,
            locks: KeyLocks::default(),
        };
        store.sweep().await?;

        tracing::info!("Opened filesystem store at {}", store.root.display());
        Ok(store)
    }

    /// Store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, name: &ObjectName) -> PathBuf {
        self.root.join(name.as_str())
    }

    fn owner_path(&self, name: &ObjectName) -> PathBuf {
        self.owners.join(format!("{name}{OWNER_SUFFIX}"))
    }

    async fn sweep(&self) -> StoreResult<()> {
        let mut removed = 0usize;

        let mut entries = fs::read_dir(&self.owners)
            .await
            .map_err(io_error(&self.owners))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(io_error(&self.owners))?
        {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };

            let stale = if file_name.starts_with(TEMP_PREFIX) {
                true
            } else if let Some(object) = file_name.strip_suffix(OWNER_SUFFIX) {
                !exists(&self.root.join(object)).await?
            } else {
                false
            };

            if stale {
                remove_if_present(&entry.path()).await?;
                removed += 1;
            }
        }

        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(io_error(&self.root))?;
        while let Some(entry) = entries.next_entry().await.map_err(io_error(&self.root))? {
            let is_temp = entry
                .file_name()
                .to_str()
                .is_some_and(|n| n.starts_with(TEMP_PREFIX));
            if is_temp {
                remove_if_present(&entry.path()).await?;
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::warn!("Removed {} stale files from store", removed);
        }
        Ok(())
    }

    async fn read_owner(&self, name: &ObjectName) -> StoreResult<Option<Owner>> {
        let path = self.owner_path(name);
        match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| StoreError::CorruptOwner { path, source }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    /// Remove the owner record of an object that is already gone.
    ///
    /// A record left behind is swept on the next open and is overwritten by
    /// the next POST, so failure here does not fail the delete.
    async fn discard_owner(&self, name: &ObjectName) {
        if let Err(e) = remove_if_present(&self.owner_path(name)).await {
            tracing::warn!("Deleted {} but kept its owner record: {}", name, e);
        }
    }

    /// Write `bytes` to `target` through a temporary file in `dir`.
    async fn write_atomic(&self, dir: &Path, target: &Path, bytes: &[u8]) -> StoreResult<()> {
        let temp = dir.join(format!("{TEMP_PREFIX}{}", uuid::Uuid::new_v4()));

        let result = async {
            fs::write(&temp, bytes).await.map_err(io_error(&temp))?;
            fs::rename(&temp, target).await.map_err(io_error(target))
        }
        .await;

        if result.is_err() {
            let _ = fs::remove_file(&temp).await;
        }
        result
    }
}

async fn exists(path: &Path) -> StoreResult<bool> {
    fs::try_exists(path).await.map_err(io_error(path))
}

async fn remove_if_present(path: &Path) -> StoreResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error(path)(e)),
    }
}

#[async_trait]
impl ContentStore for FsStore {
    async fn get(&self, url: &str) -> StoreResult<Vec<u8>> {
        let name = ObjectName::parse(url)?;
        let _guard = self.locks.lock(name.as_str()).await;
        let path = self.object_path(&name);
        match fs::read(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    async fn post(&self, url: &str, owner: &Owner, content: &[u8]) -> StoreResult<()> {
        let name = ObjectName::parse(url)?;
        let _guard = self.locks.lock(name.as_str()).await;

        let object = self.object_path(&name);
        if exists(&object).await? {
            return Err(StoreError::Conflict {
                name: name.to_string(),
            });
        }

        let marker = self.owner_path(&name);
        let record = serde_json::to_vec(owner).map_err(|source| StoreError::CorruptOwner {
            path: marker.clone(),
            source,
        })?;
        self.write_atomic(&self.owners, &marker, &record).await?;

        if let Err(e) = self.write_atomic(&self.root, &object, content).await {
            // Roll back so the name is not left claimed without content.
            if let Err(cleanup) = remove_if_present(&marker).await {
                tracing::warn!("Failed to roll back owner record for {}: {}", name, cleanup);
            }
            return Err(e);
        }

        tracing::debug!("Stored {} ({} bytes)", name, content.len());
        Ok(())
    }

    async fn delete(&self, url: &str, owner: &Owner) -> StoreResult<()> {
        let name = ObjectName::parse(url)?;
        let _guard = self.locks.lock(name.as_str()).await;

        let object = self.object_path(&name);
        if !exists(&object).await? {
            return Err(StoreError::NotFound {
                name: name.to_string(),
            });
        }

        if self.read_owner(&name).await?.as_ref() != Some(owner) {
            return Err(StoreError::Forbidden {
                name: name.to_string(),
            });
        }

        fs::remove_file(&object).await.map_err(io_error(&object))?;
        self.discard_owner(&name).await;

        tracing::debug!("Deleted {}", name);
        Ok(())
    }

    async fn owner_of(&self, url: &str) -> StoreResult<Option<Owner>> {
        let name = ObjectName::parse(url)?;
        let _guard = self.locks.lock(name.as_str()).await;

        if !exists(&self.object_path(&name)).await? {
            return Ok(None);
        }
        self.read_owner(&name).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::contract;
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn store() -> (TempDir, FsStore) {
        let dir = TempDir::new().unwrap();
        let store = FsStore::open(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let (_dir, store) = store().await;
        contract::get_missing_is_not_found(&store).await;
    }

    #[tokio::test]
    async fn post_then_get() {
        let (_dir, store) = store().await;
        contract::post_then_get(&store).await;
    }

    #[tokio::test]
    async fn second_post_conflicts() {
        let (_dir, store) = store().await;
        contract::second_post_conflicts(&store).await;
    }

    #[tokio::test]
    async fn delete_by_stranger_is_forbidden() {
        let (_dir, store) = store().await;
        contract::delete_by_stranger_is_forbidden(&store).await;
    }

    #[tokio::test]
    async fn delete_by_owner_removes_entry() {
        let (_dir, store) = store().await;
        contract::delete_by_owner_removes_entry(&store).await;
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let (_dir, store) = store().await;
        contract::delete_missing_is_not_found(&store).await;
    }

    #[tokio::test]
    async fn invalid_names_are_rejected() {
        let (_dir, store) = store().await;
        contract::invalid_names_are_rejected(&store).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_posts_to_distinct_names() {
        let (_dir, store) = store().await;
        contract::concurrent_posts_to_distinct_names(Arc::new(store)).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_posts_have_one_winner() {
        let (_dir, store) = store().await;
        contract::racing_posts_have_one_winner(Arc::new(store)).await;
    }

    #[tokio::test]
    async fn layout_on_disk() {
        let (dir, store) = store().await;
        let owner = Owner::new("7421", "hostA");
        store.post("/notes.txt", &owner, b"hello").await.unwrap();

        let object = std::fs::read(dir.path().join("notes.txt")).unwrap();
        assert_eq!(object, b"hello");

        let record = std::fs::read(dir.path().join(".owners/notes.txt.owner")).unwrap();
        let parsed: Owner = serde_json::from_slice(&record).unwrap();
        assert_eq!(parsed, owner);

        store.delete("notes.txt", &owner).await.unwrap();
        assert!(!dir.path().join("notes.txt").exists());
        assert!(!dir.path().join(".owners/notes.txt.owner").exists());
    }

    #[tokio::test]
    async fn objects_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let owner = Owner::new("7421", "hostA");
        {
            let store = FsStore::open(dir.path()).await.unwrap();
            store.post("notes.txt", &owner, b"hello").await.unwrap();
        }

        let store = FsStore::open(dir.path()).await.unwrap();
        assert_eq!(store.get("notes.txt").await.unwrap(), b"hello");
        assert_eq!(store.owner_of("notes.txt").await.unwrap(), Some(owner));
    }

    #[tokio::test]
    async fn hand_placed_files_are_read_only() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index"), b"<html></html>").unwrap();
        let store = FsStore::open(dir.path()).await.unwrap();

        assert_eq!(store.get("/").await.unwrap(), b"<html></html>");
        assert_eq!(store.owner_of("/").await.unwrap(), None);

        let result = store.delete("/", &Owner::new("", "")).await;
        assert!(matches!(result, Err(StoreError::Forbidden { .. })));
        assert!(dir.path().join("index").exists());
    }

    #[tokio::test]
    async fn open_sweeps_stale_files() {
        let dir = TempDir::new().unwrap();
        let owners = dir.path().join(OWNERS_DIR);
        std::fs::create_dir_all(&owners).unwrap();
        std::fs::write(owners.join("gone.owner"), br#"{"client_id":"1","client_info":"h"}"#)
            .unwrap();
        std::fs::write(owners.join(".tmp-abc"), b"partial").unwrap();
        std::fs::write(dir.path().join(".tmp-def"), b"partial").unwrap();
        std::fs::write(dir.path().join("kept"), b"body").unwrap();
        std::fs::write(owners.join("kept.owner"), br#"{"client_id":"1","client_info":"h"}"#)
            .unwrap();

        let store = FsStore::open(dir.path()).await.unwrap();

        assert!(!owners.join("gone.owner").exists());
        assert!(!owners.join(".tmp-abc").exists());
        assert!(!dir.path().join(".tmp-def").exists());
        assert_eq!(
            store.owner_of("kept").await.unwrap(),
            Some(Owner::new("1", "h"))
        );

        // The swept name can be claimed again.
        store
            .post("gone", &Owner::new("2", "h"), b"new")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn corrupt_owner_record_is_reported() {
        let (dir, store) = store().await;
        std::fs::write(dir.path().join("x"), b"body").unwrap();
        std::fs::write(dir.path().join(".owners/x.owner"), b"not json").unwrap();

        let result = store.delete("x", &Owner::new("1", "h")).await;
        assert!(matches!(result, Err(StoreError::CorruptOwner { .. })));
        assert!(dir.path().join("x").exists());
    }

    #[tokio::test]
    async fn stuck_owner_record_does_not_fail_delete() {
        let (dir, store) = store().await;
        let owner = Owner::new("7421", "hostA");
        store.post("notes.txt", &owner, b"hello").await.unwrap();
        std::fs::remove_file(dir.path().join("notes.txt")).unwrap();

        // A directory in place of the record cannot be removed as a file.
        let marker = dir.path().join(".owners/notes.txt.owner");
        std::fs::remove_file(&marker).unwrap();
        std::fs::create_dir(&marker).unwrap();
        std::fs::write(marker.join("pinned"), b"").unwrap();

        let name = ObjectName::parse("notes.txt").unwrap();
        store.discard_owner(&name).await;
        assert!(marker.is_dir());
        assert!(matches!(
            store.get("notes.txt").await,
            Err(StoreError::NotFound { .. })
        ));
    }
}
