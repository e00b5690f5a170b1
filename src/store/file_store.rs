//! An item store that keeps the whole collection in a single JSON file

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::item::TodoItem;
use crate::traits::ItemStore;


/// An [`ItemStore`] backed by a JSON file, that contains an array of every item.
///
/// Every operation re-reads the whole file, and every mutation rewrites it.
/// Mutations made through the same `FileStore` are serialized, but several processes
/// sharing the same file will race (the last writer wins).
#[derive(Debug)]
pub struct FileStore {
    backing_file: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Create a store on `path`. The file does not need to exist yet, it will be created on the first write
    pub fn new(path: &Path) -> Self {
        Self {
            backing_file: PathBuf::from(path),
            write_lock: Mutex::new(()),
        }
    }

    /// Get the path to the backing file
    pub fn path(&self) -> &Path {
        &self.backing_file
    }

    async fn load(&self) -> Result<Vec<TodoItem>, StorageError> {
        let content = match tokio::fs::read(&self.backing_file).await {
            Err(err) if err.kind() == ErrorKind::NotFound => {
                log::debug!("{:?} does not exist yet, starting from an empty collection", self.backing_file);
                return Ok(Vec::new());
            },
            Err(err) => return Err(StorageError::io(&self.backing_file, err)),
            Ok(content) => content,
        };

        if content.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&content)?)
    }

    /// Rewrite the whole collection.
    /// This goes through a temporary file, so that readers never see a half-written collection
    async fn save(&self, items: &[TodoItem]) -> Result<(), StorageError> {
        let content = serde_json::to_vec(items)?;

        let tmp_file = temporary_path(&self.backing_file);
        tokio::fs::write(&tmp_file, &content).await
            .map_err(|err| StorageError::io(&tmp_file, err))?;
        tokio::fs::rename(&tmp_file, &self.backing_file).await
            .map_err(|err| StorageError::io(&self.backing_file, err))?;

        log::debug!("Wrote {} items to {:?}", items.len(), self.backing_file);
        Ok(())
    }
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path.file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("collection"));
    name.push(".tmp");
    path.with_file_name(name)
}

#[async_trait]
impl ItemStore for FileStore {
    async fn add(&self, item: TodoItem) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.load().await?;
        items.push(item);
        self.save(&items).await
    }

    async fn add_batch(&self, new_items: Vec<TodoItem>) -> Result<usize, StorageError> {
        let _guard = self.write_lock.lock().await;
        let count = new_items.len();
        let mut items = self.load().await?;
        items.extend(new_items);
        self.save(&items).await?;
        Ok(count)
    }

    async fn list(&self) -> Result<Vec<TodoItem>, StorageError> {
        self.load().await
    }

    async fn find_by_task(&self, task: &str) -> Result<Vec<TodoItem>, StorageError> {
        Ok(self.load().await?
            .into_iter()
            .filter(|item| item.task() == task)
            .collect())
    }

    async fn set_completed(&self, id: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.load().await?;

        let mut found = false;
        for item in items.iter_mut().filter(|item| item.id().matches(id)) {
            item.mark_completed();
            found = true;
        }

        if found == false {
            log::debug!("No item with id {}, nothing to complete", id);
            return Ok(());
        }
        self.save(&items).await
    }

    async fn remove(&self, id: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.load().await?;

        let count_before = items.len();
        items.retain(|item| item.id().matches(id) == false);

        if items.len() == count_before {
            log::debug!("No item with id {}, nothing to remove", id);
            return Ok(());
        }
        self.save(&items).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::sample_item;

    fn test_store() -> (tempfile::TempDir, FileStore) {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(&dir.path().join("database.json"));
        (dir, store)
    }

    #[tokio::test]
    async fn missing_file_is_an_empty_collection() {
        let (_dir, store) = test_store();
        assert!(store.list().await.unwrap().is_empty());
        assert_eq!(store.path().exists(), false);
    }

    #[tokio::test]
    async fn add_then_list() {
        let (_dir, store) = test_store();
        store.add(sample_item(1, "Buy milk")).await.unwrap();
        store.add(sample_item(2, "Call Mom")).await.unwrap();

        let items = store.list().await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].task(), "Buy milk");
        assert_eq!(items[0].completed(), false);

        // The file really is a plain JSON array
        let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(raw.as_array().map(|a| a.len()), Some(2));
    }

    #[tokio::test]
    async fn find_is_an_exact_match() {
        let (_dir, store) = test_store();
        store.add_batch(vec![
            sample_item(1, "Buy milk"),
            sample_item(2, "Buy milk and eggs"),
            sample_item(3, "Buy milk"),
        ]).await.unwrap();

        let found = store.find_by_task("Buy milk").await.unwrap();
        let ids: Vec<String> = found.iter().map(|i| i.id().to_string()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert!(store.find_by_task("buy milk").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn complete_flips_only_one_item() {
        let (_dir, store) = test_store();
        let count = store.add_batch(vec![sample_item(1, "a"), sample_item(2, "b")]).await.unwrap();
        assert_eq!(count, 2);

        store.set_completed("2").await.unwrap();

        let items = store.list().await.unwrap();
        assert_eq!(items[0].completed(), false);
        assert_eq!(items[1].completed(), true);
        let mut expected = sample_item(2, "b");
        expected.mark_completed();
        assert_eq!(items[1], expected);

        // Unknown ids are silently ignored
        store.set_completed("42").await.unwrap();
        assert_eq!(store.list().await.unwrap(), items);
    }

    #[tokio::test]
    async fn remove_items() {
        let (_dir, store) = test_store();
        store.add_batch(vec![sample_item(1, "a"), sample_item(2, "b")]).await.unwrap();

        store.remove("1").await.unwrap();
        let items = store.list().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].task(), "b");

        store.remove("does-not-exist").await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn corrupted_file() {
        let (_dir, store) = test_store();
        std::fs::write(store.path(), b"{ this is not json").unwrap();
        assert!(matches!(store.list().await, Err(StorageError::Serde(_))));
    }
}
