use async_trait::async_trait;

use crate::error::StorageError;
use crate::item::TodoItem;

/// A place todo items are persisted to.
///
/// Items reaching a store have already been validated (see [`NewItem::validate`](crate::item::NewItem::validate)).
/// Ids are given as raw strings and compared with [`ItemId::matches`](crate::item::ItemId::matches).
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Persist a new item
    async fn add(&self, item: TodoItem) -> Result<(), StorageError>;

    /// Persist several items at once, and return how many have actually been added
    async fn add_batch(&self, items: Vec<TodoItem>) -> Result<usize, StorageError>;

    /// Returns every item, unfiltered
    async fn list(&self) -> Result<Vec<TodoItem>, StorageError>;

    /// Returns the items whose task matches `task`
    async fn find_by_task(&self, task: &str) -> Result<Vec<TodoItem>, StorageError>;

    /// Mark the item with this id as completed.
    /// This is a no-op in case no item has this id
    async fn set_completed(&self, id: &str) -> Result<(), StorageError>;

    /// Remove the item with this id.
    /// This is a no-op in case no item has this id
    async fn remove(&self, id: &str) -> Result<(), StorageError>;
}
