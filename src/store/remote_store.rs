//! An item store backed by a remote document database.
//!
//! This talks to the plain CouchDB HTTP API, that is also implemented by IBM Cloudant.
//! Every item is a single document, whose `_id` is the item id.

use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::StorageError;
use crate::item::TodoItem;
use crate::resource::Resource;
use crate::traits::ItemStore;

/// How many documents are requested per page when querying the database
pub const DEFAULT_FIND_PAGE_SIZE: usize = 200;


/// An item, as stored in the database
#[derive(Debug, Serialize, Deserialize)]
struct Document {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    rev: Option<String>,
    #[serde(flatten)]
    item: TodoItem,
}

impl Document {
    fn new(item: TodoItem) -> Self {
        Self { id: item.id().to_string(), rev: None, item }
    }
}

#[derive(Deserialize)]
struct AllDocsResponse {
    rows: Vec<AllDocsRow>,
}

#[derive(Deserialize)]
struct AllDocsRow {
    id: String,
    doc: Option<Value>,
}

#[derive(Deserialize)]
struct FindResponse {
    docs: Vec<Value>,
    bookmark: Option<String>,
}

#[derive(Deserialize)]
struct BulkDocsResult {
    id: Option<String>,
    #[serde(default)]
    ok: bool,
    error: Option<String>,
    reason: Option<String>,
}


/// An [`ItemStore`] that keeps one document per item in a CouchDB-compatible database
#[derive(Debug)]
pub struct RemoteStore {
    resource: Resource,
    database: String,
    client: reqwest::Client,
    page_size: usize,
}

impl RemoteStore {
    /// Create a store for `database` on the server described by `resource`. This does not start a connection
    pub fn new(resource: Resource, database: &str) -> Self {
        Self {
            resource,
            database: database.to_string(),
            client: reqwest::Client::new(),
            page_size: DEFAULT_FIND_PAGE_SIZE,
        }
    }

    /// Change how many documents are requested per page by [`ItemStore::find_by_task`]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn url(&self, segments: &[&str]) -> Result<url::Url, StorageError> {
        let mut all_segments = vec![self.database.as_str()];
        all_segments.extend_from_slice(segments);
        self.resource.join_segments(&all_segments)
    }

    /// Create the database, unless it already exists
    pub async fn ensure_database(&self) -> Result<(), StorageError> {
        let response = self.resource
            .request(&self.client, Method::PUT, self.url(&[])?)
            .send()
            .await?;

        if response.status() == StatusCode::PRECONDITION_FAILED {
            log::debug!("Database {} already exists", self.database);
            return Ok(());
        }
        expect_success(response).await?;
        log::info!("Database {} created", self.database);
        Ok(())
    }

    /// Fetch a single document, or `None` if it does not exist
    async fn get_document(&self, id: &str) -> Result<Option<Document>, StorageError> {
        if id.starts_with('_') {
            // Not a document, but a database endpoint such as `_all_docs`
            return Ok(None);
        }

        let response = self.resource
            .request(&self.client, Method::GET, self.url(&[id])?)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let doc = expect_success(response).await?.json().await?;
        Ok(Some(doc))
    }

    async fn put_document(&self, doc: &Document) -> Result<(), StorageError> {
        let response = self.resource
            .request(&self.client, Method::PUT, self.url(&[&doc.id])?)
            .json(doc)
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }
}

/// Turn non-2xx replies into errors
async fn expect_success(response: Response) -> Result<Response, StorageError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(StorageError::UnexpectedStatus { status, body })
}

/// Parse a document that has been returned by the database.
/// Documents that are not items (e.g. written by another application) are ignored
fn parse_item(id: &str, value: Value) -> Option<TodoItem> {
    match serde_json::from_value::<Document>(value) {
        Ok(doc) => Some(doc.item),
        Err(err) => {
            log::warn!("Document {} is not a valid item ({}), ignoring it", id, err);
            None
        }
    }
}

#[async_trait]
impl ItemStore for RemoteStore {
    async fn add(&self, item: TodoItem) -> Result<(), StorageError> {
        let doc = Document::new(item);
        self.put_document(&doc).await?;
        log::debug!("Wrote item {} to database {}", doc.id, self.database);
        Ok(())
    }

    async fn add_batch(&self, items: Vec<TodoItem>) -> Result<usize, StorageError> {
        if items.is_empty() {
            return Ok(0);
        }

        let docs: Vec<Document> = items.into_iter().map(Document::new).collect();
        let response = self.resource
            .request(&self.client, Method::POST, self.url(&["_bulk_docs"])?)
            .json(&json!({ "docs": docs }))
            .send()
            .await?;
        let results: Vec<BulkDocsResult> = expect_success(response).await?.json().await?;

        let mut added = 0;
        for result in results {
            if result.ok {
                added += 1;
            } else {
                log::warn!("Database refused item {}: {} ({})",
                    result.id.unwrap_or_default(),
                    result.error.unwrap_or_default(),
                    result.reason.unwrap_or_default());
            }
        }
        Ok(added)
    }

    async fn list(&self) -> Result<Vec<TodoItem>, StorageError> {
        let response = self.resource
            .request(&self.client, Method::GET, self.url(&["_all_docs"])?)
            .query(&[("include_docs", "true")])
            .send()
            .await?;
        let all_docs: AllDocsResponse = expect_success(response).await?.json().await?;

        Ok(all_docs.rows.into_iter()
            .filter(|row| row.id.starts_with("_design/") == false)
            .filter_map(|row| {
                let id = row.id;
                row.doc.and_then(|doc| parse_item(&id, doc))
            })
            .collect())
    }

    async fn find_by_task(&self, task: &str) -> Result<Vec<TodoItem>, StorageError> {
        let mut items = Vec::new();
        let mut bookmark: Option<String> = None;

        loop {
            let mut query = json!({
                "selector": { "Task": task },
                "limit": self.page_size,
            });
            if let Some(bm) = &bookmark {
                query["bookmark"] = json!(bm);
            }

            let response = self.resource
                .request(&self.client, Method::POST, self.url(&["_find"])?)
                .json(&query)
                .send()
                .await?;
            let page: FindResponse = expect_success(response).await?.json().await?;

            let page_len = page.docs.len();
            items.extend(page.docs.into_iter()
                .filter_map(|doc| {
                    let id = doc.get("_id").and_then(Value::as_str).unwrap_or("<no id>").to_string();
                    parse_item(&id, doc)
                }));

            if page_len < self.page_size || page.bookmark.is_none() {
                break;
            }
            bookmark = page.bookmark;
        }

        Ok(items)
    }

    async fn set_completed(&self, id: &str) -> Result<(), StorageError> {
        let mut doc = match self.get_document(id).await? {
            None => {
                log::debug!("No item with id {}, nothing to complete", id);
                return Ok(());
            },
            Some(doc) => doc,
        };

        if doc.item.completed() {
            return Ok(());
        }
        // The document still carries the revision we have read.
        // The database will refuse this write if someone else has updated it meanwhile
        doc.item.mark_completed();
        self.put_document(&doc).await
    }

    async fn remove(&self, id: &str) -> Result<(), StorageError> {
        let rev = match self.get_document(id).await? {
            None => {
                log::debug!("No item with id {}, nothing to remove", id);
                return Ok(());
            },
            Some(doc) => doc.rev.unwrap_or_default(),
        };

        let response = self.resource
            .request(&self.client, Method::DELETE, self.url(&[id])?)
            .query(&[("rev", rev.as_str())])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            // Someone else removed it in the meantime
            return Ok(());
        }
        expect_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::sample_item;

    #[test]
    fn document_layout() {
        let doc = Document::new(sample_item(7, "Buy milk"));
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["_id"], json!("7"));
        assert_eq!(value["ID"], json!(7));
        assert_eq!(value["Task"], json!("Buy milk"));
        assert!(value.get("_rev").is_none());

        let read: Document = serde_json::from_value(json!({
            "_id": "7",
            "_rev": "3-abc",
            "ID": 7,
            "Task": "Buy milk",
            "Current_date": "2024-03-01T09:30:00Z",
            "Due_date": "03/15/2024",
            "Event_type": "personal",
            "completed": true,
        })).unwrap();
        assert_eq!(read.rev.as_deref(), Some("3-abc"));
        assert!(read.item.completed());
    }

    #[test]
    fn foreign_documents_are_ignored() {
        let parsed = parse_item("x", json!({"_id": "x", "task": "legacy layout", "curDate": "today"}));
        assert!(parsed.is_none());
    }
}
