//! Item stores: where todo items are persisted.
//!
//! Both stores implement [`ItemStore`](crate::traits::ItemStore), so that the HTTP layer does not care which one it is given.

pub mod file_store;
pub mod remote_store;

use std::path::PathBuf;
use std::sync::Arc;

use crate::resource::Resource;
use crate::traits::ItemStore;
use file_store::FileStore;
use remote_store::RemoteStore;

/// Describes which store should be used
#[derive(Clone, Debug)]
pub enum Backend {
    /// A single JSON file
    File { path: PathBuf },
    /// A CouchDB-compatible database
    Remote { resource: Resource, database: String },
}

/// Instantiate the store described by `backend`.
///
/// In case of a remote database, this also makes sure the database exists. Failing to do so is not fatal (the
/// database may exist already but we may lack the rights to create it), this is only logged
pub async fn open_store(backend: &Backend) -> Arc<dyn ItemStore> {
    match backend {
        Backend::File { path } => {
            log::info!("Using file store at {:?}", path);
            Arc::new(FileStore::new(path))
        },
        Backend::Remote { resource, database } => {
            log::info!("Using remote store {} on {}", database, resource.url());
            let store = RemoteStore::new(resource.clone(), database);
            if let Err(err) = store.ensure_database().await {
                log::warn!("Cannot create {:?} database: {}", database, err);
            }
            Arc::new(store)
        },
    }
}
