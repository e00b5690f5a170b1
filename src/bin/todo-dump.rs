//! Print the content of a file-backed todo collection.
//!
//! Usage: `todo-dump [path]` (defaults to `$TODO_DB_FILE`, then `database.json`)

use std::path::PathBuf;

use todo_server::config::DEFAULT_DB_FILE;
use todo_server::store::file_store::FileStore;
use todo_server::traits::ItemStore;

#[tokio::main]
async fn main() {
    env_logger::init();

    let path = std::env::args().nth(1)
        .or_else(|| std::env::var("TODO_DB_FILE").ok())
        .unwrap_or_else(|| DEFAULT_DB_FILE.to_string());
    let store = FileStore::new(&PathBuf::from(path));

    let items = match store.list().await {
        Ok(items) => items,
        Err(err) => {
            log::error!("Unable to read {:?}: {}", store.path(), err);
            std::process::exit(1);
        }
    };

    println!("---- {} -----", store.path().display());
    if let Err(err) = todo_server::utils::print_item_list(&mut std::io::stdout(), &items) {
        log::error!("Unable to print items: {}", err);
        std::process::exit(1);
    }
}
