//! This crate provides a small todo-list REST server.
//!
//! Todo items are persisted in an [`ItemStore`](traits::ItemStore). Two stores are provided in the [`store`] module:
//! a flat JSON file, and a remote CouchDB-compatible database (e.g. IBM Cloudant). \
//! The store is picked at startup from the [`config`], and handed to the HTTP layer (see [`server::build_router`]).
//!
//! Every item route is gated by a signed session cookie, that is obtained by logging in with HTTP basic auth
//! (see the [`auth`] module).

pub mod traits;

pub mod error;
mod item;
pub use item::{DueDate, ItemId, NewItem, TodoItem, validate_batch, parse_timestamp, CANONICAL_DATE_FORMAT};
pub mod resource;
pub mod store;

pub mod auth;
pub mod config;
pub mod routes;
pub mod server;
pub mod state;
pub mod utils;
