//! In-memory collection backend for docquery.
//!
//! This crate provides a thread-safe, in-memory implementation of the
//! [`Collection`](docquery_core::collection::Collection) trait. It evaluates
//! the documents a [`Query`](docquery_core::query::Query) builds, which makes
//! it ideal for development and testing.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using an async-aware RwLock
//! - **Filter evaluation** - Comparisons, sets, `$regex`, `$elemMatch`, logical clauses and dotted paths
//! - **Result shaping** - Sorting, skip/limit and projection with `$slice`
//! - **Updates** - `$set`, `$unset`, `$inc`, `$push`, replacements and upserts
//!
//! Geospatial operators and `$where` are not evaluated and fail with
//! [`QueryError::Collection`](docquery_core::error::QueryError::Collection).
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use docquery::{prelude::*, memory::InMemoryCollection};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let users = InMemoryCollection::new("users");
//!     users.insert_many(vec![doc! { "name": "Alice", "age": 30 }]).await;
//!
//!     let mut query = Query::from_collection(Arc::new(users));
//!     query.where_path("age").gte(18)?.count()?;
//!     assert_eq!(query.exec().await?.as_count(), Some(1));
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docquery_memory;

pub mod collection;
pub(crate) mod cursor;
pub(crate) mod evaluator;
pub(crate) mod modifier;
pub(crate) mod path;

pub use collection::InMemoryCollection;
