//! Main docquery crate: a fluent query builder for document stores.
//!
//! This crate is the primary entry point for users of docquery. It re-exports
//! the builder from `docquery-core` and provides access to the collection
//! backends.
//!
//! # Features
//!
//! - **Chainable builder** - Conditions, geospatial shapes, projection, sort and options
//! - **Normalization** - Strings, documents and arrays all land in one canonical form
//! - **Validation** - Options that make no sense for an operation are rejected early
//! - **Pluggable execution** - Any [`Collection`](collection::Collection) can run a query
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
//!     users
//!         .insert_many(vec![
//!             doc! { "name": "Alice", "age": 30, "tags": ["admin"] },
//!             doc! { "name": "Bob", "age": 17 },
//!         ])
//!         .await;
//!
//!     let mut query = Query::from_collection(Arc::new(users));
//!     query
//!         .where_path("age").gte(18)?
//!         .select("name -_id")?
//!         .sort("-age")?
//!         .find()?;
//!
//!     let adults = query.exec().await?.into_documents();
//!     println!("{adults:?}");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Templates
//!
//! A configured query can be captured with
//! [`Query::to_constructor`](query::Query::to_constructor). Every query the
//! factory creates starts from an independent copy of the template.
//!
//! ```ignore
//! let mut base = Query::from_collection(users.clone());
//! base.where_value("active", true).read("sp").max_time_ms(500);
//!
//! let factory = base.to_constructor();
//! let mut recent = factory.create();
//! recent.sort("-created")?.limit(10)?.find()?;
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory evaluation for development and testing
//! - [`mongodb`] - The official MongoDB driver (requires `mongodb` feature)

pub mod prelude;

pub use docquery_core::{
    collection, conditions, config, dispatch, error, geo, merge, options, permissions, projection, query, shape,
    sort, specification, trace, update,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory collection backend.
pub mod memory {
    pub use docquery_memory::InMemoryCollection;
}

/// MongoDB collection backend.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docquery_mongodb::MongoCollection;
}
