//! A fluent query builder, normalizer and validator for document stores.
//!
//! This crate is the core of the docquery project and provides:
//!
//! - **Query builder** ([`query`]) - The chainable [`Query`](query::Query) and its seeds
//! - **Conditions** ([`conditions`]) - Path-scoped comparisons and logical clauses
//! - **Geospatial operators** ([`geo`]) - Shapes, `near` and GeoJSON geometry
//! - **Projection and sort** ([`projection`], [`sort`]) - Normalized from strings, documents and arrays
//! - **Options and compatibility** ([`options`], [`permissions`]) - Per-operation option rules
//! - **Merging and factories** ([`merge`], [`update`]) - Combining and templating queries
//! - **Dispatch** ([`dispatch`], [`collection`]) - Executing a query against a store
//! - **Error handling** ([`error`]) - The error type shared by every call
//!
//! # Example
//!
//! ```ignore
//! use docquery_core::query::Query;
//! use bson::doc;
//!
//! let mut query = Query::new();
//! query
//!     .where_path("name").equals("docquery")?
//!     .where_path("age").gte(21)?
//!     .select("name age -_id")?
//!     .sort("-age")?
//!     .limit(20)?
//!     .find()?;
//!
//! let output = query.exec().await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docquery_core;

pub(crate) mod args;
pub mod collection;
pub mod conditions;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod geo;
pub mod merge;
pub mod ops;
pub mod options;
pub mod permissions;
pub mod projection;
pub mod query;
pub mod shape;
pub mod sort;
pub mod specification;
pub mod trace;
pub mod update;
