//! MongoDB collection backend for docquery.
//!
//! This crate provides a [`Collection`](docquery_core::collection::Collection)
//! implementation over the official MongoDB driver. Queries built with
//! docquery are dispatched as-is: the filter and update documents go straight
//! to the driver and the options document is translated into the driver's
//! per-method option structs.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docquery = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use docquery::{prelude::*, mongodb::MongoCollection};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let users = MongoCollection::connect("mongodb://localhost:27017", "app", "users").await?;
//!
//!     let mut query = Query::from_collection(Arc::new(users));
//!     query.where_path("age").gte(18)?.read("sp").find()?;
//!     let adults = query.exec().await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docquery_mongodb;

pub mod collection;
pub(crate) mod options;

pub use collection::MongoCollection;
