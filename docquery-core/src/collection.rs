//! The external collaborator that executes a finished query.
//!
//! The builder never talks to a store itself. At dispatch time it shapes the
//! accumulated [`Specification`](crate::specification::Specification) into
//! the arguments of exactly one [`Collection`] method.
//!
//! # Argument conventions
//!
//! Every method receives documents keyed the way the store names them: the
//! filter as built, the update after `$set` folding, and an options document
//! whose keys are the builder's option names (`limit`, `sort`,
//! `readPreference`, `projection`, ...). Implementations ignore keys they do
//! not understand.

use std::fmt::Debug;

use async_trait::async_trait;
use bson::{Bson, Document};
use futures::stream::BoxStream;

use crate::error::QueryResult;

/// Stream of documents produced by a `find`.
pub type DocumentStream = BoxStream<'static, QueryResult<Document>>;

/// Outcome of a write operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteResult {
    pub matched_count: u64,
    pub modified_count: u64,
    pub deleted_count: u64,
    pub upserted_id: Option<Bson>,
}

/// Abstract interface for the store-access object a query is bound to.
///
/// A single collection is usually shared by many queries through an
/// `Arc<dyn Collection>`, so implementations must be safe to call from
/// concurrent tasks.
#[async_trait]
pub trait Collection: Send + Sync + Debug {
    /// The collection name, reported to trace hooks and logs.
    fn name(&self) -> &str;

    /// Streams every document matching `filter`.
    ///
    /// # Arguments
    ///
    /// * `filter` - The query conditions
    /// * `options` - Execution options, including `projection`, `sort`, `skip` and `limit`
    async fn find(&self, filter: Document, options: Document) -> QueryResult<DocumentStream>;

    /// Returns the first document matching `filter`, if any.
    async fn find_one(&self, filter: Document, options: Document) -> QueryResult<Option<Document>>;

    /// Counts the documents matching `filter`.
    async fn count(&self, filter: Document, options: Document) -> QueryResult<u64>;

    /// Returns the distinct values of `field` among the documents matching `filter`.
    async fn distinct(
        &self,
        field: &str,
        filter: Document,
        options: Document,
    ) -> QueryResult<Vec<Bson>>;

    async fn update_one(
        &self,
        filter: Document,
        update: Document,
        options: Document,
    ) -> QueryResult<WriteResult>;

    async fn update_many(
        &self,
        filter: Document,
        update: Document,
        options: Document,
    ) -> QueryResult<WriteResult>;

    /// Replaces the first matching document with `replacement`.
    async fn replace_one(
        &self,
        filter: Document,
        replacement: Document,
        options: Document,
    ) -> QueryResult<WriteResult>;

    async fn delete_one(&self, filter: Document, options: Document) -> QueryResult<WriteResult>;

    async fn delete_many(&self, filter: Document, options: Document) -> QueryResult<WriteResult>;

    /// Atomically updates the first matching document and returns it.
    ///
    /// The document before modification is returned unless `options` asks for
    /// `returnDocument: "after"` (or the legacy `new: true`).
    async fn find_one_and_update(
        &self,
        filter: Document,
        update: Document,
        options: Document,
    ) -> QueryResult<Option<Document>>;

    /// Atomically removes the first matching document and returns it.
    async fn find_one_and_delete(
        &self,
        filter: Document,
        options: Document,
    ) -> QueryResult<Option<Document>>;
}
