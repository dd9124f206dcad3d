//! In-memory collection.
//!
//! Documents are kept in insertion order in a `Vec` behind an async-aware
//! read-write lock. Every operation scans the whole collection.

use std::sync::Arc;

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use futures::{StreamExt, stream};
use mea::rwlock::RwLock;

use docquery_core::{
    collection::{Collection, DocumentStream, WriteResult},
    error::QueryResult,
    shape,
};

use crate::{cursor, evaluator::DocumentEvaluator, modifier, path};

/// Thread-safe in-memory collection.
///
/// `InMemoryCollection` is cloneable and shares its documents between clones,
/// so one instance can back many queries across async tasks.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use docquery_memory::InMemoryCollection;
/// use docquery_core::{collection::Collection, query::Query};
/// use bson::doc;
///
/// let users = InMemoryCollection::new("users");
/// users.insert_many(vec![doc! { "name": "Alice", "age": 30 }]).await;
///
/// let collection: Arc<dyn Collection> = Arc::new(users);
/// let mut query = Query::from_collection(collection);
/// query.find_by(doc! { "age": { "$gte": 18 } })?;
/// let adults = query.exec().await?;
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryCollection {
    name: String,
    documents: Arc<RwLock<Vec<Document>>>,
}

impl InMemoryCollection {
    /// Creates an empty collection.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Appends documents, assigning an `ObjectId` to those without `_id`.
    /// Returns the ids in insertion order.
    pub async fn insert_many(&self, documents: impl IntoIterator<Item = Document>) -> Vec<Bson> {
        let mut stored = self.documents.write().await;
        let mut ids = Vec::new();

        for mut document in documents {
            if !document.contains_key("_id") {
                document.insert("_id", ObjectId::new());
            }
            ids.push(document.get("_id").cloned().unwrap_or(Bson::Null));
            stored.push(document);
        }

        tracing::trace!(collection = %self.name, inserted = ids.len(), "inserted documents");
        ids
    }

    /// A snapshot of every stored document.
    pub async fn documents(&self) -> Vec<Document> {
        self.documents.read().await.clone()
    }

    /// Matching documents, sorted and paged per `options`, before projection.
    fn select(documents: &[Document], filter: &Document, options: &Document) -> QueryResult<Vec<Document>> {
        let mut matched: Vec<Document> = DocumentEvaluator::filter_documents(documents, filter)?
            .into_iter()
            .cloned()
            .collect();
        cursor::sort(&mut matched, &cursor::sort_keys(options)?);
        Ok(cursor::page(matched, options))
    }

    /// Positions of matching documents, in sort order when one is given.
    fn positions(documents: &[Document], filter: &Document, options: &Document) -> QueryResult<Vec<usize>> {
        let mut positions = Vec::new();
        for (index, document) in documents.iter().enumerate() {
            if DocumentEvaluator::new(document).evaluate(filter)? {
                positions.push(index);
            }
        }

        let keys = cursor::sort_keys(options)?;
        positions.sort_by(|&a, &b| cursor::compare(&documents[a], &documents[b], &keys));
        Ok(positions)
    }

    async fn update(&self, filter: Document, update: Document, options: Document, multi: bool) -> QueryResult<WriteResult> {
        let mut documents = self.documents.write().await;
        let positions = Self::positions(&documents, &filter, &Document::new())?;
        let targets = if multi { &positions[..] } else { &positions[..positions.len().min(1)] };

        let mut result = WriteResult::default();
        for &index in targets {
            let before = documents[index].clone();
            modifier::apply(&mut documents[index], &update, false)?;
            result.matched_count += 1;
            if documents[index] != before {
                result.modified_count += 1;
            }
        }

        if targets.is_empty() && options.get("upsert").is_some_and(shape::is_truthy) {
            let inserted = modifier::upsert_seed(&filter, &update)?;
            result.upserted_id = inserted.get("_id").cloned();
            documents.push(inserted);
        }

        tracing::trace!(
            collection = %self.name,
            matched = result.matched_count,
            modified = result.modified_count,
            upserted = result.upserted_id.is_some(),
            "updated documents"
        );
        Ok(result)
    }

    async fn delete(&self, filter: Document, multi: bool) -> QueryResult<WriteResult> {
        let mut documents = self.documents.write().await;
        let positions = Self::positions(&documents, &filter, &Document::new())?;
        let targets = if multi { &positions[..] } else { &positions[..positions.len().min(1)] };

        for &index in targets.iter().rev() {
            documents.remove(index);
        }

        tracing::trace!(collection = %self.name, deleted = targets.len(), "deleted documents");
        Ok(WriteResult { deleted_count: targets.len() as u64, ..Default::default() })
    }
}

fn returns_updated(options: &Document) -> bool {
    options.get_str("returnDocument").is_ok_and(|value| value == "after")
        || options.get("new").is_some_and(shape::is_truthy)
        || options.get("returnOriginal").is_some_and(|value| matches!(value, Bson::Boolean(false)))
}

#[async_trait]
impl Collection for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find(&self, filter: Document, options: Document) -> QueryResult<DocumentStream> {
        let documents = self.documents.read().await;
        let selected = Self::select(&documents, &filter, &options)?
            .iter()
            .map(|document| cursor::project(document, &options))
            .collect::<Vec<_>>();

        Ok(stream::iter(selected).boxed())
    }

    async fn find_one(&self, filter: Document, mut options: Document) -> QueryResult<Option<Document>> {
        options.insert("limit", 1i64);
        let documents = self.documents.read().await;

        Self::select(&documents, &filter, &options)?
            .first()
            .map(|document| cursor::project(document, &options))
            .transpose()
    }

    async fn count(&self, filter: Document, options: Document) -> QueryResult<u64> {
        let documents = self.documents.read().await;
        let matched = DocumentEvaluator::filter_documents(documents.iter(), &filter)?;
        Ok(cursor::page(matched, &options).len() as u64)
    }

    async fn distinct(&self, field: &str, filter: Document, _options: Document) -> QueryResult<Vec<Bson>> {
        let documents = self.documents.read().await;
        let mut values: Vec<Bson> = Vec::new();

        for document in DocumentEvaluator::filter_documents(documents.iter(), &filter)? {
            for value in path::lookup(document, field) {
                let flattened = match value {
                    Bson::Array(items) => items.clone(),
                    other => vec![other.clone()],
                };
                for item in flattened {
                    if !values.contains(&item) {
                        values.push(item);
                    }
                }
            }
        }
        Ok(values)
    }

    async fn update_one(&self, filter: Document, update: Document, options: Document) -> QueryResult<WriteResult> {
        self.update(filter, update, options, false).await
    }

    async fn update_many(&self, filter: Document, update: Document, options: Document) -> QueryResult<WriteResult> {
        self.update(filter, update, options, true).await
    }

    async fn replace_one(&self, filter: Document, replacement: Document, options: Document) -> QueryResult<WriteResult> {
        self.update(filter, replacement, options, false).await
    }

    async fn delete_one(&self, filter: Document, _options: Document) -> QueryResult<WriteResult> {
        self.delete(filter, false).await
    }

    async fn delete_many(&self, filter: Document, _options: Document) -> QueryResult<WriteResult> {
        self.delete(filter, true).await
    }

    async fn find_one_and_update(
        &self,
        filter: Document,
        update: Document,
        options: Document,
    ) -> QueryResult<Option<Document>> {
        let mut documents = self.documents.write().await;
        let positions = Self::positions(&documents, &filter, &options)?;

        let (before, after) = match positions.first() {
            Some(&index) => {
                let before = documents[index].clone();
                modifier::apply(&mut documents[index], &update, false)?;
                (Some(before), documents[index].clone())
            }
            None if options.get("upsert").is_some_and(shape::is_truthy) => {
                let inserted = modifier::upsert_seed(&filter, &update)?;
                documents.push(inserted.clone());
                (None, inserted)
            }
            None => return Ok(None),
        };

        tracing::trace!(collection = %self.name, upserted = before.is_none(), "found and updated document");
        let returned = if returns_updated(&options) { Some(after) } else { before };
        returned.map(|document| cursor::project(&document, &options)).transpose()
    }

    async fn find_one_and_delete(&self, filter: Document, options: Document) -> QueryResult<Option<Document>> {
        let mut documents = self.documents.write().await;
        let positions = Self::positions(&documents, &filter, &options)?;

        let Some(&index) = positions.first() else {
            return Ok(None);
        };
        let removed = documents.remove(index);

        tracing::trace!(collection = %self.name, "found and deleted document");
        cursor::project(&removed, &options).map(Some)
    }
}
