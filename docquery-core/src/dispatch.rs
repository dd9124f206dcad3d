//! Dispatching a finished query to its collection.
//!
//! Dispatch owns no business logic: it checks the preconditions, shapes the
//! specification into collection arguments, and calls exactly one
//! [`Collection`] method.

use std::{future::IntoFuture, time::Instant};

use bson::{Bson, Document};
use futures::{TryStreamExt, future::BoxFuture};

use crate::{
    collection::{Collection, DocumentStream, WriteResult},
    error::{QueryError, QueryResult},
    permissions,
    query::Query,
    shape,
    specification::OperationKind,
};

/// What a dispatched operation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    /// `find`
    Documents(Vec<Document>),
    /// `findOne` and the find-and-modify operations
    Document(Option<Document>),
    /// `count`
    Count(u64),
    /// `distinct`
    Values(Vec<Bson>),
    /// updates and deletes
    Write(WriteResult),
}

impl QueryOutput {
    pub fn into_documents(self) -> Option<Vec<Document>> {
        match self {
            QueryOutput::Documents(docs) => Some(docs),
            _ => None,
        }
    }

    pub fn into_document(self) -> Option<Document> {
        match self {
            QueryOutput::Document(doc) => doc,
            _ => None,
        }
    }

    pub fn as_count(&self) -> Option<u64> {
        match self {
            QueryOutput::Count(count) => Some(*count),
            _ => None,
        }
    }

    pub fn into_values(self) -> Option<Vec<Bson>> {
        match self {
            QueryOutput::Values(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_write(&self) -> Option<&WriteResult> {
        match self {
            QueryOutput::Write(result) => Some(result),
            _ => None,
        }
    }
}

impl Query {
    /// Executes the bound operation against the bound collection.
    ///
    /// The installed trace hook, if any, is called before the collection and
    /// its completion closure after it, with the outcome and elapsed time.
    ///
    /// # Errors
    ///
    /// In order of precedence: [`QueryError::MissingOperation`],
    /// [`QueryError::MissingCollection`], a compatibility error, a mixed
    /// projection, `distinct` without a field, then whatever the collection
    /// reports.
    pub async fn exec(&self) -> QueryResult<QueryOutput> {
        let op = self.spec.op.ok_or(QueryError::MissingOperation)?;
        let collection = self.collection.clone().ok_or(QueryError::MissingCollection)?;
        self.check_dispatchable(op)?;

        tracing::debug!(
            op = %op,
            collection = collection.name(),
            filter = %self.spec.conditions,
            "dispatching query"
        );

        let completion = self.trace.as_ref().and_then(|trace| trace(op, &self.trace_info()));
        let started = Instant::now();

        let result = self.dispatch(op, collection.as_ref()).await;

        if let Some(completion) = completion {
            completion(result.as_ref(), started.elapsed());
        }
        result
    }

    /// Binds `op` and executes. The operation stays unbound when execution
    /// fails.
    pub async fn exec_as(&mut self, op: OperationKind) -> QueryResult<QueryOutput> {
        let mut staged = self.clone();
        staged.bind_op(op)?;
        let output = staged.exec().await?;

        self.spec.op = Some(op);
        Ok(output)
    }

    /// Opens a stream over the matching documents.
    ///
    /// Binds `find` when no operation was declared yet.
    ///
    /// # Errors
    ///
    /// [`QueryError::Usage`] when another operation kind is bound, otherwise
    /// the same preconditions as [`Query::exec`].
    pub async fn cursor(&mut self) -> QueryResult<DocumentStream> {
        if let Some(op) = self.spec.op
            && op != OperationKind::Find
        {
            return Err(QueryError::Usage(format!("cursor() cannot be used with {op}")));
        }

        let collection = self.collection.clone().ok_or(QueryError::MissingCollection)?;
        self.check_dispatchable(OperationKind::Find)?;

        tracing::debug!(
            collection = collection.name(),
            filter = %self.spec.conditions,
            "opening cursor"
        );
        let stream = collection
            .find(self.spec.conditions.clone(), self.options_for_exec(OperationKind::Find))
            .await?;

        self.spec.op = Some(OperationKind::Find);
        Ok(stream)
    }

    fn check_dispatchable(&self, op: OperationKind) -> QueryResult<()> {
        permissions::validate(&self.spec, op)?;

        if self.spec.fields.as_ref().is_some_and(is_mixed_projection) {
            return Err(QueryError::invalid(
                "Projection cannot have a mix of inclusion and exclusion.",
            ));
        }

        if op == OperationKind::Distinct && self.spec.distinct.is_none() {
            return Err(QueryError::Usage("No value for `distinct` has been declared".to_string()));
        }
        Ok(())
    }

    /// The options sent with `op`: the projection folded in where the
    /// operation carries one, and builder-only flags removed.
    fn options_for_exec(&self, op: OperationKind) -> Document {
        let mut options = self.spec.options.clone();
        options.remove("overwrite");

        if op.carries_projection()
            && let Some(fields) = self.spec.fields.as_ref().filter(|fields| !fields.is_empty())
        {
            options.insert("projection", fields.clone());
        }
        options
    }

    async fn dispatch(&self, op: OperationKind, collection: &dyn Collection) -> QueryResult<QueryOutput> {
        let filter = self.spec.conditions.clone();
        let options = self.options_for_exec(op);

        match op {
            OperationKind::Find => {
                let documents = collection.find(filter, options).await?.try_collect().await?;
                Ok(QueryOutput::Documents(documents))
            }
            OperationKind::FindOne => Ok(QueryOutput::Document(collection.find_one(filter, options).await?)),
            OperationKind::Count => Ok(QueryOutput::Count(collection.count(filter, options).await?)),
            OperationKind::Distinct => {
                let field = self.spec.distinct.as_deref().unwrap_or_default();
                Ok(QueryOutput::Values(collection.distinct(field, filter, options).await?))
            }
            OperationKind::UpdateOne | OperationKind::UpdateMany | OperationKind::ReplaceOne => {
                let update = self.update_for_exec();
                if update.is_empty() && !self.is_overwrite() {
                    tracing::debug!(op = %op, "empty update, nothing dispatched");
                    return Ok(QueryOutput::Write(WriteResult::default()));
                }

                let result = match op {
                    OperationKind::UpdateOne => collection.update_one(filter, update, options).await?,
                    OperationKind::UpdateMany => collection.update_many(filter, update, options).await?,
                    _ => collection.replace_one(filter, update, options).await?,
                };
                Ok(QueryOutput::Write(result))
            }
            OperationKind::Remove | OperationKind::DeleteMany => {
                Ok(QueryOutput::Write(collection.delete_many(filter, options).await?))
            }
            OperationKind::DeleteOne => Ok(QueryOutput::Write(collection.delete_one(filter, options).await?)),
            OperationKind::FindOneAndUpdate => {
                let update = self.update_for_exec();
                Ok(QueryOutput::Document(
                    collection.find_one_and_update(filter, update, options).await?,
                ))
            }
            OperationKind::FindOneAndRemove => Ok(QueryOutput::Document(
                collection.find_one_and_delete(filter, options).await?,
            )),
        }
    }
}

/// Whether a projection both includes and excludes fields. `_id` may always
/// be excluded, and operator values such as `$slice` or `$meta` count as
/// neither.
fn is_mixed_projection(fields: &Document) -> bool {
    let mut includes = false;
    let mut excludes = false;

    for (key, value) in fields {
        if key == "_id" || matches!(value, Bson::Document(_)) {
            continue;
        }
        if shape::is_exclusion_marker(value) {
            excludes = true;
        } else {
            includes = true;
        }
    }
    includes && excludes
}

impl IntoFuture for Query {
    type Output = QueryResult<QueryOutput>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.exec().await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn mixed_projection_ignores_id_and_operators() {
        assert!(is_mixed_projection(&doc! { "a": 1, "b": 0 }));
        assert!(!is_mixed_projection(&doc! { "a": 1, "_id": 0 }));
        assert!(!is_mixed_projection(&doc! { "a": 0, "comments": { "$slice": 5 } }));
        assert!(!is_mixed_projection(&doc! { "score": { "$meta": "textScore" }, "b": 1 }));
    }

    #[test]
    fn projection_folds_into_find_options() {
        let mut query = Query::new();
        query.select("name -_id").unwrap().limit(2).unwrap().find().unwrap();
        assert_eq!(
            query.options_for_exec(OperationKind::Find),
            doc! { "limit": 2i64, "projection": { "name": 1, "_id": 0 } }
        );
        assert_eq!(query.options_for_exec(OperationKind::UpdateOne), doc! { "limit": 2i64 });
    }

    #[test]
    fn overwrite_is_not_sent() {
        let mut query = Query::new();
        query.replace_one(doc! { "a": 1 }).unwrap();
        assert!(query.options_for_exec(OperationKind::ReplaceOne).is_empty());
    }

    #[tokio::test]
    async fn exec_requires_operation_then_collection() {
        let query = Query::new();
        assert_eq!(query.exec().await.unwrap_err(), QueryError::MissingOperation);
        assert_eq!(
            QueryError::MissingOperation.to_string(),
            "Missing query type: (find, etc)"
        );

        let mut query = Query::new();
        query.find().unwrap();
        assert_eq!(query.exec().await.unwrap_err(), QueryError::MissingCollection);
    }

    #[tokio::test]
    async fn failed_exec_as_leaves_operation_unbound() {
        let mut query = Query::new();
        assert_eq!(
            query.exec_as(OperationKind::Count).await.unwrap_err(),
            QueryError::MissingCollection
        );
        assert_eq!(query.op(), None);
        query.batch_size(10).unwrap();

        let mut query = Query::new();
        query.select("name").unwrap();
        assert!(matches!(
            query.exec_as(OperationKind::Count).await,
            Err(QueryError::Compatibility { .. })
        ));
        assert_eq!(query.op(), None);
    }

    #[tokio::test]
    async fn failed_cursor_leaves_operation_unbound() {
        let mut query = Query::new();
        assert!(matches!(query.cursor().await, Err(QueryError::MissingCollection)));
        assert_eq!(query.op(), None);

        let mut query = Query::new();
        query.count().unwrap();
        assert!(matches!(query.cursor().await, Err(QueryError::Usage(_))));
        assert_eq!(query.op(), Some(OperationKind::Count));
    }
}
