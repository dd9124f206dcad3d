use async_trait::async_trait;
use bson::{Bson, Document};
use futures::{StreamExt, TryStreamExt};
use mongodb::{Client, Collection as DriverCollection, options::ClientOptions};

use docquery_core::{
    collection::{Collection, DocumentStream, WriteResult},
    error::{QueryError, QueryResult},
};

use crate::options;

fn driver_error(error: mongodb::error::Error) -> QueryError {
    QueryError::Collection(error.to_string())
}

/// A [`Collection`] backed by the official MongoDB driver.
#[derive(Debug, Clone)]
pub struct MongoCollection {
    inner: DriverCollection<Document>,
}

impl MongoCollection {
    pub fn new(inner: DriverCollection<Document>) -> Self {
        Self { inner }
    }

    /// Connects to `dsn` and opens `database.collection`.
    pub async fn connect(dsn: &str, database: &str, collection: &str) -> QueryResult<Self> {
        let client = Client::with_options(ClientOptions::parse(dsn).await.map_err(driver_error)?)
            .map_err(driver_error)?;

        tracing::debug!(database, collection, "opened mongodb collection");
        Ok(Self::new(client.database(database).collection(collection)))
    }

    pub fn inner(&self) -> &DriverCollection<Document> {
        &self.inner
    }
}

#[async_trait]
impl Collection for MongoCollection {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn find(&self, filter: Document, options: Document) -> QueryResult<DocumentStream> {
        let cursor = self
            .inner
            .find(filter)
            .with_options(options::find_options(&options)?)
            .await
            .map_err(driver_error)?;

        Ok(cursor.map_err(driver_error).boxed())
    }

    async fn find_one(&self, filter: Document, options: Document) -> QueryResult<Option<Document>> {
        self.inner
            .find_one(filter)
            .with_options(options::find_one_options(&options)?)
            .await
            .map_err(driver_error)
    }

    async fn count(&self, filter: Document, options: Document) -> QueryResult<u64> {
        self.inner
            .count_documents(filter)
            .with_options(options::count_options(&options)?)
            .await
            .map_err(driver_error)
    }

    async fn distinct(&self, field: &str, filter: Document, options: Document) -> QueryResult<Vec<Bson>> {
        self.inner
            .distinct(field, filter)
            .with_options(options::distinct_options(&options)?)
            .await
            .map_err(driver_error)
    }

    async fn update_one(&self, filter: Document, update: Document, options: Document) -> QueryResult<WriteResult> {
        let result = self
            .inner
            .update_one(filter, update)
            .with_options(options::update_options(&options)?)
            .await
            .map_err(driver_error)?;

        Ok(WriteResult {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
            ..Default::default()
        })
    }

    async fn update_many(&self, filter: Document, update: Document, options: Document) -> QueryResult<WriteResult> {
        let result = self
            .inner
            .update_many(filter, update)
            .with_options(options::update_options(&options)?)
            .await
            .map_err(driver_error)?;

        Ok(WriteResult {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
            ..Default::default()
        })
    }

    async fn replace_one(&self, filter: Document, replacement: Document, options: Document) -> QueryResult<WriteResult> {
        let result = self
            .inner
            .replace_one(filter, replacement)
            .with_options(options::replace_options(&options)?)
            .await
            .map_err(driver_error)?;

        Ok(WriteResult {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
            ..Default::default()
        })
    }

    async fn delete_one(&self, filter: Document, options: Document) -> QueryResult<WriteResult> {
        let result = self
            .inner
            .delete_one(filter)
            .with_options(options::delete_options(&options)?)
            .await
            .map_err(driver_error)?;

        Ok(WriteResult { deleted_count: result.deleted_count, ..Default::default() })
    }

    async fn delete_many(&self, filter: Document, options: Document) -> QueryResult<WriteResult> {
        let result = self
            .inner
            .delete_many(filter)
            .with_options(options::delete_options(&options)?)
            .await
            .map_err(driver_error)?;

        Ok(WriteResult { deleted_count: result.deleted_count, ..Default::default() })
    }

    async fn find_one_and_update(
        &self,
        filter: Document,
        update: Document,
        options: Document,
    ) -> QueryResult<Option<Document>> {
        self.inner
            .find_one_and_update(filter, update)
            .with_options(options::find_one_and_update_options(&options)?)
            .await
            .map_err(driver_error)
    }

    async fn find_one_and_delete(&self, filter: Document, options: Document) -> QueryResult<Option<Document>> {
        self.inner
            .find_one_and_delete(filter)
            .with_options(options::find_one_and_delete_options(&options)?)
            .await
            .map_err(driver_error)
    }
}
