//! The fluent query builder.
//!
//! A [`Query`] accumulates chained calls into a
//! [`Specification`](crate::specification::Specification): filter conditions,
//! projection, sort, update document and execution options. The builder
//! methods are spread over several modules by concern:
//!
//! - conditions and logical clauses in [`conditions`](crate::conditions)
//! - geospatial shapes in [`geo`](crate::geo)
//! - `select` and `slice` in [`projection`](crate::projection)
//! - `sort` in [`sort`](crate::sort)
//! - execution options in [`options`](crate::options)
//! - operation binders in [`ops`](crate::ops)
//! - `merge` and factories in [`merge`](crate::merge)
//! - `exec` and `cursor` in [`dispatch`](crate::dispatch)
//!
//! # Example
//!
//! ```ignore
//! use docquery::prelude::*;
//! use bson::doc;
//!
//! let mut query = Query::new();
//! query.where_path("age").gte(21)?.lte(65)?;
//! query.in_at("tags", vec!["music", "art"]);
//! query.select("name -_id")?.sort("-age")?.limit(10)?;
//! query.find()?;
//! ```

use std::{fmt, sync::Arc};

use bson::{Bson, Document};

use crate::{
    collection::Collection,
    error::{QueryError, QueryResult},
    geo::GeoOperator,
    specification::{OperationKind, Specification},
    trace::{TraceFn, TraceInfo},
};

/// A chainable query builder.
///
/// Cloning a `Query` deep-copies its specification. The bound collection and
/// trace hook are shared by reference.
#[derive(Clone, Default)]
pub struct Query {
    pub(crate) spec: Specification,
    pub(crate) collection: Option<Arc<dyn Collection>>,
    pub(crate) trace: Option<TraceFn>,
}

/// Primary argument accepted by [`Query::with`].
#[derive(Debug, Clone)]
pub enum QuerySeed {
    /// Bind this collection.
    Collection(Arc<dyn Collection>),
    /// Use as the initial conditions.
    Filter(Document),
    /// Merge another query.
    Query(Query),
}

impl From<Arc<dyn Collection>> for QuerySeed {
    fn from(collection: Arc<dyn Collection>) -> Self {
        QuerySeed::Collection(collection)
    }
}

impl From<Document> for QuerySeed {
    fn from(filter: Document) -> Self {
        QuerySeed::Filter(filter)
    }
}

impl From<Query> for QuerySeed {
    fn from(query: Query) -> Self {
        QuerySeed::Query(query)
    }
}

impl From<&Query> for QuerySeed {
    fn from(query: &Query) -> Self {
        QuerySeed::Query(query.clone())
    }
}

/// Criteria accepted by [`Query::merge`] and the operation binders.
#[derive(Debug, Clone)]
pub enum Criteria {
    Filter(Document),
    Query(Query),
}

impl From<Document> for Criteria {
    fn from(filter: Document) -> Self {
        Criteria::Filter(filter)
    }
}

impl From<Query> for Criteria {
    fn from(query: Query) -> Self {
        Criteria::Query(query)
    }
}

impl From<&Query> for Criteria {
    fn from(query: &Query) -> Self {
        Criteria::Query(query.clone())
    }
}

impl Query {
    /// Creates an empty query with no collection, no operation and no options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query bound to `collection`.
    pub fn from_collection(collection: Arc<dyn Collection>) -> Self {
        let mut query = Self::new();
        query.collection(collection);
        query
    }

    /// Creates a query whose conditions start as `filter`.
    pub fn from_filter(filter: Document) -> Self {
        let mut query = Self::new();
        query.where_filter(filter);
        query
    }

    /// Creates a query from a seed and an optional options mapping.
    ///
    /// # Arguments
    ///
    /// * `seed` - A collection to bind, a filter to start from, or a query to merge
    /// * `options` - Options applied immediately through [`Query::set_options`]
    ///
    /// # Errors
    ///
    /// Fails when one of the options is rejected by its setter.
    pub fn with(seed: impl Into<QuerySeed>, options: Option<Document>) -> QueryResult<Self> {
        let mut query = Self::new();
        query.apply_seed(seed.into(), options)?;
        Ok(query)
    }

    /// Binds (or rebinds) the collection this query executes against.
    pub fn collection(&mut self, collection: Arc<dyn Collection>) -> &mut Self {
        self.collection = Some(collection);
        self
    }

    /// Installs the instrumentation hook called at dispatch time.
    pub fn set_trace_function(&mut self, trace: TraceFn) -> &mut Self {
        self.trace = Some(trace);
        self
    }

    pub fn specification(&self) -> &Specification {
        &self.spec
    }

    pub fn conditions(&self) -> &Document {
        &self.spec.conditions
    }

    pub fn fields(&self) -> Option<&Document> {
        self.spec.fields.as_ref()
    }

    pub fn update(&self) -> Option<&Document> {
        self.spec.update.as_ref()
    }

    pub fn options(&self) -> &Document {
        &self.spec.options
    }

    pub fn op(&self) -> Option<OperationKind> {
        self.spec.op
    }

    /// The active path, if a path-only call was made.
    pub fn path(&self) -> Option<&str> {
        self.spec.path.as_deref()
    }

    pub fn geo_comparison(&self) -> Option<GeoOperator> {
        self.spec.geo_comparison
    }

    pub fn distinct_field(&self) -> Option<&str> {
        self.spec.distinct.as_deref()
    }

    pub fn bound_collection(&self) -> Option<&Arc<dyn Collection>> {
        self.collection.as_ref()
    }

    /// Builds the summary handed to trace hooks.
    pub fn trace_info(&self) -> TraceInfo {
        TraceInfo {
            collection_name: self.collection.as_ref().map(|c| c.name().to_string()),
            conditions: self.spec.conditions.clone(),
            options: self.spec.options.clone(),
            fields: self.spec.fields.clone(),
            update: self.spec.update.clone(),
            distinct: self.spec.distinct.clone(),
        }
    }

    /// Resolves the path an operator applies to: the explicit one when given,
    /// otherwise the active path.
    pub(crate) fn resolve_path(&self, explicit: Option<&str>, method: &str) -> QueryResult<String> {
        match explicit.or(self.spec.path.as_deref()) {
            Some(path) if !path.is_empty() => Ok(path.to_string()),
            _ => Err(QueryError::missing_path(method)),
        }
    }

    /// Sets `conditions[path][key] = value`, keeping sibling operators. A
    /// literal previously stored at `path` is replaced.
    pub(crate) fn set_operator(&mut self, path: &str, key: &str, value: Bson) {
        if let Some(Bson::Document(operators)) = self.spec.conditions.get_mut(path) {
            operators.insert(key, value);
            return;
        }

        let mut operators = Document::new();
        operators.insert(key, value);
        self.spec.conditions.insert(path, operators);
    }

    pub(crate) fn fields_mut(&mut self) -> &mut Document {
        self.spec.fields.get_or_insert_with(Document::new)
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("spec", &self.spec)
            .field("collection", &self.collection.as_ref().map(|c| c.name().to_string()))
            .field("trace", &self.trace.is_some())
            .finish()
    }
}
