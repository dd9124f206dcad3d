//! Combining and templating queries.
//!
//! Nothing here shares mutable state between queries: every merge copies the
//! documents it takes from the source, so later mutation of either side never
//! shows through in the other.

use bson::{Bson, Document};

use crate::{
    error::{QueryError, QueryResult},
    query::{Criteria, Query, QuerySeed},
    shape,
};

/// Recursively merges `source` into `target`. Nested documents merge key by
/// key, any other value is cloned over the existing one.
pub(crate) fn deep_merge(target: &mut Document, source: &Document) {
    for (key, value) in source {
        match (target.get_mut(key), value) {
            (Some(Bson::Document(existing)), Bson::Document(incoming)) => deep_merge(existing, incoming),
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

impl Query {
    /// Merges a filter or another query into this one.
    ///
    /// A filter is assigned key by key into the conditions. A query has its
    /// conditions, fields and options deep-merged and its update
    /// merge-cloned, its distinct field copied when set, and its collection
    /// and trace hook adopted when this query has none.
    pub fn merge(&mut self, source: impl Into<Criteria>) -> &mut Self {
        match source.into() {
            Criteria::Filter(filter) => self.where_filter(filter),
            Criteria::Query(other) => self.merge_query(other),
        }
    }

    fn merge_query(&mut self, other: Query) -> &mut Self {
        let Query { spec, collection, trace } = other;

        deep_merge(&mut self.spec.conditions, &spec.conditions);
        if let Some(fields) = &spec.fields {
            deep_merge(self.fields_mut(), fields);
        }
        deep_merge(&mut self.spec.options, &spec.options);
        if let Some(update) = spec.update {
            self.merge_update(update);
        }
        if spec.distinct.is_some() {
            self.spec.distinct = spec.distinct;
        }

        if self.collection.is_none() {
            self.collection = collection;
        }
        if self.trace.is_none() {
            self.trace = trace;
        }
        self
    }

    /// Merges a loosely typed value: falsy values are ignored and documents
    /// merge as filters.
    ///
    /// # Errors
    ///
    /// [`QueryError::InvalidArgument`] for any other value.
    pub fn merge_value(&mut self, source: &Bson) -> QueryResult<&mut Self> {
        if !shape::is_truthy(source) {
            return Ok(self);
        }

        match source {
            Bson::Document(filter) => Ok(self.merge(filter.clone())),
            _ => Err(QueryError::invalid(
                "Invalid argument. Expected a query or a plain document",
            )),
        }
    }

    /// Captures this query as a template for new queries.
    ///
    /// Every query created by the returned factory starts from an independent
    /// copy of the current state, including the active path, the operation
    /// kind and the trace hook.
    pub fn to_constructor(&self) -> QueryFactory {
        QueryFactory { template: self.clone() }
    }

    pub(crate) fn apply_seed(&mut self, seed: QuerySeed, options: Option<Document>) -> QueryResult<()> {
        match seed {
            QuerySeed::Collection(collection) => {
                self.collection(collection);
            }
            QuerySeed::Filter(filter) => {
                self.where_filter(filter);
            }
            QuerySeed::Query(other) => {
                self.merge(other);
            }
        }

        if let Some(options) = options {
            self.set_options(options)?;
        }
        Ok(())
    }
}

/// Creates queries from a captured template.
#[derive(Debug, Clone)]
pub struct QueryFactory {
    template: Query,
}

impl QueryFactory {
    pub fn template(&self) -> &Query {
        &self.template
    }

    /// A fresh copy of the template.
    pub fn create(&self) -> Query {
        self.template.clone()
    }

    /// A fresh copy of the template, seeded like [`Query::with`].
    ///
    /// # Errors
    ///
    /// Fails when one of the options is rejected by its setter.
    pub fn create_from(&self, seed: impl Into<QuerySeed>, options: Option<Document>) -> QueryResult<Query> {
        let mut query = self.create();
        query.apply_seed(seed.into(), options)?;
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specification::OperationKind;
    use bson::{bson, doc};

    #[test]
    fn deep_merge_recurses_into_documents() {
        let mut target = doc! { "a": { "x": 1, "y": 1 }, "b": [1, 2] };
        deep_merge(&mut target, &doc! { "a": { "y": 2 }, "b": [3], "c": 4 });
        assert_eq!(target, doc! { "a": { "x": 1, "y": 2 }, "b": [3], "c": 4 });
    }

    #[test]
    fn merge_with_falsy_is_a_no_op() {
        let mut query = Query::new();
        query.merge_value(&Bson::Null).unwrap().merge_value(&bson!(0)).unwrap();
        query.merge_value(&bson!({})).unwrap();
        assert!(query.conditions().is_empty());
        assert!(matches!(query.merge_value(&bson!([])), Err(QueryError::InvalidArgument(msg)) if msg.starts_with("Invalid argument")));
    }

    #[test]
    fn merge_query_copies_state() {
        let source = Query::with(doc! { "x": "hi" }, Some(doc! { "select": "x y", "another": true })).unwrap();
        let mut target = Query::new();
        target.merge(&source);

        assert_eq!(target.conditions(), source.conditions());
        assert_eq!(target.fields(), source.fields());
        assert_eq!(target.options(), source.options());
    }

    #[test]
    fn merge_clones_update() {
        let mut source = Query::new();
        source.update_one(doc! { "$set": { "iTerm": true } }).unwrap();

        let mut target = Query::new();
        target.merge(&source);
        source.update_one(doc! { "$set": { "x": 2 } }).unwrap();

        assert_eq!(target.update(), Some(&doc! { "$set": { "iTerm": true } }));
        assert_ne!(target.update(), source.update());
    }

    #[test]
    fn merge_filter_then_mutate_source() {
        let original = doc! { "$set": { "iTerm": true } };
        let mut target = Query::new();
        target.merge(original.clone());
        assert_eq!(target.conditions(), &original);
    }

    #[test]
    fn merge_copies_distinct() {
        let mut source = Query::new();
        source.distinct_on("name").unwrap();
        let mut target = Query::new();
        target.merge(&source);
        assert_eq!(target.distinct_field(), Some("name"));
        assert_eq!(target.op(), None);
    }

    #[test]
    fn factory_creates_independent_copies() {
        let mut template = Query::new();
        template
            .set_options(doc! { "safe": { "w": "majority" }, "readPreference": "p" })
            .unwrap()
            .where_filter(doc! { "name": "test", "count": { "$gt": 101 } })
            .select(doc! { "name": 1, "count": 0 })
            .unwrap()
            .update_one(doc! { "$set": { "x": true } })
            .unwrap()
            .where_path("street")
            .find()
            .unwrap();

        let factory = template.to_constructor();
        let mut created = factory.create();

        assert_eq!(created.options(), &doc! { "safe": { "w": "majority" }, "readPreference": "p" });
        assert_eq!(created.conditions(), &doc! { "name": "test", "count": { "$gt": 101 } });
        assert_eq!(created.fields(), Some(&doc! { "name": 1, "count": 0 }));
        assert_eq!(created.update(), Some(&doc! { "$set": { "x": true } }));
        assert_eq!(created.path(), Some("street"));
        assert_eq!(created.op(), Some(OperationKind::Find));

        created.merge_update(doc! { "$set": { "y": 1 } }).gt(3).unwrap();
        assert_eq!(factory.template().update(), Some(&doc! { "$set": { "x": true } }));
        assert_eq!(factory.create().conditions(), &doc! { "name": "test", "count": { "$gt": 101 } });
    }

    #[test]
    fn factory_seeds_like_with() {
        let mut template = Query::new();
        template.where_value("a", 1);
        let query = template
            .to_constructor()
            .create_from(doc! { "b": 2 }, Some(doc! { "limit": 3 }))
            .unwrap();
        assert_eq!(query.conditions(), &doc! { "a": 1, "b": 2 });
        assert_eq!(query.options(), &doc! { "limit": 3i64 });
    }
}
