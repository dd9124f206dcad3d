//! Update documents.
//!
//! Updates accumulate through a deep merge, so `{ $set: { a: 1 } }` followed
//! by `{ $set: { b: 2 } }` becomes `{ $set: { a: 1, b: 2 } }`. Key order is
//! preserved throughout because some drivers are order sensitive (for example
//! `$push` with `$each`, `$slice` and `$sort`).

use bson::{Bson, Document};

use crate::{
    merge::deep_merge,
    query::{Criteria, Query},
    shape,
};

impl Query {
    /// Merges an update document, or another query's update, into this one.
    pub fn merge_update(&mut self, source: impl Into<Criteria>) -> &mut Self {
        let source = match source.into() {
            Criteria::Filter(update) => Some(update),
            Criteria::Query(other) => other.spec.update,
        };

        let update = self.spec.update.get_or_insert_with(Document::new);
        if let Some(source) = source {
            deep_merge(update, &source);
        }
        self
    }

    /// Whether the update replaces whole documents.
    pub fn is_overwrite(&self) -> bool {
        self.spec.options.get("overwrite").is_some_and(shape::is_truthy)
    }

    /// The update document sent to the store.
    ///
    /// Returns a clone with the original key order. Unless `overwrite` is set,
    /// top-level keys that are not operators are folded into `$set`, merged
    /// after any explicit `$set` content.
    pub fn update_for_exec(&self) -> Document {
        let Some(update) = &self.spec.update else {
            return Document::new();
        };

        if self.is_overwrite() {
            return update.clone();
        }

        let mut compiled = Document::new();
        for (key, value) in update {
            if !shape::is_operator_key(key) {
                if !compiled.contains_key("$set") {
                    let seed = update.get("$set").cloned().unwrap_or_else(|| Bson::Document(Document::new()));
                    compiled.insert("$set", seed);
                }
                if let Some(Bson::Document(set)) = compiled.get_mut("$set") {
                    set.insert(key.clone(), value.clone());
                }
            } else if key == "$set" {
                if !compiled.contains_key("$set") {
                    compiled.insert(key.clone(), value.clone());
                }
            } else {
                compiled.insert(key.clone(), value.clone());
            }
        }

        compiled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn updates_merge_deeply() {
        let mut query = Query::new();
        query
            .merge_update(doc! { "$set": { "a": 1 } })
            .merge_update(doc! { "$set": { "b": 2 }, "$inc": { "n": 1 } });
        assert_eq!(query.update(), Some(&doc! { "$set": { "a": 1, "b": 2 }, "$inc": { "n": 1 } }));
    }

    #[test]
    fn merging_from_a_query_copies_its_update() {
        let mut source = Query::new();
        source.merge_update(doc! { "x": 1 });

        let mut query = Query::new();
        query.merge_update(&source);
        assert_eq!(query.update(), Some(&doc! { "x": 1 }));

        source.merge_update(doc! { "y": 2 });
        assert_eq!(query.update(), Some(&doc! { "x": 1 }));
    }

    #[test]
    fn plain_keys_fold_into_set() {
        let mut query = Query::new();
        query.merge_update(doc! { "name": "a", "$inc": { "n": 1 }, "$set": { "age": 3 } });
        assert_eq!(
            query.update_for_exec(),
            doc! { "$set": { "age": 3, "name": "a" }, "$inc": { "n": 1 } }
        );
    }

    #[test]
    fn overwrite_keeps_the_document() {
        let mut query = Query::new();
        query.merge_update(doc! { "name": "a" }).set_options(doc! { "overwrite": true }).unwrap();
        assert_eq!(query.update_for_exec(), doc! { "name": "a" });
    }

    #[test]
    fn key_order_survives() {
        let mut query = Query::new();
        query.merge_update(doc! { "$push": { "n": { "$each": [{ "x": 10 }], "$slice": -1, "$sort": { "x": 1 } } } });

        let compiled = query.update_for_exec();
        let keys = compiled
            .get_document("$push")
            .and_then(|push| push.get_document("n"))
            .map(|n| n.keys().cloned().collect::<Vec<_>>())
            .unwrap();
        assert_eq!(keys, ["$each", "$slice", "$sort"]);
    }

    #[test]
    fn empty_without_update() {
        assert!(Query::new().update_for_exec().is_empty());
    }
}
