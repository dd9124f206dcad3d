//! Filter conditions.
//!
//! Conditions are written either for an explicit path (the `_at` variants) or
//! for the active path set by [`Query::where_path`]. Operator calls merge into
//! the operator document stored at the path, so `gt(3)` followed by `lt(8)`
//! yields `{ $gt: 3, $lt: 8 }` while a second `gt` overwrites the first.

use bson::{Bson, Document};

use crate::{
    error::{QueryError, QueryResult},
    query::Query,
};

/// One or more clauses for `$or`, `$and` or `$nor`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clauses(pub Vec<Document>);

impl From<Document> for Clauses {
    fn from(clause: Document) -> Self {
        Clauses(vec![clause])
    }
}

impl From<Vec<Document>> for Clauses {
    fn from(clauses: Vec<Document>) -> Self {
        Clauses(clauses)
    }
}

impl<const N: usize> From<[Document; N]> for Clauses {
    fn from(clauses: [Document; N]) -> Self {
        Clauses(clauses.into())
    }
}

impl Query {
    /// Sets the active path consumed by the following operator calls.
    pub fn where_path(&mut self, path: impl Into<String>) -> &mut Self {
        self.spec.path = Some(path.into());
        self
    }

    /// Sets the active path and writes `conditions[path] = value`.
    pub fn where_value(&mut self, path: impl Into<String>, value: impl Into<Bson>) -> &mut Self {
        let path = path.into();
        self.spec.conditions.insert(path.clone(), value.into());
        self.spec.path = Some(path);
        self
    }

    /// Assigns every top-level key of `filter` into the conditions,
    /// overwriting keys of the same name. Nested documents are not merged.
    pub fn where_filter(&mut self, filter: Document) -> &mut Self {
        for (key, value) in filter {
            self.spec.conditions.insert(key, value);
        }
        self
    }

    /// Merges the state of another query into this one.
    pub fn where_query(&mut self, other: &Query) -> &mut Self {
        self.merge(other)
    }

    /// Equality on the active path.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Usage`] when no path is active.
    pub fn equals(&mut self, value: impl Into<Bson>) -> QueryResult<&mut Self> {
        let path = self.resolve_path(None, "equals")?;
        self.spec.conditions.insert(path, value.into());
        Ok(self)
    }

    /// Alias of [`Query::equals`].
    pub fn eq(&mut self, value: impl Into<Bson>) -> QueryResult<&mut Self> {
        let path = self.resolve_path(None, "eq")?;
        self.spec.conditions.insert(path, value.into());
        Ok(self)
    }

    fn operator(&mut self, method: &str, key: &str, value: Bson) -> QueryResult<&mut Self> {
        let path = self.resolve_path(None, method)?;
        self.set_operator(&path, key, value);
        Ok(self)
    }

    fn operator_at(&mut self, path: &str, key: &str, value: Bson) -> &mut Self {
        self.set_operator(path, key, value);
        self
    }

    /// `$gt` on the active path.
    pub fn gt(&mut self, value: impl Into<Bson>) -> QueryResult<&mut Self> {
        self.operator("gt", "$gt", value.into())
    }

    pub fn gt_at(&mut self, path: &str, value: impl Into<Bson>) -> &mut Self {
        self.operator_at(path, "$gt", value.into())
    }

    /// `$gte` on the active path.
    pub fn gte(&mut self, value: impl Into<Bson>) -> QueryResult<&mut Self> {
        self.operator("gte", "$gte", value.into())
    }

    pub fn gte_at(&mut self, path: &str, value: impl Into<Bson>) -> &mut Self {
        self.operator_at(path, "$gte", value.into())
    }

    /// `$lt` on the active path.
    pub fn lt(&mut self, value: impl Into<Bson>) -> QueryResult<&mut Self> {
        self.operator("lt", "$lt", value.into())
    }

    pub fn lt_at(&mut self, path: &str, value: impl Into<Bson>) -> &mut Self {
        self.operator_at(path, "$lt", value.into())
    }

    /// `$lte` on the active path.
    pub fn lte(&mut self, value: impl Into<Bson>) -> QueryResult<&mut Self> {
        self.operator("lte", "$lte", value.into())
    }

    pub fn lte_at(&mut self, path: &str, value: impl Into<Bson>) -> &mut Self {
        self.operator_at(path, "$lte", value.into())
    }

    /// `$ne` on the active path.
    pub fn ne(&mut self, value: impl Into<Bson>) -> QueryResult<&mut Self> {
        self.operator("ne", "$ne", value.into())
    }

    pub fn ne_at(&mut self, path: &str, value: impl Into<Bson>) -> &mut Self {
        self.operator_at(path, "$ne", value.into())
    }

    /// `$in` on the active path.
    pub fn in_(&mut self, values: impl Into<Bson>) -> QueryResult<&mut Self> {
        self.operator("in", "$in", values.into())
    }

    pub fn in_at(&mut self, path: &str, values: impl Into<Bson>) -> &mut Self {
        self.operator_at(path, "$in", values.into())
    }

    /// `$nin` on the active path.
    pub fn nin(&mut self, values: impl Into<Bson>) -> QueryResult<&mut Self> {
        self.operator("nin", "$nin", values.into())
    }

    pub fn nin_at(&mut self, path: &str, values: impl Into<Bson>) -> &mut Self {
        self.operator_at(path, "$nin", values.into())
    }

    /// `$all` on the active path.
    pub fn all(&mut self, values: impl Into<Bson>) -> QueryResult<&mut Self> {
        self.operator("all", "$all", values.into())
    }

    pub fn all_at(&mut self, path: &str, values: impl Into<Bson>) -> &mut Self {
        self.operator_at(path, "$all", values.into())
    }

    /// `$regex` on the active path. Accepts a pattern string or a
    /// [`bson::Regex`].
    pub fn regex(&mut self, pattern: impl Into<Bson>) -> QueryResult<&mut Self> {
        self.operator("regex", "$regex", pattern.into())
    }

    pub fn regex_at(&mut self, path: &str, pattern: impl Into<Bson>) -> &mut Self {
        self.operator_at(path, "$regex", pattern.into())
    }

    /// `$size` on the active path.
    pub fn size(&mut self, size: impl Into<Bson>) -> QueryResult<&mut Self> {
        self.operator("size", "$size", size.into())
    }

    pub fn size_at(&mut self, path: &str, size: impl Into<Bson>) -> &mut Self {
        self.operator_at(path, "$size", size.into())
    }

    /// `$maxDistance` on the active path.
    pub fn max_distance(&mut self, distance: impl Into<Bson>) -> QueryResult<&mut Self> {
        self.operator("maxDistance", "$maxDistance", distance.into())
    }

    pub fn max_distance_at(&mut self, path: &str, distance: impl Into<Bson>) -> &mut Self {
        self.operator_at(path, "$maxDistance", distance.into())
    }

    /// `$minDistance` on the active path.
    pub fn min_distance(&mut self, distance: impl Into<Bson>) -> QueryResult<&mut Self> {
        self.operator("minDistance", "$minDistance", distance.into())
    }

    pub fn min_distance_at(&mut self, path: &str, distance: impl Into<Bson>) -> &mut Self {
        self.operator_at(path, "$minDistance", distance.into())
    }

    /// `$exists` on the active path.
    pub fn exists(&mut self, exists: bool) -> QueryResult<&mut Self> {
        self.operator("exists", "$exists", Bson::Boolean(exists))
    }

    pub fn exists_at(&mut self, path: &str, exists: bool) -> &mut Self {
        self.operator_at(path, "$exists", Bson::Boolean(exists))
    }

    /// Writes `{ $mod: [divisor, remainder] }`.
    ///
    /// Accepted forms:
    ///
    /// * `[[d, r]]` and `[d, r]` apply to the active path
    /// * `["path", [d, r]]` and `["path", d, r]` apply to `path`
    ///
    /// # Errors
    ///
    /// [`QueryError::Usage`] when a bare form is used without an active path,
    /// [`QueryError::InvalidArgument`] for any other arity.
    pub fn mod_(&mut self, args: &[Bson]) -> QueryResult<&mut Self> {
        let (path, pair) = match args {
            [Bson::Array(pair)] => (None, pair.clone()),
            [Bson::String(path), Bson::Array(pair)] => (Some(path.as_str()), pair.clone()),
            [divisor, remainder] => (None, vec![divisor.clone(), remainder.clone()]),
            [Bson::String(path), divisor, remainder] => {
                (Some(path.as_str()), vec![divisor.clone(), remainder.clone()])
            }
            _ => return Err(QueryError::invalid("Invalid mod() argument")),
        };

        let path = self.resolve_path(path, "mod")?;
        self.set_operator(&path, "$mod", Bson::Array(pair));
        Ok(self)
    }

    /// `$elemMatch` with a criteria document on the active path.
    ///
    /// # Errors
    ///
    /// [`QueryError::InvalidArgument`] when `criteria` is not a document,
    /// [`QueryError::Usage`] when no path is active.
    pub fn elem_match(&mut self, criteria: impl Into<Bson>) -> QueryResult<&mut Self> {
        let criteria = match criteria.into() {
            Bson::Document(criteria) => criteria,
            _ => return Err(QueryError::invalid("Invalid argument")),
        };
        self.operator("elemMatch", "$elemMatch", Bson::Document(criteria))
    }

    pub fn elem_match_at(&mut self, path: &str, criteria: impl Into<Bson>) -> QueryResult<&mut Self> {
        match criteria.into() {
            Bson::Document(criteria) => Ok(self.operator_at(path, "$elemMatch", Bson::Document(criteria))),
            _ => Err(QueryError::invalid("Invalid argument")),
        }
    }

    /// `$elemMatch` built from a nested query. The closure receives a fresh
    /// builder and its conditions become the operand.
    pub fn elem_match_with<F>(&mut self, build: F) -> QueryResult<&mut Self>
    where
        F: FnOnce(&mut Query) -> QueryResult<()>,
    {
        let path = self.resolve_path(None, "elemMatch")?;
        self.elem_match_with_at(&path, build)
    }

    pub fn elem_match_with_at<F>(&mut self, path: &str, build: F) -> QueryResult<&mut Self>
    where
        F: FnOnce(&mut Query) -> QueryResult<()>,
    {
        let mut nested = Query::new();
        build(&mut nested)?;
        Ok(self.operator_at(path, "$elemMatch", Bson::Document(nested.spec.conditions)))
    }

    fn push_logical(&mut self, key: &str, clauses: Clauses) -> &mut Self {
        let clauses = clauses.0.into_iter().map(Bson::Document);

        if let Some(Bson::Array(existing)) = self.spec.conditions.get_mut(key) {
            existing.extend(clauses);
            return self;
        }

        self.spec.conditions.insert(key, Bson::Array(clauses.collect()));
        self
    }

    /// Appends clauses to `$or`.
    pub fn or(&mut self, clauses: impl Into<Clauses>) -> &mut Self {
        self.push_logical("$or", clauses.into())
    }

    /// Appends clauses to `$and`.
    pub fn and(&mut self, clauses: impl Into<Clauses>) -> &mut Self {
        self.push_logical("$and", clauses.into())
    }

    /// Appends clauses to `$nor`.
    pub fn nor(&mut self, clauses: impl Into<Clauses>) -> &mut Self {
        self.push_logical("$nor", clauses.into())
    }

    /// Stores `expression` verbatim under `$where`.
    pub fn where_js(&mut self, expression: impl Into<Bson>) -> &mut Self {
        self.spec.conditions.insert("$where", expression.into());
        self
    }
}
