//! Field selection.
//!
//! `select` accepts a document, a whitespace delimited string or a list of
//! tokens. A token prefixed with `-` excludes the field (`0`), any other token
//! includes it (`1`). Successive calls merge key by key.

use bson::{Bson, Document};

use crate::{
    args::Args,
    error::{QueryError, QueryResult},
    permissions::Restricted,
    query::Query,
    shape,
};

/// Argument accepted by [`Query::select`].
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// A falsy argument, ignored.
    Empty,
    Fields(Document),
    Tokens(Vec<String>),
    /// Any other shape, rejected.
    Invalid(Bson),
}

impl From<&str> for Selection {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            return Selection::Empty;
        }
        Selection::Tokens(value.split_whitespace().map(str::to_string).collect())
    }
}

impl From<String> for Selection {
    fn from(value: String) -> Self {
        Selection::from(value.as_str())
    }
}

impl From<Document> for Selection {
    fn from(value: Document) -> Self {
        Selection::Fields(value)
    }
}

impl From<Vec<&str>> for Selection {
    fn from(value: Vec<&str>) -> Self {
        Selection::Tokens(value.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for Selection {
    fn from(value: Vec<String>) -> Self {
        Selection::Tokens(value)
    }
}

impl From<Bson> for Selection {
    fn from(value: Bson) -> Self {
        if !shape::is_truthy(&value) {
            return Selection::Empty;
        }

        match value {
            Bson::String(s) => Selection::from(s),
            Bson::Document(doc) => Selection::Fields(doc),
            Bson::Array(items) if items.iter().all(|item| matches!(item, Bson::String(_))) => {
                Selection::Tokens(
                    items
                        .into_iter()
                        .filter_map(|item| match item {
                            Bson::String(s) => Some(s),
                            _ => None,
                        })
                        .collect(),
                )
            }
            other => Selection::Invalid(other),
        }
    }
}

impl Query {
    /// Adds fields to the projection.
    ///
    /// ```ignore
    /// query.select("a b -c")?;          // { a: 1, b: 1, c: 0 }
    /// query.select(vec!["x", "-y"])?;   // { x: 1, y: 0 }
    /// query.select(doc! { "z": 1 })?;
    /// ```
    ///
    /// # Errors
    ///
    /// [`QueryError::Compatibility`] when the bound operation denies a
    /// projection, [`QueryError::InvalidArgument`] for an unsupported shape.
    pub fn select(&mut self, selection: impl Into<Selection>) -> QueryResult<&mut Self> {
        let selection = selection.into();
        if selection == Selection::Empty {
            return Ok(self);
        }

        self.check_permitted(Restricted::Select)?;

        match selection {
            Selection::Empty => {}
            Selection::Fields(doc) => {
                let fields = self.fields_mut();
                for (key, value) in doc {
                    fields.insert(key, value);
                }
            }
            Selection::Tokens(tokens) => {
                let fields = self.fields_mut();
                for token in tokens.iter().filter(|t| !t.is_empty()) {
                    match token.strip_prefix('-') {
                        Some(excluded) => fields.insert(excluded, 0),
                        None => fields.insert(token.as_str(), 1),
                    };
                }
            }
            Selection::Invalid(_) => {
                return Err(QueryError::invalid(
                    "Invalid select() argument. Must be string or object.",
                ));
            }
        }

        Ok(self)
    }

    /// Whether any field has been selected.
    pub fn selected(&self) -> bool {
        self.spec.fields.as_ref().is_some_and(|fields| !fields.is_empty())
    }

    /// Whether the projection only includes fields.
    pub fn selected_inclusively(&self) -> bool {
        match &self.spec.fields {
            Some(fields) if !fields.is_empty() => fields
                .values()
                .all(|value| !shape::is_exclusion_marker(value) && !shape::is_meta_descriptor(value)),
            _ => false,
        }
    }

    /// Whether the projection excludes any field, `_id` included.
    pub fn selected_exclusively(&self) -> bool {
        self.spec
            .fields
            .as_ref()
            .is_some_and(|fields| fields.values().any(shape::is_exclusion_marker))
    }

    /// Writes `fields[path] = { $slice: spec }`.
    ///
    /// Accepted forms:
    ///
    /// * `[count]` or `[[skip, limit]]` for the active path
    /// * `[skip, limit]` (two numbers) for the active path
    /// * `["path", count]`, `["path", [skip, limit]]` or `["path", skip, limit]`
    /// * `[{ path: spec, ... }]` to slice several paths at once
    ///
    /// # Errors
    ///
    /// [`QueryError::Usage`] when a bare form is used without an active path,
    /// [`QueryError::InvalidArgument`] for more than three arguments.
    pub fn slice(&mut self, args: &[Bson]) -> QueryResult<&mut Self> {
        if args.is_empty() {
            return Ok(self);
        }

        self.check_permitted(Restricted::Slice)?;

        let (path, spec) = match args {
            [Bson::Document(paths)] => {
                let fields = self.fields_mut();
                for (path, spec) in paths {
                    fields.insert(path.clone(), slice_of(spec.clone()));
                }
                return Ok(self);
            }
            [spec] => (self.resolve_path(None, "slice")?, spec.clone()),
            [skip, limit] if shape::is_number(skip) => {
                (self.resolve_path(None, "slice")?, Bson::Array(vec![skip.clone(), limit.clone()]))
            }
            _ => match Args::split(args, 1) {
                Args::WithPath(path, [spec]) => (path.to_string(), spec.clone()),
                Args::WithPath(path, [skip, limit]) => {
                    (path.to_string(), Bson::Array(vec![skip.clone(), limit.clone()]))
                }
                _ => return Err(QueryError::invalid("Invalid slice() argument")),
            },
        };

        self.fields_mut().insert(path, slice_of(spec));
        Ok(self)
    }
}

fn slice_of(spec: Bson) -> Bson {
    let mut slice = Document::new();
    slice.insert("$slice", spec);
    Bson::Document(slice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{bson, doc};

    #[test]
    fn select_string_and_tokens_agree() {
        let mut a = Query::new();
        a.select("x -y").unwrap();
        let mut b = Query::new();
        b.select(vec!["x", "-y"]).unwrap();
        assert_eq!(a.fields(), Some(&doc! { "x": 1, "y": 0 }));
        assert_eq!(a.fields(), b.fields());
    }

    #[test]
    fn select_merges_successive_calls() {
        let mut query = Query::new();
        query
            .select("a  b")
            .unwrap()
            .select(doc! { "c": 0, "a": 0 })
            .unwrap()
            .select(bson!(["d"]))
            .unwrap();
        assert_eq!(query.fields(), Some(&doc! { "a": 0, "b": 1, "c": 0, "d": 1 }));
    }

    #[test]
    fn select_ignores_falsy_and_rejects_other_shapes() {
        let mut query = Query::new();
        query.select("").unwrap().select(Bson::Null).unwrap().select(bson!(0)).unwrap();
        assert_eq!(query.fields(), None);

        let err = query.select(bson!(4)).unwrap_err();
        assert_eq!(err, QueryError::invalid("Invalid select() argument. Must be string or object."));
        assert!(query.select(bson!([1, 2])).is_err());
    }

    #[test]
    fn select_is_denied_after_distinct() {
        let mut query = Query::new();
        query.distinct_on("name").unwrap();
        assert_eq!(query.select("x").unwrap_err().to_string(), "select cannot be used with distinct");
    }

    #[test]
    fn projection_classification() {
        let mut query = Query::new();
        assert!(!query.selected());
        assert!(!query.selected_inclusively());
        assert!(!query.selected_exclusively());

        query.select("name").unwrap();
        assert!(query.selected());
        assert!(query.selected_inclusively());
        assert!(!query.selected_exclusively());

        let mut query = Query::new();
        query.select("-name").unwrap();
        assert!(query.selected_exclusively());
        assert!(!query.selected_inclusively());

        let mut query = Query::new();
        query.select("-_id").unwrap();
        assert!(query.selected_exclusively());

        let mut query = Query::new();
        query.select(doc! { "score": { "$meta": "textScore" } }).unwrap();
        assert!(!query.selected_inclusively());
        assert!(!query.selected_exclusively());
    }

    #[test]
    fn slice_forms() {
        let mut query = Query::new();
        assert!(query.slice(&[]).is_ok());
        assert_eq!(query.fields(), None);

        assert!(matches!(query.slice(&[bson!(1)]), Err(QueryError::Usage(_))));
        assert!(matches!(query.slice(&[bson!(2), bson!(3)]), Err(QueryError::Usage(_))));

        query.where_path("collection").slice(&[bson!(5)]).unwrap();
        assert_eq!(query.fields(), Some(&doc! { "collection": { "$slice": 5 } }));

        query.slice(&[bson!([5, 10])]).unwrap();
        assert_eq!(query.fields(), Some(&doc! { "collection": { "$slice": [5, 10] } }));

        query.slice(&[bson!(2), bson!(3)]).unwrap();
        assert_eq!(query.fields(), Some(&doc! { "collection": { "$slice": [2, 3] } }));

        let mut query = Query::new();
        query.slice(&[bson!({ "collection": [5, 10] })]).unwrap();
        assert_eq!(query.fields(), Some(&doc! { "collection": { "$slice": [5, 10] } }));

        let mut query = Query::new();
        query.slice(&[bson!("collection"), bson!([-5, 2])]).unwrap();
        assert_eq!(query.fields(), Some(&doc! { "collection": { "$slice": [-5, 2] } }));

        let mut query = Query::new();
        query.slice(&[bson!("collection"), bson!(14), bson!(10)]).unwrap();
        assert_eq!(query.fields(), Some(&doc! { "collection": { "$slice": [14, 10] } }));

        assert!(matches!(
            Query::new().slice(&[bson!("a"), bson!(1), bson!(2), bson!(3)]),
            Err(QueryError::InvalidArgument(_))
        ));
    }
}
