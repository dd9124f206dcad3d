//! Sort order.
//!
//! Two syntax families exist and a query sticks to the first one used:
//!
//! - keyed: `"a -b"`, `{ a: 1, b: "desc" }` or ordered entries, stored as a document
//! - pairs: `[["a", 1], ["b", -1]]`, stored as an array of `[field, direction]`

use bson::{Bson, Document};

use crate::{
    error::{QueryError, QueryResult},
    permissions::Restricted,
    query::Query,
    shape,
};

/// Argument accepted by [`Query::sort`].
#[derive(Debug, Clone, PartialEq)]
pub enum SortArg {
    /// A falsy argument, ignored.
    Empty,
    /// Field/direction entries of the keyed family, in order.
    Keyed(Vec<(String, Bson)>),
    /// Elements of the array-of-pairs family, validated when applied.
    Pairs(Vec<Bson>),
    /// Any other shape, rejected.
    Invalid,
}

impl SortArg {
    /// Keyed entries from an ordered map-like source.
    pub fn entries<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Bson>,
        I: IntoIterator<Item = (K, V)>,
    {
        SortArg::Keyed(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<&str> for SortArg {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            return SortArg::Empty;
        }

        SortArg::Keyed(
            value
                .split_whitespace()
                .map(|token| match token.strip_prefix('-') {
                    Some(field) => (field.to_string(), Bson::Int32(-1)),
                    None => (token.to_string(), Bson::Int32(1)),
                })
                .collect(),
        )
    }
}

impl From<String> for SortArg {
    fn from(value: String) -> Self {
        SortArg::from(value.as_str())
    }
}

impl From<Document> for SortArg {
    fn from(value: Document) -> Self {
        SortArg::Keyed(value.into_iter().collect())
    }
}

impl<V: Into<Bson>> From<Vec<(&str, V)>> for SortArg {
    fn from(value: Vec<(&str, V)>) -> Self {
        SortArg::Pairs(
            value
                .into_iter()
                .map(|(field, direction)| Bson::Array(vec![Bson::String(field.to_string()), direction.into()]))
                .collect(),
        )
    }
}

impl From<Bson> for SortArg {
    fn from(value: Bson) -> Self {
        if !shape::is_truthy(&value) {
            return SortArg::Empty;
        }

        match value {
            Bson::String(s) => SortArg::from(s),
            Bson::Document(doc) => SortArg::from(doc),
            Bson::Array(items) => SortArg::Pairs(items),
            _ => SortArg::Invalid,
        }
    }
}

fn mixed_syntax() -> QueryError {
    QueryError::invalid("Can't mix sort syntaxes. Use either array or object")
}

/// Normalizes a direction to `1` or `-1`. Falsy values sort ascending.
fn direction(value: &Bson) -> Option<i32> {
    if !shape::is_truthy(value) {
        return Some(1);
    }

    match value {
        Bson::Int32(n) => normalize_number(*n as f64),
        Bson::Int64(n) => normalize_number(*n as f64),
        Bson::Double(n) => normalize_number(*n),
        Bson::String(s) => match s.to_lowercase().as_str() {
            "1" | "asc" | "ascending" => Some(1),
            "-1" | "desc" | "descending" => Some(-1),
            _ => None,
        },
        _ => None,
    }
}

fn normalize_number(n: f64) -> Option<i32> {
    if n == 1.0 {
        Some(1)
    } else if n == -1.0 {
        Some(-1)
    } else {
        None
    }
}

impl Query {
    /// Sets the sort order.
    ///
    /// ```ignore
    /// query.sort("a -c b")?;                               // { a: 1, c: -1, b: 1 }
    /// query.sort(doc! { "a": "asc", "b": "descending" })?;
    /// other.sort(vec![("a", -1), ("b", 1)])?;              // [["a", -1], ["b", 1]]
    /// ```
    ///
    /// # Errors
    ///
    /// [`QueryError::Compatibility`] when the bound operation denies sorting,
    /// [`QueryError::InvalidArgument`] for an unknown direction, a malformed
    /// pair, or a call that switches syntax family.
    pub fn sort(&mut self, sort: impl Into<SortArg>) -> QueryResult<&mut Self> {
        let sort = sort.into();
        if sort == SortArg::Empty {
            return Ok(self);
        }

        self.check_permitted(Restricted::Sort)?;

        let sort = match sort {
            SortArg::Empty => return Ok(self),
            SortArg::Keyed(entries) => Bson::Document(self.keyed_sort(entries)?),
            SortArg::Pairs(pairs) => Bson::Array(self.paired_sort(pairs)?),
            SortArg::Invalid => {
                return Err(QueryError::invalid(
                    "Invalid sort() argument. Must be a string, object, or array.",
                ));
            }
        };

        self.spec.options.insert("sort", sort);
        Ok(self)
    }

    fn keyed_sort(&self, entries: Vec<(String, Bson)>) -> QueryResult<Document> {
        let mut sort = match self.spec.options.get("sort") {
            None => Document::new(),
            Some(Bson::Document(existing)) => existing.clone(),
            Some(_) => return Err(mixed_syntax()),
        };

        for (field, value) in entries {
            if let Bson::Document(descriptor) = &value
                && let Some(meta) = descriptor.get("$meta")
            {
                let mut meta_only = Document::new();
                meta_only.insert("$meta", meta.clone());
                sort.insert(field, meta_only);
                continue;
            }

            let direction = direction(&value).ok_or_else(|| {
                QueryError::invalid(format!("Invalid sort value: {{ {field}: {value} }}"))
            })?;
            sort.insert(field, direction);
        }

        Ok(sort)
    }

    fn paired_sort(&self, pairs: Vec<Bson>) -> QueryResult<Vec<Bson>> {
        let mut sort = match self.spec.options.get("sort") {
            None => Vec::new(),
            Some(Bson::Array(existing)) => existing.clone(),
            Some(_) => return Err(mixed_syntax()),
        };

        for pair in pairs {
            let (field, value) = match &pair {
                Bson::Array(pair) => match pair.as_slice() {
                    [Bson::String(field)] => (field.clone(), Bson::Null),
                    [Bson::String(field), value, ..] => (field.clone(), value.clone()),
                    _ => return Err(QueryError::invalid("Invalid sort() argument, must be array of arrays")),
                },
                _ => return Err(QueryError::invalid("Invalid sort() argument, must be array of arrays")),
            };

            let direction = direction(&value).ok_or_else(|| {
                QueryError::invalid(format!("Invalid sort value: [ {field}, {value} ]"))
            })?;
            sort.push(Bson::Array(vec![Bson::String(field), Bson::Int32(direction)]));
        }

        Ok(sort)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{bson, doc};

    #[test]
    fn string_tokens() {
        let mut query = Query::new();
        query.sort("a -c b").unwrap();
        assert_eq!(query.options().get("sort"), Some(&bson!({ "a": 1, "c": -1, "b": 1 })));
    }

    #[test]
    fn document_values_are_normalized() {
        let mut query = Query::new();
        query
            .sort(doc! { "a": 1, "c": -1, "b": "asc", "e": "descending", "f": "ascending", "g": "-1", "h": 0 })
            .unwrap();
        assert_eq!(
            query.options().get_document("sort").unwrap(),
            &doc! { "a": 1, "c": -1, "b": 1, "e": -1, "f": 1, "g": -1, "h": 1 }
        );
    }

    #[test]
    fn pairs_are_stored_as_arrays() {
        let mut query = Query::new();
        query.sort(vec![("a", bson!(-1)), ("c", bson!(1)), ("b", bson!("desc"))]).unwrap();
        query.sort(bson!([["e", "ascending"]])).unwrap();
        assert_eq!(
            query.options().get("sort"),
            Some(&bson!([["a", -1], ["c", 1], ["b", -1], ["e", 1]]))
        );
    }

    #[test]
    fn entries_behave_like_keyed() {
        let mut query = Query::new();
        query.sort(SortArg::entries([("field", 1), ("test", -1)])).unwrap();
        assert_eq!(query.options().get_document("sort").unwrap(), &doc! { "field": 1, "test": -1 });
    }

    #[test]
    fn meta_passes_through() {
        let mut query = Query::new();
        query.sort(doc! { "score": { "$meta": "textScore" } }).unwrap();
        assert_eq!(query.options().get("sort"), Some(&bson!({ "score": { "$meta": "textScore" } })));
    }

    #[test]
    fn falsy_is_a_no_op() {
        let mut query = Query::new();
        query.sort("").unwrap().sort(Bson::Null).unwrap();
        assert!(query.options().is_empty());
    }

    #[test]
    fn rejects_bad_input() {
        let mut query = Query::new();
        assert_eq!(
            query.sort(bson!([["a", 1], { "b": 5 }])).unwrap_err(),
            QueryError::invalid("Invalid sort() argument, must be array of arrays")
        );
        assert_eq!(
            query.sort(bson!(5)).unwrap_err(),
            QueryError::invalid("Invalid sort() argument. Must be a string, object, or array.")
        );
        assert!(query.sort(doc! { "a": 2 }).unwrap_err().to_string().starts_with("Invalid sort value"));
        assert!(query.sort(doc! { "a": "up" }).is_err());
        assert!(query.options().is_empty());
    }

    #[test]
    fn mixing_families_fails() {
        let mut query = Query::new();
        query.sort(doc! { "field": 1 }).unwrap();
        assert_eq!(query.sort(vec![("test", -1)]).unwrap_err(), mixed_syntax());

        let mut query = Query::new();
        query.sort(vec![("field", 1)]).unwrap();
        assert_eq!(query.sort(doc! { "test": 1 }).unwrap_err(), mixed_syntax());
        assert_eq!(query.sort("test").unwrap_err(), mixed_syntax());
    }

    #[test]
    fn denied_after_distinct() {
        let mut query = Query::new();
        query.distinct_on("name").unwrap();
        assert_eq!(query.sort("x").unwrap_err().to_string(), "sort cannot be used with distinct");
    }
}
