//! Filter evaluation for in-memory documents.
//!
//! [`DocumentEvaluator`] walks a filter document the way the store would:
//! top-level logical operators, then per-path conditions that are either a
//! literal to match or a document of operators.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, Document, datetime::DateTime};
use regex::RegexBuilder;

use docquery_core::{
    error::{QueryError, QueryResult},
    shape,
};

use crate::path;

/// Type-erased, comparable representation of BSON values.
///
/// Numbers of every width are normalized to `f64`. Values without a natural
/// order are kept as they are and only compare equal to themselves.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            other => Comparable::Other(other),
        }
    }
}

impl<'a> Comparable<'a> {
    /// Cross-type sort rank: null, numbers, strings, documents, arrays,
    /// booleans, dates, then everything else.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::Bool(_) => 5,
            Comparable::DateTime(_) => 6,
            Comparable::Other(_) => 7,
        }
    }

    /// A total order used for sorting.
    pub(crate) fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Number(a), Comparable::Number(b)) => a.total_cmp(b),
            (Comparable::Array(a), Comparable::Array(b)) => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| x.total_cmp(y))
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            _ => self
                .partial_cmp(other)
                .unwrap_or_else(|| self.rank().cmp(&other.rank())),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

fn unsupported(operator: &str) -> QueryError {
    QueryError::Collection(format!("unsupported query operator {operator}"))
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Whether the document satisfies `filter`.
    pub fn evaluate(&self, filter: &Document) -> QueryResult<bool> {
        for (key, condition) in filter {
            let matched = match key.as_str() {
                "$and" => self.all_clauses(key, condition)?,
                "$or" => self.any_clause(key, condition)?,
                "$nor" => !self.any_clause(key, condition)?,
                "$comment" => true,
                operator if shape::is_operator_key(operator) => return Err(unsupported(operator)),
                path => self.matches_path(path, condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// The documents from `documents` that satisfy `filter`, in order.
    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        filter: &Document,
    ) -> QueryResult<Vec<&'a Document>> {
        let mut matched = Vec::new();
        for document in documents {
            if DocumentEvaluator::new(document).evaluate(filter)? {
                matched.push(document);
            }
        }
        Ok(matched)
    }

    fn clauses<'f>(operator: &str, condition: &'f Bson) -> QueryResult<Vec<&'f Document>> {
        let Bson::Array(items) = condition else {
            return Err(QueryError::Collection(format!("{operator} must be an array")));
        };

        items
            .iter()
            .map(|item| match item {
                Bson::Document(clause) => Ok(clause),
                _ => Err(QueryError::Collection(format!("{operator} entries must be documents"))),
            })
            .collect()
    }

    fn all_clauses(&self, operator: &str, condition: &Bson) -> QueryResult<bool> {
        for clause in Self::clauses(operator, condition)? {
            if !self.evaluate(clause)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn any_clause(&self, operator: &str, condition: &Bson) -> QueryResult<bool> {
        for clause in Self::clauses(operator, condition)? {
            if self.evaluate(clause)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn matches_path(&self, path: &str, condition: &Bson) -> QueryResult<bool> {
        let values = path::lookup(self.document, path);

        match condition {
            Bson::Document(operators) if operators.keys().next().is_some_and(|k| shape::is_operator_key(k)) => {
                matches_operators(&values, operators)
            }
            literal => Ok(equals_any(&values, literal)),
        }
    }
}

/// Whether any value, or any element of an array value, equals `expected`.
/// A missing path equals null.
fn equals_any(values: &[&Bson], expected: &Bson) -> bool {
    let expected = Comparable::from(expected);
    if values.is_empty() {
        return expected == Comparable::Null;
    }

    values.iter().any(|value| {
        let candidate = Comparable::from(*value);
        if candidate == expected {
            return true;
        }
        match candidate {
            Comparable::Array(items) => items.iter().any(|item| item == &expected),
            _ => false,
        }
    })
}

/// The values themselves followed by the elements of array values.
fn expand<'a>(values: &[&'a Bson]) -> Vec<&'a Bson> {
    let mut expanded = Vec::with_capacity(values.len());
    for value in values {
        expanded.push(*value);
        if let Bson::Array(items) = value {
            expanded.extend(items.iter());
        }
    }
    expanded
}

fn compare_any(values: &[&Bson], expected: &Bson, accept: fn(Ordering) -> bool) -> bool {
    let expected = Comparable::from(expected);
    expand(values).into_iter().any(|value| {
        Comparable::from(value)
            .partial_cmp(&expected)
            .is_some_and(accept)
    })
}

fn in_set(values: &[&Bson], set: &Bson) -> QueryResult<bool> {
    let Bson::Array(candidates) = set else {
        return Err(QueryError::Collection("$in/$nin needs an array".to_string()));
    };
    Ok(candidates.iter().any(|candidate| equals_any(values, candidate)))
}

fn matches_operators(values: &[&Bson], operators: &Document) -> QueryResult<bool> {
    for (operator, operand) in operators {
        let matched = match operator.as_str() {
            "$eq" => equals_any(values, operand),
            "$ne" => !equals_any(values, operand),
            "$gt" => compare_any(values, operand, Ordering::is_gt),
            "$gte" => compare_any(values, operand, Ordering::is_ge),
            "$lt" => compare_any(values, operand, Ordering::is_lt),
            "$lte" => compare_any(values, operand, Ordering::is_le),
            "$in" => in_set(values, operand)?,
            "$nin" => !in_set(values, operand)?,
            "$all" => match operand {
                Bson::Array(required) => {
                    !required.is_empty() && required.iter().all(|item| equals_any(values, item))
                }
                _ => return Err(QueryError::Collection("$all needs an array".to_string())),
            },
            "$exists" => values.is_empty() != shape::is_truthy(operand),
            "$size" => {
                let size = shape::as_i64(operand)
                    .ok_or_else(|| QueryError::Collection("$size needs a number".to_string()))?;
                values
                    .iter()
                    .any(|value| matches!(value, Bson::Array(items) if items.len() as i64 == size))
            }
            "$mod" => modulo(values, operand)?,
            "$regex" => {
                let options = operators.get_str("$options").unwrap_or_default();
                regex_matches(values, operand, options)?
            }
            "$options" => true,
            "$elemMatch" => elem_match(values, operand)?,
            "$not" => match operand {
                Bson::Document(inner) => !matches_operators(values, inner)?,
                Bson::String(_) => !regex_matches(values, operand, "")?,
                _ => return Err(QueryError::Collection("$not needs a document".to_string())),
            },
            other => return Err(unsupported(other)),
        };

        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn modulo(values: &[&Bson], operand: &Bson) -> QueryResult<bool> {
    let invalid = || QueryError::Collection("$mod needs [divisor, remainder]".to_string());
    let Bson::Array(pair) = operand else {
        return Err(invalid());
    };
    let (Some(divisor), Some(remainder)) = (
        pair.first().and_then(shape::as_i64),
        pair.get(1).and_then(shape::as_i64),
    ) else {
        return Err(invalid());
    };
    if divisor == 0 {
        return Err(QueryError::Collection("$mod divisor cannot be 0".to_string()));
    }

    Ok(expand(values)
        .into_iter()
        .filter_map(shape::as_i64)
        .any(|value| value % divisor == remainder))
}

fn regex_matches(values: &[&Bson], pattern: &Bson, options: &str) -> QueryResult<bool> {
    let Bson::String(pattern) = pattern else {
        return Err(QueryError::Collection("$regex needs a string pattern".to_string()));
    };

    let regex = RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .ignore_whitespace(options.contains('x'))
        .build()
        .map_err(|e| QueryError::Collection(e.to_string()))?;

    Ok(expand(values)
        .into_iter()
        .any(|value| matches!(value, Bson::String(s) if regex.is_match(s))))
}

fn elem_match(values: &[&Bson], criteria: &Bson) -> QueryResult<bool> {
    let Bson::Document(criteria) = criteria else {
        return Err(QueryError::Collection("$elemMatch needs a document".to_string()));
    };
    let operator_form = criteria.keys().next().is_some_and(|k| shape::is_operator_key(k))
        && !criteria.contains_key("$and")
        && !criteria.contains_key("$or")
        && !criteria.contains_key("$nor");

    for value in values {
        let Bson::Array(items) = value else { continue };
        for item in items {
            let matched = match item {
                _ if operator_form => matches_operators(&[item], criteria)?,
                Bson::Document(element) => DocumentEvaluator::new(element).evaluate(criteria)?,
                _ => false,
            };
            if matched {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn matches(document: Document, filter: Document) -> bool {
        DocumentEvaluator::new(&document).evaluate(&filter).unwrap()
    }

    #[test]
    fn literals_and_comparisons() {
        let document = doc! { "name": "docquery", "age": 3, "tags": ["a", "b"] };
        assert!(matches(document.clone(), doc! { "name": "docquery" }));
        assert!(matches(document.clone(), doc! { "tags": "b" }));
        assert!(matches(document.clone(), doc! { "age": { "$gt": 2, "$lte": 3.0 } }));
        assert!(!matches(document.clone(), doc! { "age": { "$lt": 3 } }));
        assert!(matches(document.clone(), doc! { "missing": null }));
        assert!(!matches(document, doc! { "age": { "$gt": "2" } }));
    }

    #[test]
    fn sets_and_existence() {
        let document = doc! { "a": 1, "tags": ["x", "y", "z"] };
        assert!(matches(document.clone(), doc! { "a": { "$in": [5, 1] } }));
        assert!(matches(document.clone(), doc! { "a": { "$nin": [5] } }));
        assert!(matches(document.clone(), doc! { "tags": { "$all": ["z", "x"] } }));
        assert!(matches(document.clone(), doc! { "tags": { "$size": 3 } }));
        assert!(matches(document.clone(), doc! { "b": { "$exists": false } }));
        assert!(!matches(document, doc! { "a": { "$exists": false } }));
    }

    #[test]
    fn logical_clauses() {
        let document = doc! { "a": 1, "b": 2 };
        assert!(matches(document.clone(), doc! { "$or": [{ "a": 5 }, { "b": 2 }] }));
        assert!(!matches(document.clone(), doc! { "$and": [{ "a": 1 }, { "b": 3 }] }));
        assert!(matches(document.clone(), doc! { "$nor": [{ "a": 5 }] }));
        assert!(matches(document, doc! { "a": { "$not": { "$gt": 4 } } }));
    }

    #[test]
    fn regex_mod_and_elem_match() {
        let document = doc! {
            "name": "Docquery",
            "n": 10,
            "comments": [{ "by": "a", "votes": 3 }, { "by": "b", "votes": 7 }],
            "scores": [1, 8],
        };
        assert!(matches(document.clone(), doc! { "name": { "$regex": "^doc", "$options": "i" } }));
        assert!(!matches(document.clone(), doc! { "name": { "$regex": "^doc" } }));
        assert!(matches(document.clone(), doc! { "n": { "$mod": [3, 1] } }));
        assert!(matches(document.clone(), doc! { "comments": { "$elemMatch": { "by": "b", "votes": { "$gt": 5 } } } }));
        assert!(!matches(document.clone(), doc! { "comments": { "$elemMatch": { "by": "a", "votes": { "$gt": 5 } } } }));
        assert!(matches(document.clone(), doc! { "scores": { "$elemMatch": { "$gt": 5, "$lt": 9 } } }));
        assert!(matches(document, doc! { "comments.by": "b" }));
    }

    #[test]
    fn unsupported_operators_fail() {
        let document = doc! { "loc": [1, 2] };
        let err = DocumentEvaluator::new(&document)
            .evaluate(&doc! { "$where": "this.a > 1" })
            .unwrap_err();
        assert_eq!(err, QueryError::Collection("unsupported query operator $where".into()));

        assert!(
            DocumentEvaluator::new(&document)
                .evaluate(&doc! { "loc": { "$geoWithin": { "$box": [[0, 0], [3, 3]] } } })
                .is_err()
        );
    }

    #[test]
    fn total_order_ranks_types() {
        let (null, number, text) = (Bson::Null, Bson::Int32(5), Bson::String("a".into()));
        assert_eq!(Comparable::from(&null).total_cmp(&Comparable::from(&number)), Ordering::Less);
        assert_eq!(Comparable::from(&text).total_cmp(&Comparable::from(&number)), Ordering::Greater);
        assert_eq!(
            Comparable::from(&Bson::Int64(5)).total_cmp(&Comparable::from(&Bson::Double(5.0))),
            Ordering::Equal
        );
    }
}
