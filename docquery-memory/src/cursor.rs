//! Ordering, paging and projection of matched documents.

use std::cmp::Ordering;

use bson::{Bson, Document};

use docquery_core::{
    error::{QueryError, QueryResult},
    shape,
};

use crate::{evaluator::Comparable, path};

/// Sort keys read from the `sort` option: a document of directions or an
/// array of `[field, direction]` pairs.
pub(crate) fn sort_keys(options: &Document) -> QueryResult<Vec<(String, i32)>> {
    let direction = |field: &str, value: &Bson| -> QueryResult<i32> {
        match shape::as_i64(value) {
            Some(d) if d < 0 => Ok(-1),
            Some(_) => Ok(1),
            None if shape::is_meta_descriptor(value) => {
                Err(QueryError::Collection(format!("$meta sort on {field} is not supported")))
            }
            None => Err(QueryError::Collection(format!("invalid sort direction for {field}"))),
        }
    };

    match options.get("sort") {
        None | Some(Bson::Null) => Ok(Vec::new()),
        Some(Bson::Document(keys)) => keys
            .iter()
            .map(|(field, value)| Ok((field.clone(), direction(field, value)?)))
            .collect(),
        Some(Bson::Array(pairs)) => pairs
            .iter()
            .map(|pair| match pair {
                Bson::Array(pair) if pair.len() == 2 => match (&pair[0], &pair[1]) {
                    (Bson::String(field), value) => Ok((field.clone(), direction(field, value)?)),
                    _ => Err(QueryError::Collection("sort pairs must start with a field".to_string())),
                },
                _ => Err(QueryError::Collection("sort pairs must be [field, direction]".to_string())),
            })
            .collect(),
        Some(other) => Err(QueryError::Collection(format!("invalid sort option {other}"))),
    }
}

/// Orders two documents by `keys`, missing values sorting as null.
pub(crate) fn compare(a: &Document, b: &Document, keys: &[(String, i32)]) -> Ordering {
    for (field, direction) in keys {
        let left = path::get(a, field).map(Comparable::from).unwrap_or(Comparable::Null);
        let right = path::get(b, field).map(Comparable::from).unwrap_or(Comparable::Null);

        let ordering = left.total_cmp(&right);
        if ordering != Ordering::Equal {
            return if *direction < 0 { ordering.reverse() } else { ordering };
        }
    }
    Ordering::Equal
}

pub(crate) fn sort(documents: &mut [Document], keys: &[(String, i32)]) {
    if !keys.is_empty() {
        documents.sort_by(|a, b| compare(a, b, keys));
    }
}

/// Applies `skip` and `limit`. A negative limit counts like its absolute
/// value and zero means no limit.
pub(crate) fn page<T>(documents: Vec<T>, options: &Document) -> Vec<T> {
    let skip = options.get("skip").and_then(shape::as_i64).unwrap_or(0).max(0) as usize;
    let limit = match options.get("limit").and_then(shape::as_i64).unwrap_or(0) {
        0 => usize::MAX,
        n => n.unsigned_abs() as usize,
    };

    documents.into_iter().skip(skip).take(limit).collect()
}

/// Applies the `projection` option to one document.
pub(crate) fn project(document: &Document, options: &Document) -> QueryResult<Document> {
    let Some(projection) = options.get("projection") else {
        return Ok(document.clone());
    };
    let Bson::Document(projection) = projection else {
        return Err(QueryError::Collection("projection must be a document".to_string()));
    };

    let inclusive = projection
        .iter()
        .any(|(key, value)| key != "_id" && !matches!(value, Bson::Document(_)) && !shape::is_exclusion_marker(value));

    let mut projected = if inclusive {
        let mut included = Document::new();
        if !projection.get("_id").is_some_and(shape::is_exclusion_marker)
            && let Some(id) = document.get("_id")
        {
            included.insert("_id", id.clone());
        }
        for (field, value) in projection {
            if field == "_id" || shape::is_exclusion_marker(value) {
                continue;
            }
            if let Some(found) = path::get(document, field) {
                path::set(&mut included, field, found.clone());
            }
        }
        included
    } else {
        let mut excluded = document.clone();
        for (field, value) in projection {
            if shape::is_exclusion_marker(value) {
                path::remove(&mut excluded, field);
            }
        }
        excluded
    };

    for (field, value) in projection {
        if let Bson::Document(spec) = value
            && let Some(slice) = spec.get("$slice")
        {
            apply_slice(&mut projected, field, slice)?;
        }
    }
    Ok(projected)
}

fn apply_slice(document: &mut Document, field: &str, slice: &Bson) -> QueryResult<()> {
    let Some(Bson::Array(items)) = path::get(document, field) else {
        return Ok(());
    };
    let len = items.len() as i64;

    let (start, count) = match slice {
        Bson::Array(pair) if pair.len() == 2 => {
            let skip = shape::as_i64(&pair[0]);
            let limit = shape::as_i64(&pair[1]);
            match (skip, limit) {
                (Some(skip), Some(limit)) if limit > 0 => {
                    let start = if skip < 0 { (len + skip).max(0) } else { skip.min(len) };
                    (start, limit.unsigned_abs())
                }
                _ => return Err(QueryError::Collection("$slice needs [skip, limit]".to_string())),
            }
        }
        other => match shape::as_i64(other) {
            Some(n) if n < 0 => ((len + n).max(0), n.unsigned_abs()),
            Some(n) => (0, n.unsigned_abs()),
            None => return Err(QueryError::Collection("$slice needs a number".to_string())),
        },
    };

    let count = usize::try_from(count).unwrap_or(usize::MAX);
    let sliced: Vec<Bson> = items.iter().skip(start as usize).take(count).cloned().collect();
    path::set(document, field, Bson::Array(sliced));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn sorts_by_document_and_pairs() {
        let mut documents = vec![doc! { "a": 1, "b": 2 }, doc! { "a": 2, "b": 1 }, doc! { "a": 1, "b": 3 }];

        let keys = sort_keys(&doc! { "sort": { "a": -1, "b": 1 } }).unwrap();
        sort(&mut documents, &keys);
        assert_eq!(documents, vec![doc! { "a": 2, "b": 1 }, doc! { "a": 1, "b": 2 }, doc! { "a": 1, "b": 3 }]);

        let keys = sort_keys(&doc! { "sort": [["b", -1]] }).unwrap();
        assert_eq!(keys, vec![("b".to_string(), -1)]);
        sort(&mut documents, &keys);
        assert_eq!(documents[0], doc! { "a": 1, "b": 3 });
    }

    #[test]
    fn pages_with_skip_and_limit() {
        let items: Vec<i32> = (0..10).collect();
        assert_eq!(page(items.clone(), &doc! { "skip": 2i64, "limit": 3i64 }), vec![2, 3, 4]);
        assert_eq!(page(items.clone(), &doc! { "limit": -2 }), vec![0, 1]);
        assert_eq!(page(items, &doc! { "limit": 0 }).len(), 10);
    }

    #[test]
    fn projects_inclusively_and_exclusively() {
        let document = doc! { "_id": 1, "name": "x", "age": 3, "meta": { "a": 1, "b": 2 } };

        let included = project(&document, &doc! { "projection": { "name": 1, "meta.b": 1 } }).unwrap();
        assert_eq!(included, doc! { "_id": 1, "name": "x", "meta": { "b": 2 } });

        let without_id = project(&document, &doc! { "projection": { "name": 1, "_id": 0 } }).unwrap();
        assert_eq!(without_id, doc! { "name": "x" });

        let excluded = project(&document, &doc! { "projection": { "age": 0, "meta": 0 } }).unwrap();
        assert_eq!(excluded, doc! { "_id": 1, "name": "x" });
    }

    #[test]
    fn projects_slices() {
        let document = doc! { "c": [1, 2, 3, 4, 5] };
        let last = project(&document, &doc! { "projection": { "c": { "$slice": -2 } } }).unwrap();
        assert_eq!(last, doc! { "c": [4, 5] });

        let window = project(&document, &doc! { "projection": { "c": { "$slice": [1, 2] } } }).unwrap();
        assert_eq!(window, doc! { "c": [2, 3] });
    }

    #[test]
    fn slices_with_extreme_counts() {
        let document = doc! { "c": [1, 2, 3] };
        let all = project(&document, &doc! { "projection": { "c": { "$slice": i64::MIN } } }).unwrap();
        assert_eq!(all, doc! { "c": [1, 2, 3] });

        let all = project(&document, &doc! { "projection": { "c": { "$slice": i64::MAX } } }).unwrap();
        assert_eq!(all, doc! { "c": [1, 2, 3] });
    }
}
