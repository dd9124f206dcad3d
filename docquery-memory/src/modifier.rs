//! Applying update documents to stored documents.

use bson::{Bson, Document, oid::ObjectId};

use docquery_core::{
    error::{QueryError, QueryResult},
    shape,
};

use crate::path;

/// Whether `update` replaces the document instead of modifying it.
pub(crate) fn is_replacement(update: &Document) -> bool {
    !update.keys().any(|key| shape::is_operator_key(key))
}

/// Applies `update` to `document`. A replacement keeps the original `_id`.
pub(crate) fn apply(document: &mut Document, update: &Document, inserting: bool) -> QueryResult<()> {
    if is_replacement(update) {
        let id = document.get("_id").cloned();
        *document = update.clone();
        if let Some(id) = id {
            document.insert("_id", id);
        }
        return Ok(());
    }

    for (operator, fields) in update {
        let Bson::Document(fields) = fields else {
            return Err(QueryError::Collection(format!("{operator} needs a document")));
        };

        match operator.as_str() {
            "$set" => {
                for (field, value) in fields {
                    path::set(document, field, value.clone());
                }
            }
            "$setOnInsert" => {
                if inserting {
                    for (field, value) in fields {
                        path::set(document, field, value.clone());
                    }
                }
            }
            "$unset" => {
                for field in fields.keys() {
                    path::remove(document, field);
                }
            }
            "$inc" => {
                for (field, amount) in fields {
                    let current = path::get(document, field).cloned().unwrap_or(Bson::Int32(0));
                    path::set(document, field, increment(field, &current, amount)?);
                }
            }
            "$push" => {
                for (field, value) in fields {
                    push(document, field, value)?;
                }
            }
            other => return Err(QueryError::Collection(format!("unsupported update operator {other}"))),
        }
    }
    Ok(())
}

fn increment(field: &str, current: &Bson, amount: &Bson) -> QueryResult<Bson> {
    let incremented = match (current, amount) {
        (Bson::Int32(a), Bson::Int32(b)) => a.checked_add(*b).map(Bson::Int32),
        (Bson::Int32(_) | Bson::Int64(_), Bson::Int32(_) | Bson::Int64(_)) => {
            shape::as_i64(current).zip(shape::as_i64(amount)).and_then(|(a, b)| a.checked_add(b)).map(Bson::Int64)
        }
        _ => shape::as_f64(current).zip(shape::as_f64(amount)).map(|(a, b)| Bson::Double(a + b)),
    };

    incremented.ok_or_else(|| QueryError::Collection(format!("cannot apply $inc to {field}")))
}

fn push(document: &mut Document, field: &str, value: &Bson) -> QueryResult<()> {
    let mut items = match path::get(document, field) {
        None => Vec::new(),
        Some(Bson::Array(items)) => items.clone(),
        Some(_) => return Err(QueryError::Collection(format!("cannot $push to non-array field {field}"))),
    };

    match value {
        Bson::Document(modifiers) if modifiers.contains_key("$each") => {
            let Some(Bson::Array(each)) = modifiers.get("$each") else {
                return Err(QueryError::Collection("$each needs an array".to_string()));
            };
            items.extend(each.iter().cloned());

            if let Some(slice) = modifiers.get("$slice").and_then(shape::as_i64) {
                items = slice_items(items, slice);
            }
        }
        other => items.push(other.clone()),
    }

    path::set(document, field, Bson::Array(items));
    Ok(())
}

fn slice_items(items: Vec<Bson>, slice: i64) -> Vec<Bson> {
    let len = items.len();
    let count = slice.unsigned_abs() as usize;
    if slice >= 0 {
        items.into_iter().take(count).collect()
    } else {
        items.into_iter().skip(len.saturating_sub(count)).collect()
    }
}

/// The document inserted by an upsert: the literal equality conditions of
/// `filter`, modified by `update`.
pub(crate) fn upsert_seed(filter: &Document, update: &Document) -> QueryResult<Document> {
    let mut document = Document::new();
    for (key, value) in filter {
        let literal = !shape::is_operator_key(key)
            && !matches!(value, Bson::Document(inner) if inner.keys().any(|k| shape::is_operator_key(k)));
        if literal {
            path::set(&mut document, key, value.clone());
        }
    }

    apply(&mut document, update, true)?;
    if !document.contains_key("_id") {
        document.insert("_id", ObjectId::new());
    }
    Ok(document)
}
