//! Dotted-path access into documents.

use bson::{Bson, Document};

/// Every value reachable through `path`. Arrays met on the way fan out over
/// their document elements, unless the next segment is a numeric index.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Vec<&'a Bson> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut found = Vec::new();
    collect(document, &segments, &mut found);
    found
}

fn collect<'a>(document: &'a Document, segments: &[&str], found: &mut Vec<&'a Bson>) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    let Some(value) = document.get(*head) else {
        return;
    };

    if rest.is_empty() {
        found.push(value);
        return;
    }
    descend(value, rest, found);
}

fn descend<'a>(value: &'a Bson, segments: &[&str], found: &mut Vec<&'a Bson>) {
    match value {
        Bson::Document(inner) => collect(inner, segments, found),
        Bson::Array(items) => {
            if let Some(index) = segments.first().and_then(|s| s.parse::<usize>().ok()) {
                if let Some(item) = items.get(index) {
                    if segments.len() == 1 {
                        found.push(item);
                    } else {
                        descend(item, &segments[1..], found);
                    }
                }
                return;
            }
            for item in items {
                if let Bson::Document(inner) = item {
                    collect(inner, segments, found);
                }
            }
        }
        _ => {}
    }
}

/// The first value at `path`, without fanning out over arrays.
pub(crate) fn get<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut current = document;
    let mut segments = path.split('.').peekable();

    while let Some(segment) = segments.next() {
        let value = current.get(segment)?;
        if segments.peek().is_none() {
            return Some(value);
        }
        match value {
            Bson::Document(inner) => current = inner,
            _ => return None,
        }
    }
    None
}

/// Writes `value` at `path`, creating intermediate documents.
pub(crate) fn set(document: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(document.get(head), Some(Bson::Document(_))) {
                document.insert(head, Document::new());
            }
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                set(inner, rest, value);
            }
        }
    }
}

/// Removes the value at `path`, returning it.
pub(crate) fn remove(document: &mut Document, path: &str) -> Option<Bson> {
    match path.split_once('.') {
        None => document.remove(path),
        Some((head, rest)) => match document.get_mut(head) {
            Some(Bson::Document(inner)) => remove(inner, rest),
            _ => None,
        },
    }
}
