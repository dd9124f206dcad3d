//! Translation of builder options into driver option structs.
//!
//! The builder keeps options in a document keyed by store names. Each driver
//! method takes its own option struct, so [`OptionReader`] parses the shared
//! keys once and the `*_options` functions pick the fields each method
//! supports. Keys a method has no use for are ignored.

use std::time::Duration;

use bson::{Bson, Document};
use mongodb::{
    options::{
        Acknowledgment, Collation, CountOptions, CursorType, DeleteOptions, DistinctOptions,
        FindOneAndDeleteOptions, FindOneAndUpdateOptions, FindOneOptions, FindOptions, Hint,
        ReadConcern, ReadPreference, ReplaceOptions, ReturnDocument, SelectionCriteria,
        UpdateOptions, WriteConcern,
    },
};

use docquery_core::{
    error::{QueryError, QueryResult},
    shape,
};

fn invalid(key: &str, value: &Bson) -> QueryError {
    QueryError::Collection(format!("unsupported value for {key}: {value}"))
}

pub(crate) struct OptionReader<'a> {
    options: &'a Document,
}

impl<'a> OptionReader<'a> {
    pub fn new(options: &'a Document) -> Self {
        Self { options }
    }

    fn integer(&self, key: &str) -> Option<i64> {
        self.options.get(key).and_then(shape::as_i64)
    }

    fn flag(&self, key: &str) -> Option<bool> {
        self.options.get(key).map(shape::is_truthy)
    }

    pub fn limit(&self) -> Option<i64> {
        self.integer("limit").filter(|limit| *limit != 0)
    }

    pub fn skip(&self) -> Option<u64> {
        self.integer("skip").and_then(|skip| u64::try_from(skip).ok())
    }

    pub fn batch_size(&self) -> Option<u32> {
        self.integer("batchSize").and_then(|size| u32::try_from(size).ok())
    }

    pub fn max_time(&self) -> Option<Duration> {
        self.integer("maxTimeMS")
            .and_then(|ms| u64::try_from(ms).ok())
            .map(Duration::from_millis)
    }

    pub fn comment(&self) -> Option<Bson> {
        self.options.get("comment").cloned()
    }

    pub fn upsert(&self) -> Option<bool> {
        self.flag("upsert")
    }

    pub fn projection(&self) -> Option<Document> {
        self.options.get_document("projection").ok().cloned()
    }

    pub fn cursor_type(&self) -> Option<CursorType> {
        self.flag("tailable").filter(|tailable| *tailable).map(|_| CursorType::Tailable)
    }

    pub fn return_document(&self) -> Option<ReturnDocument> {
        if let Ok(value) = self.options.get_str("returnDocument") {
            return match value {
                "after" => Some(ReturnDocument::After),
                _ => Some(ReturnDocument::Before),
            };
        }
        self.flag("new")
            .map(|new| if new { ReturnDocument::After } else { ReturnDocument::Before })
    }

    pub fn array_filters(&self) -> QueryResult<Option<Vec<Document>>> {
        match self.options.get("arrayFilters") {
            None => Ok(None),
            Some(Bson::Array(filters)) => filters
                .iter()
                .map(|filter| match filter {
                    Bson::Document(filter) => Ok(filter.clone()),
                    other => Err(invalid("arrayFilters", other)),
                })
                .collect::<QueryResult<Vec<_>>>()
                .map(Some),
            Some(other) => Err(invalid("arrayFilters", other)),
        }
    }

    /// The sort document. The array-of-pairs form is flattened into a
    /// document, keeping pair order.
    pub fn sort(&self) -> QueryResult<Option<Document>> {
        match self.options.get("sort") {
            None | Some(Bson::Null) => Ok(None),
            Some(Bson::Document(sort)) => Ok(Some(sort.clone())),
            Some(Bson::Array(pairs)) => {
                let mut sort = Document::new();
                for pair in pairs {
                    match pair {
                        Bson::Array(pair) if pair.len() == 2 => match &pair[0] {
                            Bson::String(field) => {
                                sort.insert(field.clone(), pair[1].clone());
                            }
                            other => return Err(invalid("sort", other)),
                        },
                        other => return Err(invalid("sort", other)),
                    }
                }
                Ok(Some(sort))
            }
            Some(other) => Err(invalid("sort", other)),
        }
    }

    pub fn hint(&self) -> QueryResult<Option<Hint>> {
        match self.options.get("hint") {
            None => Ok(None),
            Some(Bson::Document(keys)) => Ok(Some(Hint::Keys(keys.clone()))),
            Some(Bson::String(name)) => Ok(Some(Hint::Name(name.clone()))),
            Some(other) => Err(invalid("hint", other)),
        }
    }

    pub fn selection_criteria(&self) -> QueryResult<Option<SelectionCriteria>> {
        let preference = match self.options.get("readPreference") {
            None => return Ok(None),
            Some(Bson::String(mode)) => match mode.as_str() {
                "primary" => ReadPreference::Primary,
                "primaryPreferred" => ReadPreference::PrimaryPreferred { options: Default::default() },
                "secondary" => ReadPreference::Secondary { options: Default::default() },
                "secondaryPreferred" => ReadPreference::SecondaryPreferred { options: Default::default() },
                "nearest" => ReadPreference::Nearest { options: Default::default() },
                _ => return Err(invalid("readPreference", &Bson::String(mode.clone()))),
            },
            Some(other) => return Err(invalid("readPreference", other)),
        };
        Ok(Some(SelectionCriteria::ReadPreference(preference)))
    }

    pub fn read_concern(&self) -> QueryResult<Option<ReadConcern>> {
        let Some(concern) = self.options.get("readConcern") else {
            return Ok(None);
        };
        let level = match concern {
            Bson::Document(concern) => concern.get_str("level").ok(),
            Bson::String(level) => Some(level.as_str()),
            _ => None,
        };

        match level {
            Some("local") => Ok(Some(ReadConcern::local())),
            Some("majority") => Ok(Some(ReadConcern::majority())),
            Some("linearizable") => Ok(Some(ReadConcern::linearizable())),
            Some("available") => Ok(Some(ReadConcern::available())),
            Some("snapshot") => Ok(Some(ReadConcern::snapshot())),
            _ => Err(invalid("readConcern", concern)),
        }
    }

    pub fn write_concern(&self) -> QueryResult<Option<WriteConcern>> {
        let w = self.options.get("w");
        let journal = self.flag("j");
        let timeout = self
            .integer("wtimeout")
            .and_then(|ms| u64::try_from(ms).ok())
            .map(Duration::from_millis);

        if w.is_none() && journal.is_none() && timeout.is_none() {
            return Ok(None);
        }

        let mut concern = WriteConcern::default();
        concern.w = match w {
            None => None,
            Some(Bson::String(tag)) if tag == "majority" => Some(Acknowledgment::Majority),
            Some(Bson::String(tag)) => Some(Acknowledgment::Custom(tag.clone())),
            Some(nodes) => match shape::as_i64(nodes).and_then(|n| u32::try_from(n).ok()) {
                Some(n) => Some(Acknowledgment::Nodes(n)),
                None => return Err(invalid("w", nodes)),
            },
        };
        concern.journal = journal;
        concern.w_timeout = timeout;
        Ok(Some(concern))
    }

    pub fn collation(&self) -> QueryResult<Option<Collation>> {
        match self.options.get_document("collation") {
            Ok(collation) => bson::deserialize_from_document(collation.clone())
                .map(Some)
                .map_err(|e| QueryError::Collection(e.to_string())),
            Err(_) => Ok(None),
        }
    }
}

pub(crate) fn find_options(options: &Document) -> QueryResult<FindOptions> {
    let reader = OptionReader::new(options);
    let mut find = FindOptions::default();

    find.limit = reader.limit();
    find.skip = reader.skip();
    find.batch_size = reader.batch_size();
    find.max_time = reader.max_time();
    find.comment = reader.comment();
    find.projection = reader.projection();
    find.sort = reader.sort()?;
    find.hint = reader.hint()?;
    find.cursor_type = reader.cursor_type();
    find.selection_criteria = reader.selection_criteria()?;
    find.read_concern = reader.read_concern()?;
    find.collation = reader.collation()?;

    Ok(find)
}

pub(crate) fn find_one_options(options: &Document) -> QueryResult<FindOneOptions> {
    let reader = OptionReader::new(options);
    let mut find = FindOneOptions::default();

    find.skip = reader.skip();
    find.max_time = reader.max_time();
    find.comment = reader.comment();
    find.projection = reader.projection();
    find.sort = reader.sort()?;
    find.hint = reader.hint()?;
    find.selection_criteria = reader.selection_criteria()?;
    find.read_concern = reader.read_concern()?;
    find.collation = reader.collation()?;

    Ok(find)
}

pub(crate) fn count_options(options: &Document) -> QueryResult<CountOptions> {
    let reader = OptionReader::new(options);
    let mut count = CountOptions::default();

    count.limit = reader.limit().map(|limit| limit.unsigned_abs());
    count.skip = reader.skip();
    count.max_time = reader.max_time();
    count.comment = reader.comment();
    count.hint = reader.hint()?;
    count.selection_criteria = reader.selection_criteria()?;
    count.read_concern = reader.read_concern()?;
    count.collation = reader.collation()?;

    Ok(count)
}

pub(crate) fn distinct_options(options: &Document) -> QueryResult<DistinctOptions> {
    let reader = OptionReader::new(options);
    let mut distinct = DistinctOptions::default();

    distinct.max_time = reader.max_time();
    distinct.comment = reader.comment();
    distinct.selection_criteria = reader.selection_criteria()?;
    distinct.read_concern = reader.read_concern()?;
    distinct.collation = reader.collation()?;

    Ok(distinct)
}

pub(crate) fn update_options(options: &Document) -> QueryResult<UpdateOptions> {
    let reader = OptionReader::new(options);
    let mut update = UpdateOptions::default();

    update.upsert = reader.upsert();
    update.array_filters = reader.array_filters()?;
    update.comment = reader.comment();
    update.hint = reader.hint()?;
    update.write_concern = reader.write_concern()?;
    update.collation = reader.collation()?;

    Ok(update)
}

pub(crate) fn replace_options(options: &Document) -> QueryResult<ReplaceOptions> {
    let reader = OptionReader::new(options);
    let mut replace = ReplaceOptions::default();

    replace.upsert = reader.upsert();
    replace.comment = reader.comment();
    replace.hint = reader.hint()?;
    replace.write_concern = reader.write_concern()?;
    replace.collation = reader.collation()?;

    Ok(replace)
}

pub(crate) fn delete_options(options: &Document) -> QueryResult<DeleteOptions> {
    let reader = OptionReader::new(options);
    let mut delete = DeleteOptions::default();

    delete.comment = reader.comment();
    delete.hint = reader.hint()?;
    delete.write_concern = reader.write_concern()?;
    delete.collation = reader.collation()?;

    Ok(delete)
}

pub(crate) fn find_one_and_update_options(options: &Document) -> QueryResult<FindOneAndUpdateOptions> {
    let reader = OptionReader::new(options);
    let mut modify = FindOneAndUpdateOptions::default();

    modify.upsert = reader.upsert();
    modify.return_document = reader.return_document();
    modify.array_filters = reader.array_filters()?;
    modify.max_time = reader.max_time();
    modify.comment = reader.comment();
    modify.projection = reader.projection();
    modify.sort = reader.sort()?;
    modify.hint = reader.hint()?;
    modify.write_concern = reader.write_concern()?;
    modify.collation = reader.collation()?;

    Ok(modify)
}

pub(crate) fn find_one_and_delete_options(options: &Document) -> QueryResult<FindOneAndDeleteOptions> {
    let reader = OptionReader::new(options);
    let mut modify = FindOneAndDeleteOptions::default();

    modify.max_time = reader.max_time();
    modify.comment = reader.comment();
    modify.projection = reader.projection();
    modify.sort = reader.sort()?;
    modify.hint = reader.hint()?;
    modify.write_concern = reader.write_concern()?;
    modify.collation = reader.collation()?;

    Ok(modify)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn find_options_translate_builder_keys() {
        let find = find_options(&doc! {
            "limit": 5i64,
            "skip": 10i64,
            "batchSize": 100i64,
            "maxTimeMS": 250i64,
            "sort": [["a", 1], ["b", -1]],
            "hint": "a_1",
            "tailable": true,
            "readPreference": "secondaryPreferred",
            "projection": { "a": 1 },
        })
        .unwrap();

        assert_eq!(find.limit, Some(5));
        assert_eq!(find.skip, Some(10));
        assert_eq!(find.batch_size, Some(100));
        assert_eq!(find.max_time, Some(Duration::from_millis(250)));
        assert_eq!(find.sort, Some(doc! { "a": 1, "b": -1 }));
        assert!(matches!(find.hint, Some(Hint::Name(ref name)) if name == "a_1"));
        assert!(matches!(find.cursor_type, Some(CursorType::Tailable)));
        assert!(matches!(
            find.selection_criteria,
            Some(SelectionCriteria::ReadPreference(ReadPreference::SecondaryPreferred { .. }))
        ));
        assert_eq!(find.projection, Some(doc! { "a": 1 }));
    }

    #[test]
    fn write_concern_collects_w_j_and_wtimeout() {
        let update = update_options(&doc! { "w": "majority", "j": true, "wtimeout": 500i64, "upsert": true }).unwrap();
        let concern = update.write_concern.unwrap();
        assert_eq!(concern.w, Some(Acknowledgment::Majority));
        assert_eq!(concern.journal, Some(true));
        assert_eq!(concern.w_timeout, Some(Duration::from_millis(500)));
        assert_eq!(update.upsert, Some(true));

        let nodes = delete_options(&doc! { "w": 2 }).unwrap();
        assert_eq!(nodes.write_concern.unwrap().w, Some(Acknowledgment::Nodes(2)));
        assert!(delete_options(&doc! {}).unwrap().write_concern.is_none());
    }

    #[test]
    fn read_concern_levels() {
        let reader_doc = doc! { "readConcern": { "level": "majority" } };
        let concern = OptionReader::new(&reader_doc).read_concern().unwrap();
        assert_eq!(concern, Some(ReadConcern::majority()));

        let bad = doc! { "readConcern": { "level": "eventually" } };
        assert!(OptionReader::new(&bad).read_concern().is_err());
    }

    #[test]
    fn return_document_follows_new_or_return_document() {
        let after = find_one_and_update_options(&doc! { "returnDocument": "after" }).unwrap();
        assert!(matches!(after.return_document, Some(ReturnDocument::After)));
        let legacy = find_one_and_update_options(&doc! { "new": true }).unwrap();
        assert!(matches!(legacy.return_document, Some(ReturnDocument::After)));
        let default = find_one_and_update_options(&doc! {}).unwrap();
        assert!(default.return_document.is_none());
    }
}
