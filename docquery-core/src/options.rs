//! Execution options.
//!
//! Options are kept in a plain document keyed by the names the store uses
//! (`batchSize`, `readPreference`, `maxTimeMS`, ...). Each has a dedicated
//! setter. [`Query::set_options`] routes a whole mapping through those setters
//! and stores keys it does not recognize verbatim.

use std::{fmt, str::FromStr};

use bson::{Bson, Document};

use crate::{
    error::{QueryError, QueryResult},
    permissions::Restricted,
    query::Query,
    shape,
};

/// Read preference modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadPreference {
    Primary,
    PrimaryPreferred,
    Secondary,
    SecondaryPreferred,
    Nearest,
}

impl ReadPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadPreference::Primary => "primary",
            ReadPreference::PrimaryPreferred => "primaryPreferred",
            ReadPreference::Secondary => "secondary",
            ReadPreference::SecondaryPreferred => "secondaryPreferred",
            ReadPreference::Nearest => "nearest",
        }
    }
}

impl fmt::Display for ReadPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadPreference {
    type Err = QueryError;

    /// Parses a mode name or its short alias (`p`, `pp`, `s`, `sp`, `n`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "p" | "primary" => Ok(ReadPreference::Primary),
            "pp" | "primaryPreferred" => Ok(ReadPreference::PrimaryPreferred),
            "s" | "secondary" => Ok(ReadPreference::Secondary),
            "sp" | "secondaryPreferred" => Ok(ReadPreference::SecondaryPreferred),
            "n" | "nearest" => Ok(ReadPreference::Nearest),
            other => Err(QueryError::invalid(format!("Invalid read preference: {other}"))),
        }
    }
}

/// Expands a read concern alias to its level name. Unknown names pass through.
pub fn read_concern_level(level: &str) -> &str {
    match level {
        "l" => "local",
        "a" => "available",
        "m" => "majority",
        "lz" => "linearizable",
        "s" => "snapshot",
        other => other,
    }
}

fn integer(key: &str, value: &Bson) -> QueryResult<i64> {
    shape::as_i64(value).ok_or_else(|| QueryError::invalid(format!("{key} must be an integer, got {value}")))
}

impl Query {
    /// Limits the number of documents returned.
    pub fn limit(&mut self, limit: i64) -> QueryResult<&mut Self> {
        self.set_restricted(Restricted::Limit, Bson::Int64(limit))
    }

    /// Skips the first `skip` matching documents.
    pub fn skip(&mut self, skip: i64) -> QueryResult<&mut Self> {
        self.set_restricted(Restricted::Skip, Bson::Int64(skip))
    }

    pub fn batch_size(&mut self, size: i64) -> QueryResult<&mut Self> {
        self.set_restricted(Restricted::BatchSize, Bson::Int64(size))
    }

    pub fn max_scan(&mut self, max: i64) -> QueryResult<&mut Self> {
        self.set_restricted(Restricted::MaxScan, Bson::Int64(max))
    }

    pub fn max_time_ms(&mut self, ms: i64) -> &mut Self {
        self.spec.options.insert("maxTimeMS", Bson::Int64(ms));
        self
    }

    /// Alias of [`Query::max_time_ms`].
    pub fn max_time(&mut self, ms: i64) -> &mut Self {
        self.max_time_ms(ms)
    }

    pub fn comment(&mut self, comment: impl Into<Bson>) -> &mut Self {
        self.spec.options.insert("comment", comment.into());
        self
    }

    pub fn snapshot(&mut self, enabled: bool) -> QueryResult<&mut Self> {
        self.set_restricted(Restricted::Snapshot, Bson::Boolean(enabled))
    }

    pub fn tailable(&mut self, enabled: bool) -> QueryResult<&mut Self> {
        self.set_restricted(Restricted::Tailable, Bson::Boolean(enabled))
    }

    pub fn slave_ok(&mut self, enabled: bool) -> &mut Self {
        self.spec.options.insert("slaveOk", enabled);
        self
    }

    /// Sets the index hint: a key pattern document (merged into an existing
    /// one) or an index name. `null` is ignored.
    ///
    /// # Errors
    ///
    /// [`QueryError::InvalidArgument`] for any other value, in which case the
    /// options are left untouched.
    pub fn hint(&mut self, hint: impl Into<Bson>) -> QueryResult<&mut Self> {
        let hint = hint.into();
        if hint == Bson::Null {
            return Ok(self);
        }

        self.check_permitted(Restricted::Hint)?;

        let hint = match (hint, self.spec.options.get("hint")) {
            (Bson::Document(keys), Some(Bson::Document(existing))) => {
                let mut merged = existing.clone();
                for (key, value) in keys {
                    merged.insert(key, value);
                }
                Bson::Document(merged)
            }
            (hint @ (Bson::Document(_) | Bson::String(_)), _) => hint,
            (other, _) => return Err(QueryError::invalid(format!("Invalid hint. {other}"))),
        };

        self.spec.options.insert("hint", hint);
        Ok(self)
    }

    /// Sets the read preference from a mode name or alias. Unknown names are
    /// stored as given so a newer store can interpret them.
    pub fn read(&mut self, preference: &str) -> &mut Self {
        let preference = preference
            .parse::<ReadPreference>()
            .map(|mode| mode.as_str().to_string())
            .unwrap_or_else(|_| preference.to_string());
        self.spec.options.insert("readPreference", preference);
        self
    }

    pub fn read_preference(&mut self, preference: ReadPreference) -> &mut Self {
        self.spec.options.insert("readPreference", preference.as_str());
        self
    }

    /// Sets `readConcern: { level }`, expanding `l`, `a`, `m`, `lz` and `s`.
    pub fn read_concern(&mut self, level: &str) -> &mut Self {
        let mut concern = Document::new();
        concern.insert("level", read_concern_level(level));
        self.spec.options.insert("readConcern", concern);
        self
    }

    /// Alias of [`Query::read_concern`].
    pub fn r(&mut self, level: &str) -> &mut Self {
        self.read_concern(level)
    }

    /// Sets the write concern.
    ///
    /// A document copies its `w`, `j` and `wtimeout` keys as given and leaves
    /// the others untouched. Any other value becomes `w`, with `"m"` expanded
    /// to `"majority"`.
    pub fn write_concern(&mut self, concern: impl Into<Bson>) -> &mut Self {
        match concern.into() {
            Bson::Document(concern) => {
                for key in ["j", "w", "wtimeout"] {
                    if let Some(value) = concern.get(key) {
                        self.spec.options.insert(key, value.clone());
                    }
                }
            }
            Bson::String(w) if w == "m" => {
                self.spec.options.insert("w", "majority");
            }
            w => {
                self.spec.options.insert("w", w);
            }
        }
        self
    }

    /// Alias of [`Query::write_concern`].
    pub fn w(&mut self, concern: impl Into<Bson>) -> &mut Self {
        self.write_concern(concern)
    }

    pub fn j(&mut self, journal: bool) -> &mut Self {
        self.spec.options.insert("j", journal);
        self
    }

    pub fn wtimeout(&mut self, ms: i64) -> &mut Self {
        self.spec.options.insert("wtimeout", Bson::Int64(ms));
        self
    }

    pub fn collation(&mut self, collation: Document) -> &mut Self {
        self.spec.options.insert("collation", collation);
        self
    }

    /// Applies every key of `options` through its setter. Unrecognized keys
    /// are stored verbatim.
    ///
    /// # Errors
    ///
    /// Fails if any setter rejects its value. The query is then left as it
    /// was before the call.
    pub fn set_options(&mut self, options: Document) -> QueryResult<&mut Self> {
        let mut staged = self.clone();
        for (key, value) in options {
            staged.apply_option(&key, value)?;
        }

        self.spec = staged.spec;
        Ok(self)
    }

    fn apply_option(&mut self, key: &str, value: Bson) -> QueryResult<()> {
        match key {
            "sort" => {
                self.sort(value)?;
            }
            "limit" => {
                self.limit(integer(key, &value)?)?;
            }
            "skip" => {
                self.skip(integer(key, &value)?)?;
            }
            "batchSize" => {
                self.batch_size(integer(key, &value)?)?;
            }
            "maxScan" => {
                self.max_scan(integer(key, &value)?)?;
            }
            "maxTime" | "maxTimeMS" => {
                self.max_time_ms(integer(key, &value)?);
            }
            "comment" => {
                self.comment(value);
            }
            "snapshot" => {
                self.snapshot(shape::is_truthy(&value))?;
            }
            "tailable" => {
                self.tailable(shape::is_truthy(&value))?;
            }
            "slaveOk" => {
                self.slave_ok(shape::is_truthy(&value));
            }
            "hint" => {
                self.hint(value)?;
            }
            "read" => match value {
                Bson::String(preference) => {
                    self.read(&preference);
                }
                other => {
                    self.spec.options.insert("readPreference", other);
                }
            },
            "readConcern" | "r" => match value {
                Bson::String(level) => {
                    self.read_concern(&level);
                }
                other => {
                    self.spec.options.insert("readConcern", other);
                }
            },
            "writeConcern" | "w" => {
                self.write_concern(value);
            }
            "j" => {
                self.j(shape::is_truthy(&value));
            }
            "wtimeout" => {
                self.wtimeout(integer(key, &value)?);
            }
            "collation" => match value {
                Bson::Document(collation) => {
                    self.collation(collation);
                }
                other => return Err(QueryError::invalid(format!("Invalid collation: {other}"))),
            },
            "select" => {
                self.select(value)?;
            }
            _ => {
                self.spec.options.insert(key, value);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn numeric_setters() {
        let mut query = Query::new();
        query.limit(2).unwrap().skip(3).unwrap().batch_size(4).unwrap().max_scan(5).unwrap();
        query.max_time(6).comment("slow");
        assert_eq!(
            query.options(),
            &doc! {
                "limit": 2i64,
                "skip": 3i64,
                "batchSize": 4i64,
                "maxScan": 5i64,
                "maxTimeMS": 6i64,
                "comment": "slow",
            }
        );
    }

    #[test]
    fn restricted_setters_fail_after_distinct() {
        let mut query = Query::new();
        query.distinct_on("name").unwrap();
        for (name, result) in [
            ("limit", query.limit(4).map(|_| ())),
            ("skip", query.skip(4).map(|_| ())),
            ("batchSize", query.batch_size(4).map(|_| ())),
            ("maxScan", query.max_scan(4).map(|_| ())),
            ("snapshot", query.snapshot(true).map(|_| ())),
            ("tailable", query.tailable(true).map(|_| ())),
            ("hint", query.hint(doc! { "x": 1 }).map(|_| ())),
        ] {
            assert_eq!(result.unwrap_err().to_string(), format!("{name} cannot be used with distinct"));
        }
        assert!(query.options().is_empty());
    }

    #[test]
    fn restricted_setters_fail_after_count() {
        let mut query = Query::new();
        query.count().unwrap();
        assert!(query.batch_size(4).is_err());
        assert!(query.tailable(true).is_err());
        assert!(query.limit(4).is_ok());
        assert!(query.skip(4).is_ok());
        assert!(query.hint("name_1").is_ok());
    }

    #[test]
    fn hint_accepts_documents_and_names() {
        let mut query = Query::new();
        query.hint(doc! { "indexAttributeA": 1 }).unwrap().hint(doc! { "b": -1 }).unwrap();
        assert_eq!(query.options(), &doc! { "hint": { "indexAttributeA": 1, "b": -1 } });

        query.hint("a_1").unwrap().hint(Bson::Null).unwrap();
        assert_eq!(query.options(), &doc! { "hint": "a_1" });
    }

    #[test]
    fn invalid_hint_has_no_side_effects() {
        let mut query = Query::new();
        assert!(query.hint(3).unwrap_err().to_string().starts_with("Invalid hint."));
        assert!(query.options().is_empty());
    }

    #[test]
    fn read_preference_aliases() {
        for (alias, expected) in [
            ("p", "primary"),
            ("pp", "primaryPreferred"),
            ("s", "secondary"),
            ("sp", "secondaryPreferred"),
            ("n", "nearest"),
            ("nearest", "nearest"),
            ("custom", "custom"),
        ] {
            let mut query = Query::new();
            query.read(alias);
            assert_eq!(query.options().get_str("readPreference").unwrap(), expected);
        }

        let mut query = Query::new();
        query.read_preference(ReadPreference::SecondaryPreferred);
        assert_eq!(query.options(), &doc! { "readPreference": "secondaryPreferred" });
    }

    #[test]
    fn read_concern_aliases() {
        let mut query = Query::new();
        query.read_concern("s");
        assert_eq!(query.options(), &doc! { "readConcern": { "level": "snapshot" } });
        query.r("local");
        assert_eq!(query.options(), &doc! { "readConcern": { "level": "local" } });
        query.r("lz");
        assert_eq!(query.options(), &doc! { "readConcern": { "level": "linearizable" } });
    }

    #[test]
    fn write_concern_forms() {
        let mut query = Query::new();
        query.write_concern("m");
        assert_eq!(query.options(), &doc! { "w": "majority" });

        let mut query = Query::new();
        query.write_concern(1);
        assert_eq!(query.options(), &doc! { "w": 1 });

        let mut query = Query::new();
        query.write_concern(doc! { "w": "m", "j": true, "wtimeout": 1000 });
        assert_eq!(query.options(), &doc! { "j": true, "w": "m", "wtimeout": 1000 });

        let mut query = Query::new();
        query.w("m").w(doc! { "j": false, "wtimeout": 0 });
        assert_eq!(query.options(), &doc! { "w": "majority", "j": false, "wtimeout": 0 });

        query.j(true).wtimeout(5);
        assert_eq!(query.options(), &doc! { "w": "majority", "j": true, "wtimeout": 5i64 });
    }

    #[test]
    fn set_options_routes_known_keys() {
        let mut query = Query::new();
        query
            .set_options(doc! {
                "limit": 5,
                "sort": "-name",
                "read": "sp",
                "r": "m",
                "w": "m",
                "tailable": true,
                "select": "a -b",
                "maxTime": 20,
                "readPreference": "p",
                "safe": { "w": "majority" },
                "woot": "yay",
            })
            .unwrap();

        assert_eq!(
            query.options(),
            &doc! {
                "limit": 5i64,
                "sort": { "name": -1 },
                "readPreference": "p",
                "readConcern": { "level": "majority" },
                "w": "majority",
                "tailable": true,
                "maxTimeMS": 20i64,
                "safe": { "w": "majority" },
                "woot": "yay",
            }
        );
        assert_eq!(query.fields(), Some(&doc! { "a": 1, "b": 0 }));
    }

    #[test]
    fn set_options_coerces_flags_by_truthiness() {
        let mut query = Query::new();
        query
            .set_options(doc! { "tailable": 1, "snapshot": "", "slaveOk": "yes", "j": 0 })
            .unwrap();
        assert_eq!(
            query.options(),
            &doc! { "tailable": true, "snapshot": false, "slaveOk": true, "j": false }
        );
    }

    #[test]
    fn set_options_is_all_or_nothing() {
        let mut query = Query::new();
        query.limit(1).unwrap();
        let err = query.set_options(doc! { "skip": 2, "hint": 5 }).unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument(_)));
        assert_eq!(query.options(), &doc! { "limit": 1i64 });
    }

    #[test]
    fn collation_and_slave_ok() {
        let mut query = Query::new();
        query.collation(doc! { "locale": "en_US" }).slave_ok(true);
        assert_eq!(query.options(), &doc! { "collation": { "locale": "en_US" }, "slaveOk": true });
        assert!(Query::new().set_options(doc! { "collation": "en" }).is_err());
    }
}
