//! The accumulated state of a query.
//!
//! A [`Specification`] is created empty (or seeded) by a
//! [`Query`](crate::query::Query) constructor, mutated only by chained builder
//! calls, and read by the compatibility validator and dispatcher.

use std::{fmt, str::FromStr};

use bson::Document;
use serde::Serialize;

use crate::{error::QueryError, geo::GeoOperator};

/// The declared query or mutation type. It gates option compatibility and
/// selects the collection method used at dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    Find,
    FindOne,
    Count,
    Distinct,
    UpdateOne,
    UpdateMany,
    ReplaceOne,
    Remove,
    DeleteOne,
    DeleteMany,
    FindOneAndUpdate,
    FindOneAndRemove,
}

impl OperationKind {
    pub const ALL: [OperationKind; 12] = [
        OperationKind::Find,
        OperationKind::FindOne,
        OperationKind::Count,
        OperationKind::Distinct,
        OperationKind::UpdateOne,
        OperationKind::UpdateMany,
        OperationKind::ReplaceOne,
        OperationKind::Remove,
        OperationKind::DeleteOne,
        OperationKind::DeleteMany,
        OperationKind::FindOneAndUpdate,
        OperationKind::FindOneAndRemove,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Find => "find",
            OperationKind::FindOne => "findOne",
            OperationKind::Count => "count",
            OperationKind::Distinct => "distinct",
            OperationKind::UpdateOne => "updateOne",
            OperationKind::UpdateMany => "updateMany",
            OperationKind::ReplaceOne => "replaceOne",
            OperationKind::Remove => "remove",
            OperationKind::DeleteOne => "deleteOne",
            OperationKind::DeleteMany => "deleteMany",
            OperationKind::FindOneAndUpdate => "findOneAndUpdate",
            OperationKind::FindOneAndRemove => "findOneAndRemove",
        }
    }

    /// `updateOne`, `updateMany` and `replaceOne`.
    pub fn is_update(&self) -> bool {
        matches!(
            self,
            OperationKind::UpdateOne | OperationKind::UpdateMany | OperationKind::ReplaceOne
        )
    }

    /// Operations whose projection travels inside the options as `projection`.
    pub fn carries_projection(&self) -> bool {
        matches!(
            self,
            OperationKind::Find
                | OperationKind::FindOne
                | OperationKind::FindOneAndUpdate
                | OperationKind::FindOneAndRemove
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationKind::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| QueryError::invalid(format!("Unknown operation kind: {s}")))
    }
}

/// The mutable state threaded through a builder instance.
///
/// Every document here is owned: cloning a `Specification` deep-copies the
/// conditions, fields and update, and `bson::Document` keeps key insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Specification {
    /// Field path (or logical operator key) to predicate.
    pub conditions: Document,
    /// Projection. `None` until `select` or `slice` is first applied.
    pub fields: Option<Document>,
    /// Partial modification document or full replacement.
    pub update: Option<Document>,
    /// Execution options keyed by their store names (`limit`, `readPreference`, ...).
    pub options: Document,
    pub op: Option<OperationKind>,
    /// Path set by the most recent path-only call.
    pub path: Option<String>,
    /// Set by `within`, `intersects` or `near`, consumed by `geometry`.
    pub geo_comparison: Option<GeoOperator>,
    pub distinct: Option<String>,
}
