//! Operation/option compatibility.
//!
//! Some options make no sense for some operation kinds (a projection on a
//! `count`, a `limit` on a `distinct`). The table below lists, per operation
//! kind, the restricted options it denies. It is consulted twice:
//!
//! - when a restricted option is set while an operation kind is already bound
//! - when an operation kind is bound, against everything accumulated so far

use bson::Bson;

use crate::{
    error::{QueryError, QueryResult},
    query::Query,
    shape,
    specification::{OperationKind, Specification},
};

/// Options whose use depends on the operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Restricted {
    Select,
    Slice,
    Sort,
    Limit,
    Skip,
    BatchSize,
    MaxScan,
    Snapshot,
    Hint,
    Tailable,
}

impl Restricted {
    pub fn name(&self) -> &'static str {
        match self {
            Restricted::Select => "select",
            Restricted::Slice => "slice",
            Restricted::Sort => "sort",
            Restricted::Limit => "limit",
            Restricted::Skip => "skip",
            Restricted::BatchSize => "batchSize",
            Restricted::MaxScan => "maxScan",
            Restricted::Snapshot => "snapshot",
            Restricted::Hint => "hint",
            Restricted::Tailable => "tailable",
        }
    }

    /// The options key holding this setting. Projection settings live in the
    /// fields document instead.
    pub fn option_key(&self) -> Option<&'static str> {
        match self {
            Restricted::Select | Restricted::Slice => None,
            other => Some(other.name()),
        }
    }
}

const DISTINCT: &[Restricted] = &[
    Restricted::Select,
    Restricted::Slice,
    Restricted::Sort,
    Restricted::Limit,
    Restricted::Skip,
    Restricted::BatchSize,
    Restricted::MaxScan,
    Restricted::Snapshot,
    Restricted::Hint,
    Restricted::Tailable,
];

const COUNT: &[Restricted] = &[
    Restricted::Select,
    Restricted::Slice,
    Restricted::BatchSize,
    Restricted::MaxScan,
    Restricted::Snapshot,
    Restricted::Tailable,
];

const FIND_AND_MODIFY: &[Restricted] = &[
    Restricted::Limit,
    Restricted::Skip,
    Restricted::BatchSize,
    Restricted::MaxScan,
    Restricted::Snapshot,
    Restricted::Tailable,
];

/// The restricted options `op` denies.
pub fn denied(op: OperationKind) -> &'static [Restricted] {
    match op {
        OperationKind::Distinct => DISTINCT,
        OperationKind::Count => COUNT,
        OperationKind::FindOneAndUpdate | OperationKind::FindOneAndRemove => FIND_AND_MODIFY,
        _ => &[],
    }
}

pub fn is_permitted(op: Option<OperationKind>, action: Restricted) -> bool {
    op.is_none_or(|op| !denied(op).contains(&action))
}

/// Checks everything accumulated in `spec` against what `op` denies.
///
/// # Errors
///
/// [`QueryError::Compatibility`] naming the first offending option.
pub fn validate(spec: &Specification, op: OperationKind) -> QueryResult<()> {
    let denied = denied(op);
    let projects = denied.contains(&Restricted::Select) || denied.contains(&Restricted::Slice);

    if projects && spec.fields.as_ref().is_some_and(|fields| !fields.is_empty()) {
        return Err(incompatible("field selection and slice", op));
    }

    let offending = denied
        .iter()
        .filter_map(|action| action.option_key())
        .find(|key| spec.options.get(key).is_some_and(shape::is_truthy));

    match offending {
        Some(key) => Err(incompatible(key, op)),
        None => Ok(()),
    }
}

fn incompatible(option: &str, op: OperationKind) -> QueryError {
    tracing::warn!(option, op = %op, "incompatible query option");
    QueryError::Compatibility { option: option.to_string(), op }
}

impl Query {
    /// Rejects setting `action` when the bound operation denies it.
    pub(crate) fn check_permitted(&self, action: Restricted) -> QueryResult<()> {
        match self.spec.op {
            Some(op) if !is_permitted(Some(op), action) => Err(incompatible(action.name(), op)),
            _ => Ok(()),
        }
    }

    /// Validates the accumulated state against `op` and binds it. Nothing is
    /// changed when validation fails.
    pub(crate) fn bind_op(&mut self, op: OperationKind) -> QueryResult<()> {
        validate(&self.spec, op)?;
        self.spec.op = Some(op);
        Ok(())
    }

    /// Sets a restricted option after checking it against the bound operation.
    pub(crate) fn set_restricted(&mut self, action: Restricted, value: Bson) -> QueryResult<&mut Self> {
        self.check_permitted(action)?;
        if let Some(key) = action.option_key() {
            self.spec.options.insert(key, value);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn table_matches_operation_kinds() {
        assert_eq!(denied(OperationKind::Distinct).len(), 10);
        assert!(denied(OperationKind::Count).contains(&Restricted::Select));
        assert!(!denied(OperationKind::Count).contains(&Restricted::Limit));
        assert!(!denied(OperationKind::Count).contains(&Restricted::Sort));
        assert!(denied(OperationKind::FindOneAndRemove).contains(&Restricted::Skip));
        assert!(!denied(OperationKind::FindOneAndUpdate).contains(&Restricted::Sort));
        for op in [OperationKind::Find, OperationKind::UpdateMany, OperationKind::DeleteOne] {
            assert!(denied(op).is_empty());
        }
        assert!(is_permitted(None, Restricted::Tailable));
    }

    #[test]
    fn projection_is_reported_before_options() {
        let spec = Specification {
            fields: Some(doc! { "x": 1 }),
            options: doc! { "batchSize": 3 },
            ..Default::default()
        };
        assert_eq!(
            validate(&spec, OperationKind::Count).unwrap_err().to_string(),
            "field selection and slice cannot be used with count"
        );
        assert!(validate(&spec, OperationKind::FindOneAndUpdate).is_err());
        assert!(validate(&spec, OperationKind::Find).is_ok());
    }

    #[test]
    fn falsy_options_are_ignored() {
        let spec = Specification {
            options: doc! { "tailable": false, "snapshot": false, "limit": 0 },
            ..Default::default()
        };
        assert!(validate(&spec, OperationKind::Distinct).is_ok());
    }

    #[test]
    fn empty_projection_is_allowed() {
        let spec = Specification { fields: Some(doc! {}), ..Default::default() };
        assert!(validate(&spec, OperationKind::Count).is_ok());
    }
}
