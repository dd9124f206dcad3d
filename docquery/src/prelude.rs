//! Convenient re-exports of commonly used types from docquery.
//!
//! ```ignore
//! use docquery::prelude::*;
//! ```

pub use docquery_core::{
    collection::{Collection, DocumentStream, WriteResult},
    conditions::Clauses,
    dispatch::QueryOutput,
    error::{QueryError, QueryResult},
    geo::GeoOperator,
    merge::QueryFactory,
    options::ReadPreference,
    permissions::Restricted,
    projection::Selection,
    query::{Criteria, Query, QuerySeed},
    sort::SortArg,
    specification::{OperationKind, Specification},
    trace::{TraceCompletion, TraceFn, TraceInfo},
};
