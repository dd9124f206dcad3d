//! Instrumentation hook invoked around dispatch.
//!
//! A trace function is installed with
//! [`Query::set_trace_function`](crate::query::Query::set_trace_function). It
//! is called right before the collection is invoked and may hand back a
//! completion closure that receives the outcome and the elapsed time.

use std::{sync::Arc, time::Duration};

use bson::Document;
use serde::Serialize;

use crate::{
    dispatch::QueryOutput,
    error::{QueryError, QueryResult},
    specification::OperationKind,
};

/// Called once the dispatched operation finished.
pub type TraceCompletion = Box<dyn FnOnce(Result<&QueryOutput, &QueryError>, Duration) + Send>;

/// The installed hook. Cloned by reference into factories and merged queries.
pub type TraceFn = Arc<dyn Fn(OperationKind, &TraceInfo) -> Option<TraceCompletion> + Send + Sync>;

/// Read-only summary of the finalized query handed to a trace hook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceInfo {
    pub collection_name: Option<String>,
    pub conditions: Document,
    pub options: Document,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distinct: Option<String>,
}

impl TraceInfo {
    /// Renders the summary as a JSON object for log sinks.
    pub fn to_json(&self) -> QueryResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn renders_as_json() {
        let info = TraceInfo {
            collection_name: Some("users".into()),
            conditions: doc! { "name": "docquery" },
            options: doc! {},
            fields: None,
            update: None,
            distinct: Some("name".into()),
        };

        let json = info.to_json().unwrap();
        assert!(json.contains("\"collection_name\":\"users\""));
        assert!(json.contains("\"distinct\":\"name\""));
        assert!(!json.contains("\"update\""));
    }
}
