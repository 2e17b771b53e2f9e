//! Poll failure taxonomy.
//!
//! Every variant is scoped to one facet and one poll: the collector logs it
//! and emits nothing for that facet until the next interval.

use std::time::Duration;

use crate::facet::Query;

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// The admin tool could not be run, exited nonzero, timed out, or
    /// printed something that is not JSON.
    #[error("`{command}` failed: {reason}")]
    ToolInvocation { command: String, reason: String },

    /// The REST endpoint was unreachable, timed out, or answered with a
    /// non-2xx status or a non-JSON body.
    #[error("GET {url} failed: {reason}")]
    Http { url: String, reason: String },

    /// The payload decoded to nothing.
    #[error("`{query}` returned an empty payload")]
    EmptyPayload { query: Query },

    /// A required top-level field is missing or has the wrong shape.
    #[error("`{query}` payload is malformed: {reason}")]
    Schema { query: Query, reason: String },
}

impl CollectError {
    pub(crate) fn tool(command: impl Into<String>, reason: impl Into<String>) -> Self {
        CollectError::ToolInvocation {
            command: command.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn http(url: impl Into<String>, reason: impl ToString) -> Self {
        CollectError::Http {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn schema(query: Query, reason: impl Into<String>) -> Self {
        CollectError::Schema {
            query,
            reason: reason.into(),
        }
    }

    pub(crate) fn timed_out(timeout: Duration) -> String {
        format!("timed out after {timeout:?}")
    }

    /// Taxonomy name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CollectError::ToolInvocation { .. } => "ToolInvocationError",
            CollectError::Http { .. } => "HttpError",
            CollectError::EmptyPayload { .. } => "EmptyPayloadError",
            CollectError::Schema { .. } => "SchemaError",
        }
    }
}

pub type CollectResult<T> = std::result::Result<T, CollectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(CollectError::tool("ceph df", "exit 1").kind(), "ToolInvocationError");
        assert_eq!(CollectError::http("http://x", "500").kind(), "HttpError");
        assert_eq!(
            CollectError::EmptyPayload { query: Query::Df }.kind(),
            "EmptyPayloadError"
        );
        assert_eq!(CollectError::schema(Query::Df, "no stats").kind(), "SchemaError");
    }

    #[test]
    fn test_messages_carry_context() {
        let err = CollectError::schema(Query::OsdDump, "missing `pools`");
        assert_eq!(err.to_string(), "`osd dump` payload is malformed: missing `pools`");

        let err = CollectError::EmptyPayload { query: Query::MonDump };
        assert_eq!(err.to_string(), "`mon dump` returned an empty payload");
    }
}
