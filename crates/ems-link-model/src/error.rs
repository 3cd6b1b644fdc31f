//! ---
//! ems_section: "02-messaging-ipc-data-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Feature record model and filtered query engine."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---

/// Errors raised while decoding record values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// The ISO-8601 duration literal could not be parsed.
    #[error("invalid duration literal: {0}")]
    InvalidDuration(String),
}

/// Errors raised by queries that need at least (or exactly) one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// No matching record exists, or the collection was never populated.
    #[error("data not available")]
    NotAvailable,
    /// A filter meant to identify a single record matched several.
    #[error("filter is ambiguous: {matches} records matched")]
    Ambiguous {
        /// Number of records the filter matched.
        matches: usize,
    },
}

impl QueryError {
    /// Both variants mean "no usable value"; callers that do not care why can
    /// branch on this.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, QueryError::NotAvailable | QueryError::Ambiguous { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_stable() {
        assert_eq!(QueryError::NotAvailable.to_string(), "data not available");
        assert_eq!(
            QueryError::Ambiguous { matches: 2 }.to_string(),
            "filter is ambiguous: 2 records matched"
        );
        assert!(QueryError::Ambiguous { matches: 3 }.is_unavailable());
    }
}
