//! ---
//! ems_section: "02-messaging-ipc-data-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Feature data access and partial update planning."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Access to local and remote feature data, plus the delta-vs-full write policy.
#![warn(missing_docs)]

use ems_link_model::QueryError;

pub mod accessor;
pub mod function;
pub mod payload;
pub mod planner;
pub mod query;
pub mod store;

/// Shared result type for feature operations.
pub type Result<T> = std::result::Result<T, FeatureError>;

/// Errors raised by feature data access and planning.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeatureError {
    /// No matching record, or the collection was never populated.
    #[error("data not available")]
    NotAvailable,
    /// A filter meant to identify one record matched several.
    #[error("filter is ambiguous: {matches} records matched")]
    Ambiguous {
        /// Number of records matched.
        matches: usize,
    },
    /// An identifier the operation needs was not supplied.
    #[error("missing required field: {0}")]
    MissingRequiredField(&'static str),
    /// The feature does not offer the requested read or write at all.
    #[error("operation not supported for {0}")]
    UnsupportedOperation(function::FunctionType),
    /// A record with the supplied identifier already exists.
    #[error("identifier {0} already in use")]
    DuplicateIdentifier(u32),
    /// The data returned for a function has the wrong shape.
    #[error("unexpected payload for {0}")]
    UnexpectedPayload(function::FunctionType),
    /// Opaque failure reported by the protocol layer.
    #[error("remote feature error: {0}")]
    Remote(String),
}

impl FeatureError {
    /// `true` for errors meaning "no usable value right now".
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            FeatureError::NotAvailable | FeatureError::Ambiguous { .. }
        )
    }
}

impl From<QueryError> for FeatureError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::NotAvailable => FeatureError::NotAvailable,
            QueryError::Ambiguous { matches } => FeatureError::Ambiguous { matches },
        }
    }
}

pub use accessor::{read_records, FeatureDataAccessor};
pub use function::{EntityType, FeatureType, FunctionType, Operations, Role};
pub use payload::{DeleteFilter, FunctionData, FunctionRecord, MsgCounter, PartialRecord};
pub use planner::{plan_read, plan_write, PartialUpdatePlanner, ReadPlan, WritePlan};
pub use query::{
    DeviceConfiguration, DeviceDiagnosis, ElectricalConnection, FeatureQuery, LoadControl,
    Measurement,
};
pub use store::LocalFeatureStore;
