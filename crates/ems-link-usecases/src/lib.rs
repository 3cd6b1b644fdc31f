//! ---
//! ems_section: "09-integration-interoperability"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Write approval, heartbeat resolution and power-limit use cases."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Controllable-system use cases on top of the feature layer.
//!
//! The protocol engine is injected through [`link::DeviceLink`] and
//! [`link::WriteResponder`]; inbound notifications arrive as
//! [`event::EventPayload`]s and writes needing authorisation as
//! [`event::WriteMessage`]s.
#![warn(missing_docs)]

use ems_link_features::FeatureError;
use ems_link_model::ModelError;

pub mod approval;
pub mod dispatcher;
pub mod event;
pub mod heartbeat;
pub mod link;
pub mod metrics;
pub mod power_limit;

/// Shared result type for use case operations.
pub type Result<T> = std::result::Result<T, UseCaseError>;

/// Errors surfaced by the use case API.
#[derive(Debug, thiserror::Error)]
pub enum UseCaseError {
    /// Local or remote feature data could not be read or written.
    #[error(transparent)]
    Feature(#[from] FeatureError),
    /// A stored value could not be decoded.
    #[error(transparent)]
    Model(#[from] ModelError),
    /// The protocol engine refused an operation.
    #[error(transparent)]
    Engine(#[from] link::EngineError),
}

impl UseCaseError {
    /// `true` when the value is simply not there (yet).
    pub fn is_unavailable(&self) -> bool {
        matches!(self, UseCaseError::Feature(err) if err.is_unavailable())
    }
}

pub use approval::{Observation, PendingApprovalRegistry};
pub use dispatcher::{ApprovalDispatcher, ApprovalOutcome, DispatchError};
pub use event::{
    ChangeType, CmdClassifier, DeviceRef, EntityRef, EventCallback, EventPayload, EventType,
    FeatureRef, RemoteEntity, RequestHeader, UseCaseEvent, WriteMessage,
};
pub use heartbeat::{HeartbeatBindingResolver, HeartbeatMonitor, Resolution};
pub use link::{DeviceLink, EngineError, WriteResponder};
pub use metrics::ApprovalMetrics;
pub use power_limit::{ConfiguredValue, LoadLimit, PowerLimitUseCase, UseCaseWiring};
