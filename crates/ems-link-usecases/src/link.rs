//! ---
//! ems_section: "09-integration-interoperability"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Write approval, heartbeat resolution and power-limit use cases."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Operations the use cases need from the protocol engine.
use ems_link_features::{FeatureType, FunctionType, MsgCounter};

use crate::event::{DeviceRef, EntityRef, RemoteEntity, WriteMessage};

/// Failure reported by the protocol engine, carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("protocol engine error: {0}")]
pub struct EngineError(pub String);

/// Answers a pending inbound write.
pub trait WriteResponder: Send + Sync {
    /// Let the write take effect and acknowledge it.
    fn accept(&self, request: &WriteMessage) -> Result<(), EngineError>;

    /// Refuse the write with a human readable `reason`.
    fn reject(&self, request: &WriteMessage, reason: &str) -> Result<(), EngineError>;
}

/// Access to remote devices.
pub trait DeviceLink: Send + Sync {
    /// Entities of `device` with the features they expose.
    fn entities(&self, device: &DeviceRef) -> Vec<RemoteEntity>;

    /// Subscribe to data changes of `feature` on `entity`.
    fn subscribe(
        &self,
        entity: &EntityRef,
        feature: FeatureType,
    ) -> Result<MsgCounter, EngineError>;

    /// Ask `entity` for the current data of `function`.
    fn request(
        &self,
        entity: &EntityRef,
        function: FunctionType,
    ) -> Result<MsgCounter, EngineError>;
}
