//! ---
//! ems_section: "09-integration-interoperability"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Write approval, heartbeat resolution and power-limit use cases."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Notifications exchanged with the protocol engine and the application.
use std::fmt;
use std::sync::Arc;

use ems_link_features::{EntityType, FeatureType, FunctionData, FunctionType, MsgCounter, Role};
use strum::Display;

/// A remote device, keyed by its SKI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceRef {
    /// Subject key identifier of the device certificate.
    pub ski: String,
    /// Device address within the protocol.
    pub address: String,
}

impl DeviceRef {
    /// Device with the given SKI and address.
    pub fn new(ski: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            ski: ski.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for DeviceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.address, self.ski)
    }
}

/// An entity of a remote device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    /// Owning device.
    pub device: DeviceRef,
    /// Entity address path below the device.
    pub address: Vec<u32>,
    /// Declared entity type.
    pub entity_type: EntityType,
}

impl EntityRef {
    /// Entity at `address` on `device`.
    pub fn new(device: DeviceRef, address: Vec<u32>, entity_type: EntityType) -> Self {
        Self {
            device,
            address,
            entity_type,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:?} ({})", self.device, self.address, self.entity_type)
    }
}

/// A feature of an entity, local or remote.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureRef {
    /// Entity exposing the feature.
    pub entity: EntityRef,
    /// Feature kind.
    pub feature_type: FeatureType,
    /// Client or server.
    pub role: Role,
}

/// An entity as enumerated by the engine, with the features it exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntity {
    /// The entity.
    pub entity: EntityRef,
    /// Exposed features and their roles.
    pub features: Vec<(FeatureType, Role)>,
}

impl RemoteEntity {
    /// `true` when the entity exposes `feature` in `role`.
    pub fn offers(&self, feature: FeatureType, role: Role) -> bool {
        self.features.contains(&(feature, role))
    }
}

/// Kind of change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum EventType {
    /// A device connected or disconnected.
    DeviceChange,
    /// An entity appeared or disappeared.
    EntityChange,
    /// A binding to a local feature changed.
    BindingChange,
    /// A subscription to a local feature changed.
    SubscriptionChange,
    /// Feature data changed.
    DataChange,
}

/// What happened to the subject of an [`EventType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ChangeType {
    /// Subject added.
    Add,
    /// Subject removed.
    Remove,
    /// Subject updated.
    Update,
}

/// Change notification delivered by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPayload {
    /// SKI of the device the notification concerns.
    pub ski: String,
    /// Kind of notification.
    pub event_type: EventType,
    /// Kind of change.
    pub change_type: ChangeType,
    /// Remote device, when known.
    pub device: Option<DeviceRef>,
    /// Remote entity, when known.
    pub entity: Option<EntityRef>,
    /// Remote feature, when known.
    pub feature: Option<FeatureRef>,
    /// Local feature the notification concerns (bindings, local data changes).
    pub local_feature: Option<FeatureRef>,
    /// Function whose data changed.
    pub function: Option<FunctionType>,
    /// Changed data, when carried.
    pub data: Option<FunctionData>,
}

impl EventPayload {
    /// Bare notification; attach subjects with the `with_*` builders.
    pub fn new(ski: impl Into<String>, event_type: EventType, change_type: ChangeType) -> Self {
        Self {
            ski: ski.into(),
            event_type,
            change_type,
            device: None,
            entity: None,
            feature: None,
            local_feature: None,
            function: None,
            data: None,
        }
    }

    /// Attach the remote device.
    pub fn with_device(mut self, device: DeviceRef) -> Self {
        self.device = Some(device);
        self
    }

    /// Attach the remote entity, and its device when none is set.
    pub fn with_entity(mut self, entity: EntityRef) -> Self {
        if self.device.is_none() {
            self.device = Some(entity.device.clone());
        }
        self.entity = Some(entity);
        self
    }

    /// Attach the remote feature.
    pub fn with_feature(mut self, feature: FeatureRef) -> Self {
        self.feature = Some(feature);
        self
    }

    /// Attach the local feature.
    pub fn with_local_feature(mut self, feature: FeatureRef) -> Self {
        self.local_feature = Some(feature);
        self
    }

    /// Attach changed data; the function is taken from the payload.
    pub fn with_data(mut self, data: FunctionData) -> Self {
        self.function = Some(data.function());
        self.data = Some(data);
        self
    }
}

/// Command classifier of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum CmdClassifier {
    /// Read request.
    Read,
    /// Reply to a read.
    Reply,
    /// Unsolicited notification.
    Notify,
    /// Write request.
    Write,
    /// Function call.
    Call,
    /// Result of a request.
    Result,
}

/// Header of an inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestHeader {
    /// Correlation id assigned by the sender.
    pub msg_counter: Option<MsgCounter>,
}

/// Inbound write against a local feature, awaiting approval.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteMessage {
    /// Request header.
    pub header: RequestHeader,
    /// Command classifier, `Write` for approvals.
    pub cmd_classifier: CmdClassifier,
    /// Sending device.
    pub device: DeviceRef,
    /// Sending entity.
    pub entity: EntityRef,
    /// Data to be written.
    pub data: FunctionData,
}

impl WriteMessage {
    /// Write of `data` from `entity`, correlated by `counter`.
    pub fn new(entity: EntityRef, counter: Option<MsgCounter>, data: FunctionData) -> Self {
        Self {
            header: RequestHeader {
                msg_counter: counter,
            },
            cmd_classifier: CmdClassifier::Write,
            device: entity.device.clone(),
            entity,
            data,
        }
    }

    /// Correlation id of the request.
    pub fn counter(&self) -> Option<MsgCounter> {
        self.header.msg_counter
    }
}

/// Events raised towards the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum UseCaseEvent {
    /// A tracked write is waiting for approval.
    WriteApprovalRequired,
    /// The active power limit changed.
    DataUpdateLimit,
    /// The failsafe active power limit changed.
    DataUpdateFailsafePowerLimit,
    /// The failsafe minimum duration changed.
    DataUpdateFailsafeDurationMinimum,
    /// A heartbeat arrived from the authoritative entity.
    DataUpdateHeartbeat,
}

/// Application callback: `(ski, device, entity, event)`.
pub type EventCallback =
    Arc<dyn Fn(&str, Option<&DeviceRef>, Option<&EntityRef>, UseCaseEvent) + Send + Sync>;
