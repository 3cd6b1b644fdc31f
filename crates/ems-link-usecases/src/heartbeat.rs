//! ---
//! ems_section: "09-integration-interoperability"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Write approval, heartbeat resolution and power-limit use cases."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Choice of the entity whose heartbeat proves the controlling side is alive.
//!
//! A device with exactly one compatible entity exposing a device diagnosis
//! server is subscribed right away. With several candidates the choice waits for
//! one of them to bind to the local write-protected feature.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ems_link_features::{EntityType, FeatureType, FunctionType, Role};
use ems_link_model::HeartbeatData;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::event::{DeviceRef, EntityRef, FeatureRef};
use crate::link::DeviceLink;

/// Outcome of [`HeartbeatBindingResolver::device_connected`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The only candidate was subscribed.
    Subscribed(EntityRef),
    /// The device offers no heartbeat source; not an error.
    Unsupported,
    /// Several candidates; waiting for a binding to pick one.
    Ambiguous {
        /// Number of candidates found.
        candidates: usize,
    },
}

#[derive(Debug, Clone)]
enum DeviceState {
    Unsupported,
    Ambiguous(Vec<EntityRef>),
    Subscribed(EntityRef),
}

/// Tracks the authoritative heartbeat source per connected device.
pub struct HeartbeatBindingResolver {
    link: Arc<dyn DeviceLink>,
    compatible: Vec<EntityType>,
    protected_feature: FeatureType,
    devices: Mutex<HashMap<DeviceRef, DeviceState>>,
}

impl HeartbeatBindingResolver {
    /// Resolver accepting entities of the `compatible` types; bindings to the
    /// local `protected_feature` server settle ambiguous devices.
    pub fn new(
        link: Arc<dyn DeviceLink>,
        compatible: Vec<EntityType>,
        protected_feature: FeatureType,
    ) -> Self {
        Self {
            link,
            compatible,
            protected_feature,
            devices: Mutex::new(HashMap::new()),
        }
    }

    /// Inspect a newly connected device.
    pub fn device_connected(&self, device: &DeviceRef) -> Resolution {
        let mut candidates: Vec<EntityRef> = self
            .link
            .entities(device)
            .into_iter()
            .filter(|remote| self.compatible.contains(&remote.entity.entity_type))
            .filter(|remote| remote.offers(FeatureType::DeviceDiagnosis, Role::Server))
            .map(|remote| remote.entity)
            .collect();

        let (state, resolution) = match candidates.len() {
            0 => {
                debug!(device = %device, "no heartbeat source offered");
                (DeviceState::Unsupported, Resolution::Unsupported)
            }
            1 => {
                let entity = candidates.remove(0);
                self.subscribe(&entity);
                (
                    DeviceState::Subscribed(entity.clone()),
                    Resolution::Subscribed(entity),
                )
            }
            count => {
                info!(
                    device = %device,
                    candidates = count,
                    "several heartbeat sources, waiting for a binding"
                );
                (
                    DeviceState::Ambiguous(candidates),
                    Resolution::Ambiguous { candidates: count },
                )
            }
        };
        self.devices.lock().insert(device.clone(), state);
        resolution
    }

    /// Settle an ambiguous device once one of its candidates binds to the
    /// protected local feature. Returns `true` when a subscription was made.
    pub fn binding_added(&self, entity: &EntityRef, local_feature: &FeatureRef) -> bool {
        if local_feature.feature_type != self.protected_feature
            || local_feature.role != Role::Server
        {
            return false;
        }

        let chosen = {
            let mut devices = self.devices.lock();
            match devices.get_mut(&entity.device) {
                Some(state) => {
                    let is_candidate = matches!(
                        &*state,
                        DeviceState::Ambiguous(candidates) if candidates.contains(entity)
                    );
                    if is_candidate {
                        *state = DeviceState::Subscribed(entity.clone());
                    }
                    is_candidate
                }
                None => false,
            }
        };

        if chosen {
            info!(entity = %entity, "heartbeat source chosen by binding");
            self.subscribe(entity);
        }
        chosen
    }

    /// Forget a device.
    pub fn device_disconnected(&self, device: &DeviceRef) {
        self.devices.lock().remove(device);
    }

    /// Entity whose heartbeat counts for `device`, once known.
    pub fn authoritative_entity(&self, device: &DeviceRef) -> Option<EntityRef> {
        match self.devices.lock().get(device) {
            Some(DeviceState::Subscribed(entity)) => Some(entity.clone()),
            _ => None,
        }
    }

    fn subscribe(&self, entity: &EntityRef) {
        if let Err(err) = self.link.subscribe(entity, FeatureType::DeviceDiagnosis) {
            warn!(entity = %entity, error = %err, "heartbeat subscription failed");
        }
        if let Err(err) = self
            .link
            .request(entity, FunctionType::DeviceDiagnosisHeartbeatData)
        {
            warn!(entity = %entity, error = %err, "heartbeat request failed");
        }
    }
}

/// Last heartbeat seen from the authoritative entity.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    window: Duration,
    last: Mutex<Option<(Instant, HeartbeatData)>>,
}

impl HeartbeatMonitor {
    /// Monitor judging liveness against `window`.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last: Mutex::new(None),
        }
    }

    /// Configured window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a heartbeat received at `now`.
    pub fn record(&self, heartbeat: HeartbeatData, now: Instant) {
        debug!(counter = ?heartbeat.heartbeat_counter, "heartbeat received");
        *self.last.lock() = Some((now, heartbeat));
    }

    /// `true` when the last heartbeat arrived at most `window` before `now`.
    pub fn is_within(&self, window: Duration, now: Instant) -> bool {
        match &*self.last.lock() {
            Some((received, _)) => now.saturating_duration_since(*received) <= window,
            None => false,
        }
    }

    /// [`HeartbeatMonitor::is_within`] using the configured window.
    pub fn is_alive(&self, now: Instant) -> bool {
        self.is_within(self.window, now)
    }

    /// Data of the last heartbeat.
    pub fn last(&self) -> Option<HeartbeatData> {
        self.last.lock().as_ref().map(|(_, heartbeat)| heartbeat.clone())
    }

    /// Forget the last heartbeat.
    pub fn reset(&self) {
        self.last.lock().take();
    }
}
