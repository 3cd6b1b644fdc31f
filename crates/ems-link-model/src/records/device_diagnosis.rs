//! ---
//! ems_section: "02-messaging-ipc-data-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Feature record model and filtered query engine."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scaled::XsDuration;

/// Liveness signal published by a device diagnosis server.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatData {
    pub timestamp: Option<DateTime<Utc>>,
    /// Monotonic counter incremented with every heartbeat.
    pub heartbeat_counter: Option<u64>,
    /// Interval after which a missing heartbeat counts as a failure.
    pub heartbeat_timeout: Option<XsDuration>,
}
