//! ---
//! ems_section: "02-messaging-ipc-data-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Feature record model and filtered query engine."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

use super::{updatable, EnergyDirection, ScopeType, UnitOfMeasurement};
use crate::ids::{LimitId, MeasurementId};
use crate::scaled::{ScaledNumber, TimePeriod};
use crate::{filterable, record};

/// Kind of limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LimitType {
    /// Absolute value limit whose sign follows the direction.
    SignDependentAbsValueLimit,
    /// Absolute value limit independent of the direction.
    SignIndependentAbsValueLimit,
    /// Lower bound.
    MinValueLimit,
    /// Upper bound.
    MaxValueLimit,
}

/// How binding a limit is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LimitCategory {
    /// Must be followed.
    Obligation,
    /// Should be followed.
    Recommendation,
    /// Optimisation hint.
    Optimization,
}

/// Static metadata of a load control limit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitDescription {
    pub limit_id: Option<LimitId>,
    pub limit_type: Option<LimitType>,
    pub limit_category: Option<LimitCategory>,
    pub limit_direction: Option<EnergyDirection>,
    /// Measurement the limit applies to.
    pub measurement_id: Option<MeasurementId>,
    pub unit: Option<UnitOfMeasurement>,
    pub scope_type: Option<ScopeType>,
    /// Free-form label.
    pub label: Option<String>,
}

filterable!(LimitDescription {
    limit_id,
    limit_type,
    limit_category,
    limit_direction,
    measurement_id,
    unit,
    scope_type,
    label,
});
record!(LimitDescription, LimitId, limit_id);

/// Current state of a load control limit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitData {
    pub limit_id: Option<LimitId>,
    /// Whether a remote may change the limit.
    pub is_limit_changeable: Option<bool>,
    /// Whether the limit is currently enforced.
    pub is_limit_active: Option<bool>,
    /// Validity window; `end_time` is the remaining duration.
    pub time_period: Option<TimePeriod>,
    pub value: Option<ScaledNumber>,
}

filterable!(LimitData {
    limit_id,
    is_limit_changeable,
    is_limit_active,
    value,
});
record!(LimitData, LimitId, limit_id);

/// Fields of [`LimitData`] that a delete instruction clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitDataElements {
    pub is_limit_changeable: bool,
    pub is_limit_active: bool,
    pub time_period: bool,
    pub value: bool,
}

updatable!(LimitData, LimitDataElements {
    is_limit_changeable,
    is_limit_active,
    time_period,
    value,
});
