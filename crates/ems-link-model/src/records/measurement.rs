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

use super::{ScopeType, UnitOfMeasurement};
use crate::ids::MeasurementId;
use crate::scaled::ScaledNumber;
use crate::{filterable, record};

/// Physical quantity being measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MeasurementType {
    Power,
    Energy,
    Current,
    Voltage,
    Frequency,
}

/// Commodity the measurement refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommodityType {
    Electricity,
    Gas,
    Heat,
}

/// Aggregation the value represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MeasurementValueType {
    Value,
    AverageValue,
    MinValue,
    MaxValue,
}

/// Quality of a measured value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MeasurementValueState {
    Normal,
    OutOfRange,
    Error,
}

/// Static metadata of a measurement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementDescription {
    pub measurement_id: Option<MeasurementId>,
    pub measurement_type: Option<MeasurementType>,
    pub commodity_type: Option<CommodityType>,
    pub unit: Option<UnitOfMeasurement>,
    pub scope_type: Option<ScopeType>,
}

filterable!(MeasurementDescription {
    measurement_id,
    measurement_type,
    commodity_type,
    unit,
    scope_type,
});
record!(MeasurementDescription, MeasurementId, measurement_id);

/// A measured value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementData {
    pub measurement_id: Option<MeasurementId>,
    pub value_type: Option<MeasurementValueType>,
    pub timestamp: Option<DateTime<Utc>>,
    pub value: Option<ScaledNumber>,
    pub value_state: Option<MeasurementValueState>,
}

filterable!(MeasurementData {
    measurement_id,
    value_type,
    timestamp,
    value,
    value_state,
});
record!(MeasurementData, MeasurementId, measurement_id);
