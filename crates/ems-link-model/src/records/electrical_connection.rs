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
use crate::error::QueryError;
use crate::filter::single_description;
use crate::ids::{CharacteristicId, ElectricalConnectionId, MeasurementId, ParameterId};
use crate::scaled::ScaledNumber;
use crate::{filterable, record};

/// Supply type of an electrical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PowerSupplyType {
    Ac,
    Dc,
}

/// Phases a parameter is measured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseType {
    A,
    B,
    C,
    Abc,
}

/// Context a characteristic applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CharacteristicContext {
    Device,
    Entity,
    Inverter,
    Pv,
    Battery,
}

/// Kind of characteristic value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CharacteristicType {
    ContractualConsumptionNominalMax,
    ContractualProductionNominalMax,
    PowerConsumptionNominalMax,
    PowerProductionNominalMax,
}

/// Static metadata of an electrical connection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectricalConnectionDescription {
    pub electrical_connection_id: Option<ElectricalConnectionId>,
    pub power_supply_type: Option<PowerSupplyType>,
    pub positive_energy_direction: Option<EnergyDirection>,
}

filterable!(ElectricalConnectionDescription {
    electrical_connection_id,
    power_supply_type,
    positive_energy_direction,
});
record!(
    ElectricalConnectionDescription,
    ElectricalConnectionId,
    electrical_connection_id
);

/// Static metadata of one parameter of an electrical connection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDescription {
    pub electrical_connection_id: Option<ElectricalConnectionId>,
    pub parameter_id: Option<ParameterId>,
    pub measurement_id: Option<MeasurementId>,
    pub ac_measured_phases: Option<PhaseType>,
    pub scope_type: Option<ScopeType>,
}

filterable!(ParameterDescription {
    electrical_connection_id,
    parameter_id,
    measurement_id,
    ac_measured_phases,
    scope_type,
});
record!(ParameterDescription, ParameterId, parameter_id);

/// Inclusive range of permitted values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScaledValueRange {
    pub min: Option<ScaledNumber>,
    pub max: Option<ScaledNumber>,
}

/// Discrete values and ranges permitted for a parameter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScaledValueSet {
    #[serde(default)]
    pub value: Vec<ScaledNumber>,
    #[serde(default)]
    pub range: Vec<ScaledValueRange>,
}

/// Permitted values of one parameter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermittedValueSetData {
    pub electrical_connection_id: Option<ElectricalConnectionId>,
    pub parameter_id: Option<ParameterId>,
    #[serde(default)]
    pub permitted_value_set: Vec<ScaledValueSet>,
}

filterable!(PermittedValueSetData {
    electrical_connection_id,
    parameter_id,
});
record!(PermittedValueSetData, ParameterId, parameter_id);

/// A characteristic value of an electrical connection, e.g. a nominal maximum.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacteristicData {
    pub electrical_connection_id: Option<ElectricalConnectionId>,
    pub parameter_id: Option<ParameterId>,
    pub characteristic_id: Option<CharacteristicId>,
    pub characteristic_context: Option<CharacteristicContext>,
    pub characteristic_type: Option<CharacteristicType>,
    pub value: Option<ScaledNumber>,
    pub unit: Option<UnitOfMeasurement>,
}

filterable!(CharacteristicData {
    electrical_connection_id,
    parameter_id,
    characteristic_id,
    characteristic_context,
    characteristic_type,
    value,
    unit,
});
record!(CharacteristicData, CharacteristicId, characteristic_id);

/// Fields of [`CharacteristicData`] that a delete instruction clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CharacteristicDataElements {
    pub value: bool,
    pub unit: bool,
}

updatable!(CharacteristicData, CharacteristicDataElements { value, unit });

/// Bounds and default extracted from a permitted value set.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ParameterLimits {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub default: Option<f64>,
}

/// Minimum, maximum and default value permitted for a parameter.
///
/// The first discrete value of a set is its default; range bounds are read in
/// order and the last present bound wins.
pub fn limits_for_parameter(
    permitted: &[PermittedValueSetData],
    electrical_connection_id: ElectricalConnectionId,
    parameter_id: ParameterId,
) -> Result<ParameterLimits, QueryError> {
    let filter = PermittedValueSetData {
        electrical_connection_id: Some(electrical_connection_id),
        parameter_id: Some(parameter_id),
        permitted_value_set: Vec::new(),
    };
    let data = single_description(permitted, &filter)?;

    let mut limits = ParameterLimits::default();
    for set in &data.permitted_value_set {
        if let Some(first) = set.value.first() {
            limits.default = Some(first.value());
        }
        for range in &set.range {
            if let Some(min) = range.min {
                limits.min = Some(min.value());
            }
            if let Some(max) = range.max {
                limits.max = Some(max.value());
            }
        }
    }

    if limits == ParameterLimits::default() {
        return Err(QueryError::NotAvailable);
    }
    Ok(limits)
}
