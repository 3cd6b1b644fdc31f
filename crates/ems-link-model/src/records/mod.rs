//! ---
//! ems_section: "02-messaging-ipc-data-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Feature record model and filtered query engine."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Description and value records per feature.
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::filter::Record;

pub use device_configuration::{
    KeyName, KeyValue, KeyValueData, KeyValueDataElements, KeyValueDescription, KeyValueType,
};
pub use device_diagnosis::HeartbeatData;
pub use electrical_connection::{
    limits_for_parameter, CharacteristicContext, CharacteristicData, CharacteristicDataElements,
    CharacteristicType, ElectricalConnectionDescription, ParameterDescription, ParameterLimits,
    PermittedValueSetData, PhaseType, PowerSupplyType, ScaledValueRange, ScaledValueSet,
};
pub use load_control::{LimitCategory, LimitData, LimitDataElements, LimitDescription, LimitType};
pub use measurement::{
    CommodityType, MeasurementData, MeasurementDescription, MeasurementType, MeasurementValueState,
    MeasurementValueType,
};

/// A value record that supports field-wise merges and deletes.
pub trait Updatable: Record {
    /// Selection of fields a delete instruction clears.
    type Elements: Clone + Default + Debug + PartialEq + Send + Sync;

    /// Overwrite fields of `self` with every field present in `update`.
    fn merge(&mut self, update: &Self);

    /// Clear the fields selected by `elements`.
    fn clear(&mut self, elements: &Self::Elements);
}

/// Implement [`Updatable`] for records whose mutable fields are all `Option`s.
macro_rules! updatable {
    ($ty:ty, $elements:ty { $($field:ident),+ $(,)? }) => {
        impl $crate::records::Updatable for $ty {
            type Elements = $elements;

            fn merge(&mut self, update: &Self) {
                $(
                    if update.$field.is_some() {
                        self.$field = update.$field.clone();
                    }
                )+
            }

            fn clear(&mut self, elements: &Self::Elements) {
                $(
                    if elements.$field {
                        self.$field = None;
                    }
                )+
            }
        }
    };
}
pub(crate) use updatable;

mod device_configuration;
mod device_diagnosis;
mod electrical_connection;
mod load_control;
mod measurement;

/// Direction of energy flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnergyDirection {
    /// Energy drawn from the grid.
    Consume,
    /// Energy fed into the grid.
    Produce,
}

/// Unit attached to a description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitOfMeasurement {
    /// Watt.
    #[serde(rename = "W")]
    Watt,
    /// Watt hour.
    #[serde(rename = "Wh")]
    WattHour,
    /// Ampere.
    #[serde(rename = "A")]
    Ampere,
    /// Volt.
    #[serde(rename = "V")]
    Volt,
    /// Hertz.
    #[serde(rename = "Hz")]
    Hertz,
    /// Seconds.
    #[serde(rename = "s")]
    Second,
}

/// Semantic scope of a description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScopeType {
    /// Active power limit applied to the controllable system.
    ActivePowerLimit,
    /// Total AC power.
    #[serde(rename = "acPowerTotal")]
    AcPowerTotal,
    /// AC power per phase.
    #[serde(rename = "acPower")]
    AcPower,
    /// Current per phase.
    #[serde(rename = "acCurrent")]
    AcCurrent,
    /// Overload protection.
    OverloadProtection,
    /// Self consumption optimisation.
    SelfConsumption,
}
