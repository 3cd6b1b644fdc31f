//! ---
//! ems_section: "02-messaging-ipc-data-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Feature data access and partial update planning."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Feature kinds handled by the middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum FeatureType {
    /// Power limits.
    LoadControl,
    /// Configuration key/value pairs.
    DeviceConfiguration,
    /// Heartbeat and device state.
    DeviceDiagnosis,
    /// Measured values.
    Measurement,
    /// Electrical connection parameters and characteristics.
    ElectricalConnection,
}

/// Role of a feature within a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Role {
    /// Consumes data of a server feature.
    Client,
    /// Owns and publishes data.
    Server,
}

/// Kinds of entities a device may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "PascalCase")]
pub enum EntityType {
    /// Central energy management system.
    #[serde(rename = "CEM")]
    #[strum(serialize = "CEM")]
    Cem,
    /// Grid connection point guard.
    GridGuard,
    /// System whose power can be limited.
    ControllableSystem,
    /// Wallbox.
    #[serde(rename = "EVSE")]
    #[strum(serialize = "EVSE")]
    Evse,
    /// Electric vehicle.
    #[serde(rename = "EV")]
    #[strum(serialize = "EV")]
    Ev,
    /// Heat pump appliance.
    HeatPumpAppliance,
    /// PV or battery inverter.
    Inverter,
    /// Generic device information entity.
    DeviceInformation,
}

/// Data functions, one collection each.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum FunctionType {
    /// [`ems_link_model::LimitDescription`] list.
    LoadControlLimitDescriptionListData,
    /// [`ems_link_model::LimitData`] list.
    LoadControlLimitListData,
    /// [`ems_link_model::KeyValueDescription`] list.
    DeviceConfigurationKeyValueDescriptionListData,
    /// [`ems_link_model::KeyValueData`] list.
    DeviceConfigurationKeyValueListData,
    /// [`ems_link_model::MeasurementDescription`] list.
    MeasurementDescriptionListData,
    /// [`ems_link_model::MeasurementData`] list.
    MeasurementListData,
    /// [`ems_link_model::ElectricalConnectionDescription`] list.
    ElectricalConnectionDescriptionListData,
    /// [`ems_link_model::ParameterDescription`] list.
    ElectricalConnectionParameterDescriptionListData,
    /// [`ems_link_model::PermittedValueSetData`] list.
    ElectricalConnectionPermittedValueSetListData,
    /// [`ems_link_model::CharacteristicData`] list.
    ElectricalConnectionCharacteristicListData,
    /// Single [`ems_link_model::HeartbeatData`] record.
    DeviceDiagnosisHeartbeatData,
}

impl FunctionType {
    /// Feature owning this function.
    pub fn feature(&self) -> FeatureType {
        match self {
            FunctionType::LoadControlLimitDescriptionListData
            | FunctionType::LoadControlLimitListData => FeatureType::LoadControl,
            FunctionType::DeviceConfigurationKeyValueDescriptionListData
            | FunctionType::DeviceConfigurationKeyValueListData => FeatureType::DeviceConfiguration,
            FunctionType::MeasurementDescriptionListData | FunctionType::MeasurementListData => {
                FeatureType::Measurement
            }
            FunctionType::ElectricalConnectionDescriptionListData
            | FunctionType::ElectricalConnectionParameterDescriptionListData
            | FunctionType::ElectricalConnectionPermittedValueSetListData
            | FunctionType::ElectricalConnectionCharacteristicListData => {
                FeatureType::ElectricalConnection
            }
            FunctionType::DeviceDiagnosisHeartbeatData => FeatureType::DeviceDiagnosis,
        }
    }
}

/// Operations a feature declares for one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operations {
    /// Full reads are supported.
    pub read: bool,
    /// Reads restricted by a selector are supported.
    pub read_partial: bool,
    /// Full writes are supported.
    pub write: bool,
    /// Delta writes (with delete instructions) are supported.
    pub write_partial: bool,
}

impl Operations {
    /// Read support only, full collections.
    pub const fn read_only() -> Self {
        Self {
            read: true,
            read_partial: false,
            write: false,
            write_partial: false,
        }
    }

    /// Full reads and full writes, no partial support.
    pub const fn read_write() -> Self {
        Self {
            read: true,
            read_partial: false,
            write: true,
            write_partial: false,
        }
    }

    /// Everything, including partial reads and writes.
    pub const fn full() -> Self {
        Self {
            read: true,
            read_partial: true,
            write: true,
            write_partial: true,
        }
    }

    /// A restricted read is only honoured when both partial flags are set; a
    /// remote declaring only one of them is read in full.
    pub fn allows_partial_read(&self) -> bool {
        self.read_partial && self.write_partial
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn every_function_maps_to_a_feature() {
        let load_control = FunctionType::iter()
            .filter(|f| f.feature() == FeatureType::LoadControl)
            .count();
        assert_eq!(load_control, 2);
        assert_eq!(
            FunctionType::DeviceDiagnosisHeartbeatData.feature(),
            FeatureType::DeviceDiagnosis
        );
    }

    #[test]
    fn partial_read_needs_both_flags() {
        let read_only_partial = Operations {
            read_partial: true,
            ..Operations::read_write()
        };
        assert!(!read_only_partial.allows_partial_read());
        assert!(Operations::full().allows_partial_read());
    }

    #[test]
    fn names_render_in_camel_case() {
        assert_eq!(
            FunctionType::DeviceConfigurationKeyValueListData.to_string(),
            "deviceConfigurationKeyValueListData"
        );
        assert_eq!(EntityType::Cem.to_string(), "CEM");
    }
}
