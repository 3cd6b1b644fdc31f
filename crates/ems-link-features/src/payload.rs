//! ---
//! ems_section: "02-messaging-ipc-data-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Feature data access and partial update planning."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fmt;

use ems_link_model::{
    CharacteristicData, ElectricalConnectionDescription, HeartbeatData, KeyId, KeyValueData,
    KeyValueDataElements, KeyValueDescription, LimitData, LimitDataElements, LimitDescription,
    LimitId, MeasurementData, MeasurementDescription, ParameterDescription,
    PermittedValueSetData, Record, Updatable,
};
use serde::{Deserialize, Serialize};

use crate::function::FunctionType;

/// Per-request counter of the protocol layer, used as correlation id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MsgCounter(pub u64);

impl fmt::Display for MsgCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MsgCounter {
    fn from(raw: u64) -> Self {
        MsgCounter(raw)
    }
}

/// Type-erased data of one function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "function", content = "data", rename_all = "camelCase")]
pub enum FunctionData {
    /// Limit descriptions.
    LimitDescriptions(Vec<LimitDescription>),
    /// Limit values.
    Limits(Vec<LimitData>),
    /// Key/value descriptions.
    KeyValueDescriptions(Vec<KeyValueDescription>),
    /// Key/value values.
    KeyValues(Vec<KeyValueData>),
    /// Measurement descriptions.
    MeasurementDescriptions(Vec<MeasurementDescription>),
    /// Measurement values.
    Measurements(Vec<MeasurementData>),
    /// Electrical connection descriptions.
    ElectricalConnectionDescriptions(Vec<ElectricalConnectionDescription>),
    /// Electrical connection parameter descriptions.
    ParameterDescriptions(Vec<ParameterDescription>),
    /// Permitted value sets.
    PermittedValueSets(Vec<PermittedValueSetData>),
    /// Electrical connection characteristics.
    Characteristics(Vec<CharacteristicData>),
    /// Heartbeat state.
    Heartbeat(HeartbeatData),
}

impl FunctionData {
    /// Function this payload belongs to.
    pub fn function(&self) -> FunctionType {
        match self {
            FunctionData::LimitDescriptions(_) => FunctionType::LoadControlLimitDescriptionListData,
            FunctionData::Limits(_) => FunctionType::LoadControlLimitListData,
            FunctionData::KeyValueDescriptions(_) => {
                FunctionType::DeviceConfigurationKeyValueDescriptionListData
            }
            FunctionData::KeyValues(_) => FunctionType::DeviceConfigurationKeyValueListData,
            FunctionData::MeasurementDescriptions(_) => {
                FunctionType::MeasurementDescriptionListData
            }
            FunctionData::Measurements(_) => FunctionType::MeasurementListData,
            FunctionData::ElectricalConnectionDescriptions(_) => {
                FunctionType::ElectricalConnectionDescriptionListData
            }
            FunctionData::ParameterDescriptions(_) => {
                FunctionType::ElectricalConnectionParameterDescriptionListData
            }
            FunctionData::PermittedValueSets(_) => {
                FunctionType::ElectricalConnectionPermittedValueSetListData
            }
            FunctionData::Characteristics(_) => {
                FunctionType::ElectricalConnectionCharacteristicListData
            }
            FunctionData::Heartbeat(_) => FunctionType::DeviceDiagnosisHeartbeatData,
        }
    }

    /// Number of records carried.
    pub fn len(&self) -> usize {
        match self {
            FunctionData::LimitDescriptions(items) => items.len(),
            FunctionData::Limits(items) => items.len(),
            FunctionData::KeyValueDescriptions(items) => items.len(),
            FunctionData::KeyValues(items) => items.len(),
            FunctionData::MeasurementDescriptions(items) => items.len(),
            FunctionData::Measurements(items) => items.len(),
            FunctionData::ElectricalConnectionDescriptions(items) => items.len(),
            FunctionData::ParameterDescriptions(items) => items.len(),
            FunctionData::PermittedValueSets(items) => items.len(),
            FunctionData::Characteristics(items) => items.len(),
            FunctionData::Heartbeat(_) => 1,
        }
    }

    /// `true` when no records are carried.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A record type stored as the collection of one function.
pub trait FunctionRecord: Record + Send + Sync + 'static {
    /// Function holding collections of this record.
    const FUNCTION: FunctionType;

    /// Wrap a collection into its type-erased payload.
    fn wrap(items: Vec<Self>) -> FunctionData;

    /// Borrow the collection if `data` holds this record type.
    fn unwrap_ref(data: &FunctionData) -> Option<&Vec<Self>>;

    /// Mutably borrow the collection if `data` holds this record type.
    fn unwrap_mut(data: &mut FunctionData) -> Option<&mut Vec<Self>>;
}

macro_rules! function_record {
    ($ty:ty, $function:ident, $variant:ident) => {
        impl FunctionRecord for $ty {
            const FUNCTION: FunctionType = FunctionType::$function;

            fn wrap(items: Vec<Self>) -> FunctionData {
                FunctionData::$variant(items)
            }

            fn unwrap_ref(data: &FunctionData) -> Option<&Vec<Self>> {
                match data {
                    FunctionData::$variant(items) => Some(items),
                    _ => None,
                }
            }

            fn unwrap_mut(data: &mut FunctionData) -> Option<&mut Vec<Self>> {
                match data {
                    FunctionData::$variant(items) => Some(items),
                    _ => None,
                }
            }
        }
    };
}

function_record!(LimitDescription, LoadControlLimitDescriptionListData, LimitDescriptions);
function_record!(LimitData, LoadControlLimitListData, Limits);
function_record!(
    KeyValueDescription,
    DeviceConfigurationKeyValueDescriptionListData,
    KeyValueDescriptions
);
function_record!(KeyValueData, DeviceConfigurationKeyValueListData, KeyValues);
function_record!(
    MeasurementDescription,
    MeasurementDescriptionListData,
    MeasurementDescriptions
);
function_record!(MeasurementData, MeasurementListData, Measurements);
function_record!(
    ElectricalConnectionDescription,
    ElectricalConnectionDescriptionListData,
    ElectricalConnectionDescriptions
);
function_record!(
    ParameterDescription,
    ElectricalConnectionParameterDescriptionListData,
    ParameterDescriptions
);
function_record!(
    PermittedValueSetData,
    ElectricalConnectionPermittedValueSetListData,
    PermittedValueSets
);
function_record!(
    CharacteristicData,
    ElectricalConnectionCharacteristicListData,
    Characteristics
);

/// Delete instruction sent alongside a delta write: clear `elements` on the
/// record selected by `selector`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "function", rename_all = "camelCase")]
pub enum DeleteFilter {
    /// Clear fields of one limit.
    Limit {
        /// Limit to modify.
        selector: LimitId,
        /// Fields to clear.
        elements: LimitDataElements,
    },
    /// Clear fields of one key/value pair.
    KeyValue {
        /// Key to modify.
        selector: KeyId,
        /// Fields to clear.
        elements: KeyValueDataElements,
    },
}

/// A value record that can be written as a delta with delete instructions.
pub trait PartialRecord: FunctionRecord + Updatable {
    /// Build the delete instruction for `id`.
    fn delete_filter(id: Self::Id, elements: Self::Elements) -> DeleteFilter;

    /// Extract the target of a delete instruction aimed at this record type.
    fn delete_target(filter: &DeleteFilter) -> Option<(Self::Id, &Self::Elements)>;
}

impl PartialRecord for LimitData {
    fn delete_filter(id: LimitId, elements: LimitDataElements) -> DeleteFilter {
        DeleteFilter::Limit {
            selector: id,
            elements,
        }
    }

    fn delete_target(filter: &DeleteFilter) -> Option<(LimitId, &LimitDataElements)> {
        match filter {
            DeleteFilter::Limit { selector, elements } => Some((*selector, elements)),
            _ => None,
        }
    }
}

impl PartialRecord for KeyValueData {
    fn delete_filter(id: KeyId, elements: KeyValueDataElements) -> DeleteFilter {
        DeleteFilter::KeyValue {
            selector: id,
            elements,
        }
    }

    fn delete_target(filter: &DeleteFilter) -> Option<(KeyId, &KeyValueDataElements)> {
        match filter {
            DeleteFilter::KeyValue { selector, elements } => Some((*selector, elements)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_reports_its_function() {
        let data = LimitData::wrap(vec![LimitData::default(), LimitData::default()]);
        assert_eq!(data.function(), FunctionType::LoadControlLimitListData);
        assert_eq!(data.len(), 2);
        assert!(LimitDescription::unwrap_ref(&data).is_none());
        assert_eq!(LimitData::unwrap_ref(&data).map(Vec::len), Some(2));
    }

    #[test]
    fn delete_filter_targets_only_its_record_type() {
        let filter = LimitData::delete_filter(
            LimitId(3),
            LimitDataElements {
                time_period: true,
                ..LimitDataElements::default()
            },
        );
        let (id, elements) = LimitData::delete_target(&filter).expect("limit filter");
        assert_eq!(id, LimitId(3));
        assert!(elements.time_period);
        assert!(KeyValueData::delete_target(&filter).is_none());
    }

    #[test]
    fn payload_serializes_with_function_tag() {
        let json = serde_json::to_value(FunctionData::KeyValues(Vec::new())).expect("serialize");
        assert_eq!(json["function"], "keyValues");
    }
}
