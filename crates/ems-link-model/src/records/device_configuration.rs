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

use super::{UnitOfMeasurement, Updatable};
use crate::ids::KeyId;
use crate::scaled::{ScaledNumber, XsDuration};
use crate::{filterable, record};

/// Well-known configuration keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyName {
    /// Power limit to apply when the controlling side goes silent (consumption).
    FailsafeConsumptionActivePowerLimit,
    /// Power limit to apply when the controlling side goes silent (production).
    FailsafeProductionActivePowerLimit,
    /// Minimum time the failsafe limit stays in effect.
    FailsafeDurationMinimum,
    /// Contractual maximum consumption.
    ContractualConsumptionNominalMax,
    /// Any other key, carried verbatim.
    #[serde(untagged)]
    Other(String),
}

/// Type of the value stored under a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyValueType {
    Boolean,
    Duration,
    String,
    ScaledNumber,
    Integer,
}

/// Static metadata of a configuration key.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyValueDescription {
    pub key_id: Option<KeyId>,
    pub key_name: Option<KeyName>,
    pub value_type: Option<KeyValueType>,
    pub unit: Option<UnitOfMeasurement>,
}

filterable!(KeyValueDescription {
    key_id,
    key_name,
    value_type,
    unit,
});
record!(KeyValueDescription, KeyId, key_id);

/// Value stored under a key. Only the member matching the description's
/// [`KeyValueType`] is expected to be set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyValue {
    pub boolean: Option<bool>,
    pub duration: Option<XsDuration>,
    pub string: Option<String>,
    pub scaled_number: Option<ScaledNumber>,
    pub integer: Option<i64>,
}

impl KeyValue {
    /// `true` when no member is set.
    pub fn is_empty(&self) -> bool {
        self == &KeyValue::default()
    }
}

/// Current value of a configuration key.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyValueData {
    pub key_id: Option<KeyId>,
    #[serde(default)]
    pub value: KeyValue,
    pub is_value_changeable: Option<bool>,
}

filterable!(KeyValueData {
    key_id,
    is_value_changeable,
});
record!(KeyValueData, KeyId, key_id);

/// Fields of [`KeyValueData`] that a delete instruction clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyValueDataElements {
    pub value: bool,
    pub is_value_changeable: bool,
}

impl Updatable for KeyValueData {
    type Elements = KeyValueDataElements;

    fn merge(&mut self, update: &Self) {
        if !update.value.is_empty() {
            self.value = update.value.clone();
        }
        if update.is_value_changeable.is_some() {
            self.is_value_changeable = update.is_value_changeable;
        }
    }

    fn clear(&mut self, elements: &Self::Elements) {
        if elements.value {
            self.value = KeyValue::default();
        }
        if elements.is_value_changeable {
            self.is_value_changeable = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_names_survive_deserialization() {
        let name: KeyName = serde_json::from_str("\"vendorSpecificKey\"").expect("deserialize");
        assert_eq!(name, KeyName::Other("vendorSpecificKey".into()));
        let known: KeyName =
            serde_json::from_str("\"failsafeDurationMinimum\"").expect("deserialize");
        assert_eq!(known, KeyName::FailsafeDurationMinimum);
    }

    #[test]
    fn empty_value_does_not_overwrite_on_merge() {
        let mut stored = KeyValueData {
            key_id: Some(KeyId(0)),
            value: KeyValue {
                scaled_number: Some(ScaledNumber::from_f64(4_200.0)),
                ..KeyValue::default()
            },
            is_value_changeable: Some(true),
        };
        stored.merge(&KeyValueData {
            is_value_changeable: Some(false),
            ..KeyValueData::default()
        });
        assert_eq!(
            stored.value.scaled_number.map(|n| n.value()),
            Some(4_200.0)
        );
        assert_eq!(stored.is_value_changeable, Some(false));
    }
}
