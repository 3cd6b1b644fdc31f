//! ---
//! ems_section: "02-messaging-ipc-data-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Feature record model and filtered query engine."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fmt;

use serde::{Deserialize, Serialize};

/// Small integer key naming one description/value pair inside a collection.
pub trait Identifier:
    Copy + Eq + Ord + std::hash::Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// First identifier handed out for an empty collection.
    const FIRST: Self;

    /// Raw numeric value.
    fn raw(self) -> u32;

    /// Build from a raw numeric value.
    fn from_raw(raw: u32) -> Self;

    /// The identifier directly after this one.
    fn successor(self) -> Self {
        Self::from_raw(self.raw().saturating_add(1))
    }
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Default,
            Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl Identifier for $name {
            const FIRST: Self = $name(0);

            fn raw(self) -> u32 {
                self.0
            }

            fn from_raw(raw: u32) -> Self {
                $name(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                $name(raw)
            }
        }
    };
}

identifier!(
    /// Identifier of a load control limit.
    LimitId
);
identifier!(
    /// Identifier of a device configuration key/value pair.
    KeyId
);
identifier!(
    /// Identifier of a measurement.
    MeasurementId
);
identifier!(
    /// Identifier of an electrical connection parameter.
    ParameterId
);
identifier!(
    /// Identifier of an electrical connection.
    ElectricalConnectionId
);
identifier!(
    /// Identifier of an electrical connection characteristic.
    CharacteristicId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successor_increments_raw_value() {
        assert_eq!(LimitId::FIRST.successor(), LimitId(1));
        assert_eq!(KeyId(u32::MAX).successor(), KeyId(u32::MAX));
    }

    #[test]
    fn identifiers_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&MeasurementId(7)).expect("serialize");
        assert_eq!(json, "7");
    }
}
