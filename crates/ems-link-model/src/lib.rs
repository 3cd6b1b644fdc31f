//! ---
//! ems_section: "02-messaging-ipc-data-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Feature record model and filtered query engine."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Typed feature records and the generic query engine used by ems-link.
//!
//! Every record field is an `Option`: a present field carries a value, an absent
//! one carries nothing. A record of the same type doubles as a filter, where
//! absent fields are wildcards and present fields must match exactly.

pub mod error;
pub mod filter;
pub mod ids;
pub mod records;
pub mod scaled;

pub use error::{ModelError, QueryError};
pub use filter::{join_descriptions, search, single_description, Filterable, Record};
pub use ids::{
    CharacteristicId, ElectricalConnectionId, Identifier, KeyId, LimitId, MeasurementId,
    ParameterId,
};
pub use records::*;
pub use scaled::{ScaledNumber, TimePeriod, XsDuration};
