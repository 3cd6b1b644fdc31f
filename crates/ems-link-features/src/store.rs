//! ---
//! ems_section: "02-messaging-ipc-data-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Feature data access and partial update planning."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Data of a locally owned server feature.
use std::collections::HashMap;

use ems_link_model::{
    CharacteristicData, CharacteristicId, HeartbeatData, Identifier, KeyValueData, LimitData,
    Record, Updatable,
};
use parking_lot::RwLock;
use strum::IntoEnumIterator;
use tracing::{debug, warn};

use crate::accessor::FeatureDataAccessor;
use crate::function::{FeatureType, FunctionType, Operations};
use crate::payload::{DeleteFilter, FunctionData, FunctionRecord, PartialRecord};
use crate::{FeatureError, Result};

#[derive(Debug, Default)]
struct StoreInner {
    operations: HashMap<FunctionType, Operations>,
    data: HashMap<FunctionType, FunctionData>,
    // lowest identifier never handed out, per function; may pass u32::MAX
    next_ids: HashMap<FunctionType, u64>,
}

/// In-memory data of one local server feature.
///
/// Functions of the feature start out read-only; writable functions are enabled
/// with [`LocalFeatureStore::set_operations`].
#[derive(Debug)]
pub struct LocalFeatureStore {
    feature: FeatureType,
    inner: RwLock<StoreInner>,
}

impl LocalFeatureStore {
    /// Create an empty store for `feature`.
    pub fn new(feature: FeatureType) -> Self {
        let operations = FunctionType::iter()
            .filter(|function| function.feature() == feature)
            .map(|function| (function, Operations::read_only()))
            .collect();
        Self {
            feature,
            inner: RwLock::new(StoreInner {
                operations,
                ..StoreInner::default()
            }),
        }
    }

    /// Feature type held by this store.
    pub fn feature(&self) -> FeatureType {
        self.feature
    }

    /// Declare the operations offered for `function`.
    pub fn set_operations(&self, function: FunctionType, operations: Operations) {
        self.inner.write().operations.insert(function, operations);
    }

    /// Add a description, assigning `max(existing) + 1` (or 0) when it carries no
    /// identifier. Identifiers are never handed out twice, even after removal.
    pub fn add_description<D: FunctionRecord>(&self, description: D) -> Result<D::Id> {
        self.insert_with_identifier(description)
    }

    /// Add a characteristic; its connection and parameter must be named.
    pub fn add_characteristic(
        &self,
        characteristic: CharacteristicData,
    ) -> Result<CharacteristicId> {
        if characteristic.electrical_connection_id.is_none() {
            return Err(FeatureError::MissingRequiredField("electrical_connection_id"));
        }
        if characteristic.parameter_id.is_none() {
            return Err(FeatureError::MissingRequiredField("parameter_id"));
        }
        self.insert_with_identifier(characteristic)
    }

    /// Copy of a collection; `None` when it was never populated.
    pub fn records<T: FunctionRecord>(&self) -> Option<Vec<T>> {
        let inner = self.inner.read();
        inner
            .data
            .get(&T::FUNCTION)
            .and_then(T::unwrap_ref)
            .cloned()
    }

    /// Merge `update` into the record with identifier `id`, clearing `delete`
    /// first. The record is appended when it does not exist yet.
    pub fn update_by_id<V>(
        &self,
        id: V::Id,
        mut update: V,
        delete: Option<&V::Elements>,
    ) -> Result<()>
    where
        V: FunctionRecord + Updatable,
    {
        update.set_identifier(id);
        let mut inner = self.inner.write();
        let slot = inner
            .data
            .entry(V::FUNCTION)
            .or_insert_with(|| V::wrap(Vec::new()));
        let stored = V::unwrap_mut(slot).ok_or(FeatureError::UnexpectedPayload(V::FUNCTION))?;
        match stored.iter().position(|record| record.identifier() == Some(id)) {
            Some(index) => {
                if let Some(elements) = delete {
                    stored[index].clear(elements);
                }
                stored[index].merge(&update);
            }
            None => stored.push(update),
        }
        Ok(())
    }

    /// Remove the record with identifier `id`; returns whether one was removed.
    pub fn remove<T: FunctionRecord>(&self, id: T::Id) -> bool {
        let mut inner = self.inner.write();
        let Some(stored) = inner.data.get_mut(&T::FUNCTION).and_then(T::unwrap_mut) else {
            return false;
        };
        let before = stored.len();
        stored.retain(|record| record.identifier() != Some(id));
        before != stored.len()
    }

    /// Replace the heartbeat state.
    pub fn set_heartbeat(&self, heartbeat: HeartbeatData) {
        self.inner.write().data.insert(
            FunctionType::DeviceDiagnosisHeartbeatData,
            FunctionData::Heartbeat(heartbeat),
        );
    }

    fn insert_with_identifier<T: FunctionRecord>(&self, mut record: T) -> Result<T::Id> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let slot = inner
            .data
            .entry(T::FUNCTION)
            .or_insert_with(|| T::wrap(Vec::new()));
        let stored = T::unwrap_mut(slot).ok_or(FeatureError::UnexpectedPayload(T::FUNCTION))?;
        let next = inner.next_ids.entry(T::FUNCTION).or_insert(0);

        let id = match record.identifier() {
            Some(id) => {
                if stored.iter().any(|existing| existing.identifier() == Some(id)) {
                    return Err(FeatureError::DuplicateIdentifier(id.raw()));
                }
                id
            }
            None => {
                let after_max = stored
                    .iter()
                    .filter_map(|existing| existing.identifier())
                    .map(|existing| u64::from(existing.raw()) + 1)
                    .max()
                    .unwrap_or(0);
                let raw = u32::try_from(after_max.max(*next))
                    .map_err(|_| FeatureError::DuplicateIdentifier(u32::MAX))?;
                T::Id::from_raw(raw)
            }
        };

        *next = (*next).max(u64::from(id.raw()) + 1);
        record.set_identifier(id);
        stored.push(record);
        debug!(feature = %self.feature, function = %T::FUNCTION, id = %id, "record added");
        Ok(id)
    }
}

impl FeatureDataAccessor for LocalFeatureStore {
    fn capabilities(&self, function: FunctionType) -> Option<Operations> {
        self.inner.read().operations.get(&function).copied()
    }

    fn read_copy(&self, function: FunctionType) -> Result<Option<FunctionData>> {
        Ok(self.inner.read().data.get(&function).cloned())
    }

    fn write(
        &self,
        function: FunctionType,
        payload: FunctionData,
        partial: bool,
        delete: Option<DeleteFilter>,
    ) -> Result<()> {
        if payload.function() != function {
            return Err(FeatureError::UnexpectedPayload(function));
        }
        let mut inner = self.inner.write();
        let operations = inner
            .operations
            .get(&function)
            .copied()
            .filter(|operations| operations.write)
            .ok_or(FeatureError::UnsupportedOperation(function))?;

        if !partial {
            if delete.is_some() {
                warn!(function = %function, "delete instruction ignored on full write");
            }
            inner.data.insert(function, payload);
            return Ok(());
        }
        if !operations.write_partial {
            return Err(FeatureError::UnsupportedOperation(function));
        }

        let Some(slot) = inner.data.get_mut(&function) else {
            inner.data.insert(function, payload);
            return Ok(());
        };
        match payload {
            FunctionData::Limits(items) => {
                if let Some(filter) = &delete {
                    clear_selected::<LimitData>(slot, filter)?;
                }
                upsert(slot, items, |stored, update| stored.merge(&update))
            }
            FunctionData::KeyValues(items) => {
                if let Some(filter) = &delete {
                    clear_selected::<KeyValueData>(slot, filter)?;
                }
                upsert(slot, items, |stored, update| stored.merge(&update))
            }
            FunctionData::Characteristics(items) => {
                upsert(slot, items, |stored, update| stored.merge(&update))
            }
            FunctionData::LimitDescriptions(items) => upsert(slot, items, replace),
            FunctionData::KeyValueDescriptions(items) => upsert(slot, items, replace),
            FunctionData::MeasurementDescriptions(items) => upsert(slot, items, replace),
            FunctionData::Measurements(items) => upsert(slot, items, replace),
            FunctionData::ElectricalConnectionDescriptions(items) => upsert(slot, items, replace),
            FunctionData::ParameterDescriptions(items) => upsert(slot, items, replace),
            FunctionData::PermittedValueSets(items) => upsert(slot, items, replace),
            heartbeat @ FunctionData::Heartbeat(_) => {
                *slot = heartbeat;
                Ok(())
            }
        }
    }
}

fn replace<T>(stored: &mut T, update: T) {
    *stored = update;
}

fn upsert<T: FunctionRecord>(
    slot: &mut FunctionData,
    items: Vec<T>,
    combine: impl Fn(&mut T, T),
) -> Result<()> {
    let stored = T::unwrap_mut(slot).ok_or(FeatureError::UnexpectedPayload(T::FUNCTION))?;
    for item in items {
        let position = item
            .identifier()
            .and_then(|id| stored.iter().position(|record| record.identifier() == Some(id)));
        match position {
            Some(index) => combine(&mut stored[index], item),
            None => stored.push(item),
        }
    }
    Ok(())
}

fn clear_selected<V: PartialRecord>(slot: &mut FunctionData, filter: &DeleteFilter) -> Result<()> {
    let (id, elements) =
        V::delete_target(filter).ok_or(FeatureError::UnexpectedPayload(V::FUNCTION))?;
    let stored = V::unwrap_mut(slot).ok_or(FeatureError::UnexpectedPayload(V::FUNCTION))?;
    for record in stored
        .iter_mut()
        .filter(|record| record.identifier() == Some(id))
    {
        record.clear(elements);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ems_link_model::{
        ElectricalConnectionId, KeyName, KeyValueDescription, LimitDataElements,
        LimitDescription, LimitId, ParameterId, ScaledNumber, TimePeriod,
    };

    use super::*;

    #[test]
    fn identifiers_are_allocated_sequentially() {
        let store = LocalFeatureStore::new(FeatureType::DeviceConfiguration);
        for expected in 0..4u32 {
            let id = store
                .add_description(KeyValueDescription {
                    key_name: Some(KeyName::Other(format!("key-{expected}"))),
                    ..KeyValueDescription::default()
                })
                .expect("add description");
            assert_eq!(id.raw(), expected);
        }
        let next = store
            .add_description(KeyValueDescription::default())
            .expect("add description");
        assert_eq!(next.raw(), 4);
    }

    #[test]
    fn removed_identifiers_are_not_reused() {
        let store = LocalFeatureStore::new(FeatureType::LoadControl);
        store
            .add_description(LimitDescription::default())
            .expect("first");
        let second = store
            .add_description(LimitDescription::default())
            .expect("second");
        assert!(store.remove::<LimitDescription>(second));
        let third = store
            .add_description(LimitDescription::default())
            .expect("third");
        assert_eq!(third, LimitId(2));
    }

    #[test]
    fn explicit_identifiers_must_be_unique() {
        let store = LocalFeatureStore::new(FeatureType::LoadControl);
        let explicit = LimitDescription::with_identifier(LimitId(5));
        assert_eq!(store.add_description(explicit.clone()), Ok(LimitId(5)));
        assert_eq!(
            store.add_description(explicit),
            Err(FeatureError::DuplicateIdentifier(5))
        );
        assert_eq!(
            store.add_description(LimitDescription::default()),
            Ok(LimitId(6))
        );
    }

    #[test]
    fn allocation_stops_at_the_last_identifier() {
        let store = LocalFeatureStore::new(FeatureType::LoadControl);
        assert_eq!(
            store.add_description(LimitDescription::with_identifier(LimitId(u32::MAX))),
            Ok(LimitId(u32::MAX))
        );
        assert_eq!(
            store.add_description(LimitDescription::default()),
            Err(FeatureError::DuplicateIdentifier(u32::MAX))
        );
        assert_eq!(store.records::<LimitDescription>().map(|d| d.len()), Some(1));
    }

    #[test]
    fn characteristics_need_connection_and_parameter() {
        let store = LocalFeatureStore::new(FeatureType::ElectricalConnection);
        assert_eq!(
            store.add_characteristic(CharacteristicData::default()),
            Err(FeatureError::MissingRequiredField("electrical_connection_id"))
        );
        assert_eq!(
            store.add_characteristic(CharacteristicData {
                electrical_connection_id: Some(ElectricalConnectionId(0)),
                ..CharacteristicData::default()
            }),
            Err(FeatureError::MissingRequiredField("parameter_id"))
        );
        assert!(store.records::<CharacteristicData>().is_none());
        let id = store
            .add_characteristic(CharacteristicData {
                electrical_connection_id: Some(ElectricalConnectionId(0)),
                parameter_id: Some(ParameterId(0)),
                ..CharacteristicData::default()
            })
            .expect("add characteristic");
        assert_eq!(id, CharacteristicId(0));
    }

    fn stored_limit() -> LimitData {
        LimitData {
            limit_id: Some(LimitId(0)),
            is_limit_changeable: Some(true),
            is_limit_active: Some(true),
            time_period: Some(TimePeriod::ending_after(Duration::from_secs(600))),
            value: Some(ScaledNumber::from_f64(4_200.0)),
        }
    }

    #[test]
    fn writes_require_the_write_operation() {
        let store = LocalFeatureStore::new(FeatureType::LoadControl);
        let result = store.write(
            FunctionType::LoadControlLimitListData,
            FunctionData::Limits(vec![stored_limit()]),
            false,
            None,
        );
        assert_eq!(
            result,
            Err(FeatureError::UnsupportedOperation(
                FunctionType::LoadControlLimitListData
            ))
        );
    }

    #[test]
    fn partial_write_merges_and_applies_deletes() {
        let store = LocalFeatureStore::new(FeatureType::LoadControl);
        store.set_operations(FunctionType::LoadControlLimitListData, Operations::full());
        store
            .update_by_id(LimitId(0), stored_limit(), None)
            .expect("seed");

        let delta = LimitData {
            limit_id: Some(LimitId(0)),
            value: Some(ScaledNumber::from_f64(1_000.0)),
            ..LimitData::default()
        };
        let delete = LimitData::delete_filter(
            LimitId(0),
            LimitDataElements {
                time_period: true,
                ..LimitDataElements::default()
            },
        );
        store
            .write(
                FunctionType::LoadControlLimitListData,
                FunctionData::Limits(vec![delta]),
                true,
                Some(delete),
            )
            .expect("partial write");

        let limits = store.records::<LimitData>().expect("limits present");
        assert_eq!(limits.len(), 1);
        assert!(limits[0].time_period.is_none());
        assert_eq!(limits[0].is_limit_active, Some(true));
        assert_eq!(limits[0].value.map(|v| v.value()), Some(1_000.0));
    }

    #[test]
    fn full_write_replaces_the_collection() {
        let store = LocalFeatureStore::new(FeatureType::LoadControl);
        store.set_operations(
            FunctionType::LoadControlLimitListData,
            Operations::read_write(),
        );
        store
            .update_by_id(LimitId(0), stored_limit(), None)
            .expect("seed");
        store
            .update_by_id(LimitId(1), stored_limit(), None)
            .expect("seed");

        let replacement = LimitData {
            limit_id: Some(LimitId(1)),
            is_limit_active: Some(false),
            ..LimitData::default()
        };
        store
            .write(
                FunctionType::LoadControlLimitListData,
                FunctionData::Limits(vec![replacement.clone()]),
                false,
                None,
            )
            .expect("full write");
        assert_eq!(store.records::<LimitData>(), Some(vec![replacement]));

        let partial = store.write(
            FunctionType::LoadControlLimitListData,
            FunctionData::Limits(Vec::new()),
            true,
            None,
        );
        assert!(matches!(
            partial,
            Err(FeatureError::UnsupportedOperation(_))
        ));
    }
}
