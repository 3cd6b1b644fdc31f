//! ---
//! ems_section: "02-messaging-ipc-data-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Feature record model and filtered query engine."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Equality-or-wildcard matching, stable search, and the description/value join.
use std::collections::HashSet;

use crate::error::QueryError;
use crate::ids::Identifier;

/// A record that can be compared against a sparse filter of the same type.
pub trait Filterable {
    /// `true` when every field present in `filter` is present in `self` with an
    /// equal value. Fields absent in `filter` are ignored.
    fn matches(&self, filter: &Self) -> bool;
}

/// Compare one optional field against its filter counterpart.
#[inline]
pub fn field_matches<T: PartialEq>(candidate: &Option<T>, filter: &Option<T>) -> bool {
    match filter {
        None => true,
        Some(expected) => candidate.as_ref() == Some(expected),
    }
}

/// Implement [`Filterable`] for a record from the explicit list of its optional,
/// comparable fields. Nested structures are left out of the list.
#[macro_export]
macro_rules! filterable {
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        impl $crate::filter::Filterable for $ty {
            fn matches(&self, filter: &Self) -> bool {
                true $(&& $crate::filter::field_matches(&self.$field, &filter.$field))+
            }
        }
    };
}

/// A description or value record keyed by an identifier.
pub trait Record: Filterable + Clone + Default {
    /// Identifier shared by a description and its values.
    type Id: Identifier;

    /// Identifier carried by this record, if any.
    fn identifier(&self) -> Option<Self::Id>;

    /// Stamp an identifier onto this record.
    fn set_identifier(&mut self, id: Self::Id);

    /// Identifier-only filter.
    fn with_identifier(id: Self::Id) -> Self {
        let mut record = Self::default();
        record.set_identifier(id);
        record
    }
}

/// Implement [`Record`] given the identifier type and the field carrying it.
#[macro_export]
macro_rules! record {
    ($ty:ty, $id:ty, $field:ident) => {
        impl $crate::filter::Record for $ty {
            type Id = $id;

            fn identifier(&self) -> Option<$id> {
                self.$field
            }

            fn set_identifier(&mut self, id: $id) {
                self.$field = Some(id);
            }
        }
    };
}

/// Matching records in collection order. Never fails: no match, an empty
/// collection and missing data all yield an empty vector.
pub fn search<T: Filterable + Clone>(collection: &[T], filter: &T) -> Vec<T> {
    collection
        .iter()
        .filter(|candidate| candidate.matches(filter))
        .cloned()
        .collect()
}

/// The single description matching `filter`.
pub fn single_description<D: Filterable + Clone>(
    descriptions: &[D],
    filter: &D,
) -> Result<D, QueryError> {
    let mut matched = search(descriptions, filter);
    match matched.len() {
        0 => Err(QueryError::NotAvailable),
        1 => Ok(matched.remove(0)),
        matches => Err(QueryError::Ambiguous { matches }),
    }
}

/// Values belonging to the descriptions matching `filter`, in description order.
///
/// Fails with [`QueryError::NotAvailable`] when no description matches. A value is
/// only returned through the description carrying its identifier; descriptions
/// without an identifier or repeating an identifier already joined contribute
/// nothing.
pub fn join_descriptions<D, V>(
    descriptions: &[D],
    values: &[V],
    filter: &D,
) -> Result<Vec<V>, QueryError>
where
    D: Record,
    V: Record<Id = D::Id>,
{
    let matched = search(descriptions, filter);
    if matched.is_empty() {
        return Err(QueryError::NotAvailable);
    }

    let mut joined = HashSet::new();
    let mut result = Vec::new();
    for description in &matched {
        let Some(id) = description.identifier() else {
            continue;
        };
        if !joined.insert(id) {
            continue;
        }
        result.extend(search(values, &V::with_identifier(id)));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{KeyId, LimitId};
    use crate::records::{
        EnergyDirection, KeyName, KeyValue, KeyValueData, KeyValueDescription, KeyValueType,
        LimitCategory, LimitDescription, LimitType, ScopeType,
    };
    use crate::scaled::ScaledNumber;

    fn limit(
        id: u32,
        category: LimitCategory,
        direction: EnergyDirection,
        scope: ScopeType,
    ) -> LimitDescription {
        LimitDescription {
            limit_id: Some(LimitId(id)),
            limit_type: Some(LimitType::SignDependentAbsValueLimit),
            limit_category: Some(category),
            limit_direction: Some(direction),
            scope_type: Some(scope),
            ..LimitDescription::default()
        }
    }

    fn sample() -> Vec<LimitDescription> {
        vec![
            limit(
                0,
                LimitCategory::Obligation,
                EnergyDirection::Consume,
                ScopeType::ActivePowerLimit,
            ),
            limit(
                1,
                LimitCategory::Recommendation,
                EnergyDirection::Consume,
                ScopeType::ActivePowerLimit,
            ),
            limit(
                2,
                LimitCategory::Obligation,
                EnergyDirection::Produce,
                ScopeType::ActivePowerLimit,
            ),
            LimitDescription {
                limit_id: Some(LimitId(3)),
                ..LimitDescription::default()
            },
        ]
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = LimitDescription::default();
        for record in sample() {
            assert!(record.matches(&filter));
        }
        assert_eq!(search(&sample(), &filter).len(), 4);
    }

    #[test]
    fn absent_candidate_field_does_not_match_present_filter_field() {
        let filter = LimitDescription {
            limit_category: Some(LimitCategory::Obligation),
            ..LimitDescription::default()
        };
        let ids: Vec<_> = search(&sample(), &filter)
            .into_iter()
            .filter_map(|d| d.limit_id)
            .collect();
        assert_eq!(ids, vec![LimitId(0), LimitId(2)]);
    }

    #[test]
    fn adding_constraints_only_narrows_the_result() {
        let data = sample();
        let broad = LimitDescription {
            limit_category: Some(LimitCategory::Obligation),
            ..LimitDescription::default()
        };
        let narrow = LimitDescription {
            limit_direction: Some(EnergyDirection::Consume),
            ..broad.clone()
        };
        let broad_hits = search(&data, &broad);
        let narrow_hits = search(&data, &narrow);
        assert!(narrow_hits.len() <= broad_hits.len());
        for hit in &narrow_hits {
            assert!(broad_hits.contains(hit));
        }
        assert_eq!(narrow_hits.len(), 1);
    }

    #[test]
    fn search_preserves_collection_order() {
        let filter = LimitDescription {
            scope_type: Some(ScopeType::ActivePowerLimit),
            ..LimitDescription::default()
        };
        let ids: Vec<_> = search(&sample(), &filter)
            .into_iter()
            .filter_map(|d| d.limit_id)
            .collect();
        assert_eq!(ids, vec![LimitId(0), LimitId(1), LimitId(2)]);
        assert!(search::<LimitDescription>(&[], &filter).is_empty());
    }

    #[test]
    fn single_description_rejects_zero_and_many() {
        let data = sample();
        let by_id = LimitDescription::with_identifier(LimitId(2));
        assert_eq!(
            single_description(&data, &by_id).expect("one match").limit_id,
            Some(LimitId(2))
        );
        assert_eq!(
            single_description(&data, &LimitDescription::with_identifier(LimitId(9))),
            Err(QueryError::NotAvailable)
        );
        let consume = LimitDescription {
            limit_direction: Some(EnergyDirection::Consume),
            ..LimitDescription::default()
        };
        assert_eq!(
            single_description(&data, &consume),
            Err(QueryError::Ambiguous { matches: 2 })
        );
    }

    fn key_value(id: u32, value: f64) -> KeyValueData {
        KeyValueData {
            key_id: Some(KeyId(id)),
            value: KeyValue {
                scaled_number: Some(ScaledNumber::from_f64(value)),
                ..KeyValue::default()
            },
            is_value_changeable: None,
        }
    }

    #[test]
    fn join_only_returns_values_with_a_description() {
        let descriptions = vec![
            KeyValueDescription {
                key_id: Some(KeyId(0)),
                key_name: Some(KeyName::FailsafeConsumptionActivePowerLimit),
                value_type: Some(KeyValueType::ScaledNumber),
                ..KeyValueDescription::default()
            },
            KeyValueDescription {
                key_id: Some(KeyId(1)),
                key_name: Some(KeyName::FailsafeDurationMinimum),
                value_type: Some(KeyValueType::Duration),
                ..KeyValueDescription::default()
            },
        ];
        let values = vec![key_value(1, 2.0), key_value(7, 3.0), key_value(0, 1.0)];

        let all = join_descriptions(&descriptions, &values, &KeyValueDescription::default())
            .expect("descriptions match");
        let ids: Vec<_> = all.iter().filter_map(|v| v.key_id).collect();
        assert_eq!(ids, vec![KeyId(0), KeyId(1)]);
        for value in &all {
            let owners = descriptions
                .iter()
                .filter(|d| d.key_id == value.key_id)
                .count();
            assert_eq!(owners, 1);
        }

        let missing = KeyValueDescription {
            key_name: Some(KeyName::ContractualConsumptionNominalMax),
            ..KeyValueDescription::default()
        };
        assert_eq!(
            join_descriptions(&descriptions, &values, &missing),
            Err(QueryError::NotAvailable)
        );
    }

    #[test]
    fn nested_structures_do_not_take_part_in_matching() {
        let candidate = key_value(0, 10.0);
        let filter = KeyValueData {
            value: KeyValue {
                scaled_number: Some(ScaledNumber::from_f64(99.0)),
                ..KeyValue::default()
            },
            ..KeyValueData::default()
        };
        assert!(candidate.matches(&filter));
    }
}
