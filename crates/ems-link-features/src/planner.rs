//! ---
//! ems_section: "02-messaging-ipc-data-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Feature data access and partial update planning."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Delta-vs-full write policy.
//!
//! A delta write (with optional delete instructions) is only produced for a
//! function whose owner declared `write_partial`. Everything else receives the
//! full collection with the change folded in.
use ems_link_model::{single_description, Record};
use tracing::debug;

use crate::accessor::{read_records, FeatureDataAccessor};
use crate::function::{FunctionType, Operations};
use crate::payload::{DeleteFilter, FunctionData, FunctionRecord, MsgCounter, PartialRecord};
use crate::{FeatureError, Result};

/// Outcome of [`plan_write`].
#[derive(Debug, Clone, PartialEq)]
pub enum WritePlan<V: PartialRecord> {
    /// Replace the whole collection.
    Full {
        /// Current collection with the change applied.
        payload: Vec<V>,
    },
    /// Send only the changed record.
    Delta {
        /// Changed record, identifier stamped.
        payload: V,
        /// Fields to clear on the remote before merging.
        delete: Option<DeleteFilter>,
    },
}

impl<V: PartialRecord> WritePlan<V> {
    /// `true` for a delta write.
    pub fn is_partial(&self) -> bool {
        matches!(self, WritePlan::Delta { .. })
    }

    /// Split into the arguments of [`FeatureDataAccessor::write`].
    pub fn into_parts(self) -> (FunctionData, bool, Option<DeleteFilter>) {
        match self {
            WritePlan::Full { payload } => (V::wrap(payload), false, None),
            WritePlan::Delta { payload, delete } => (V::wrap(vec![payload]), true, delete),
        }
    }
}

/// Outcome of [`plan_read`].
#[derive(Debug, Clone, PartialEq)]
pub enum ReadPlan {
    /// Read the whole collection.
    Full,
    /// Read only the records matching the selector.
    Partial(FunctionData),
}

impl ReadPlan {
    /// Selector to send, if any.
    pub fn into_selector(self) -> Option<FunctionData> {
        match self {
            ReadPlan::Full => None,
            ReadPlan::Partial(selector) => Some(selector),
        }
    }
}

/// Plan a write of `new_value` to the record described by `target`.
///
/// `target` must resolve to exactly one description carrying an identifier.
/// `delete` names fields to clear; an empty selection counts as none.
pub fn plan_write<D, V>(
    descriptions: &[D],
    current: &[V],
    target: &D,
    mut new_value: V,
    delete: Option<V::Elements>,
    capabilities: Operations,
) -> Result<WritePlan<V>>
where
    D: Record,
    V: PartialRecord<Id = D::Id>,
{
    let description = single_description(descriptions, target)?;
    let id = description
        .identifier()
        .ok_or(FeatureError::MissingRequiredField("identifier"))?;
    new_value.set_identifier(id);
    let delete = delete.filter(|elements| *elements != V::Elements::default());

    if capabilities.write_partial {
        return Ok(WritePlan::Delta {
            payload: new_value,
            delete: delete.map(|elements| V::delete_filter(id, elements)),
        });
    }

    let mut payload = current.to_vec();
    match payload.iter_mut().find(|record| record.identifier() == Some(id)) {
        Some(existing) => {
            if let Some(elements) = &delete {
                existing.clear(elements);
            }
            existing.merge(&new_value);
        }
        None => payload.push(new_value),
    }
    Ok(WritePlan::Full { payload })
}

/// Keep `selector` only when the owner honours restricted reads.
pub fn plan_read(capabilities: Operations, selector: Option<FunctionData>) -> ReadPlan {
    match selector {
        Some(selector) if capabilities.allows_partial_read() => ReadPlan::Partial(selector),
        _ => ReadPlan::Full,
    }
}

/// Executes write and read plans against one feature.
pub struct PartialUpdatePlanner<'a, A: FeatureDataAccessor + ?Sized> {
    accessor: &'a A,
}

impl<'a, A: FeatureDataAccessor + ?Sized> PartialUpdatePlanner<'a, A> {
    /// Plan against `accessor`.
    pub fn new(accessor: &'a A) -> Self {
        Self { accessor }
    }

    /// Write `new_value` to the record whose description matches `filter`.
    pub fn write_for_filter<D, V>(
        &self,
        filter: &D,
        new_value: V,
        delete: Option<V::Elements>,
    ) -> Result<()>
    where
        D: FunctionRecord,
        V: PartialRecord<Id = D::Id>,
    {
        let capabilities = self
            .accessor
            .capabilities(V::FUNCTION)
            .filter(|operations| operations.write)
            .ok_or(FeatureError::UnsupportedOperation(V::FUNCTION))?;
        let descriptions = read_records::<D, A>(self.accessor)?.ok_or(FeatureError::NotAvailable)?;
        let current = read_records::<V, A>(self.accessor)?.unwrap_or_default();

        let plan = plan_write(&descriptions, &current, filter, new_value, delete, capabilities)?;
        let (payload, partial, delete) = plan.into_parts();
        debug!(
            function = %V::FUNCTION,
            partial,
            records = payload.len(),
            delete = delete.is_some(),
            "writing feature data"
        );
        self.accessor.write(V::FUNCTION, payload, partial, delete)
    }

    /// Ask for fresh data of `function`, restricted by `selector` when honoured.
    pub fn request(
        &self,
        function: FunctionType,
        selector: Option<FunctionData>,
    ) -> Result<MsgCounter> {
        let capabilities = self
            .accessor
            .capabilities(function)
            .filter(|operations| operations.read)
            .ok_or(FeatureError::UnsupportedOperation(function))?;
        let plan = plan_read(capabilities, selector);
        self.accessor.request(function, plan.into_selector())
    }
}
