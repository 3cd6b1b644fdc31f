//! ---
//! ems_section: "02-messaging-ipc-data-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Feature data access and partial update planning."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use crate::function::{FunctionType, Operations};
use crate::payload::{DeleteFilter, FunctionData, FunctionRecord, MsgCounter};
use crate::{FeatureError, Result};

/// Access to the data of one feature, local or remote.
///
/// Implementations wrap protocol failures into [`FeatureError::Remote`] without
/// reinterpreting them. Reads return a copy taken at call time.
pub trait FeatureDataAccessor: Send + Sync {
    /// Operations declared for `function`; `None` when the function is not offered.
    fn capabilities(&self, function: FunctionType) -> Option<Operations>;

    /// Copy of the current data; `Ok(None)` when the collection was never populated.
    fn read_copy(&self, function: FunctionType) -> Result<Option<FunctionData>>;

    /// Write `payload`, either as a delta (`partial`) or as a full replacement.
    fn write(
        &self,
        function: FunctionType,
        payload: FunctionData,
        partial: bool,
        delete: Option<DeleteFilter>,
    ) -> Result<()>;

    /// Ask the owner of `function` for fresh data, optionally restricted by `selector`.
    fn request(
        &self,
        function: FunctionType,
        _selector: Option<FunctionData>,
    ) -> Result<MsgCounter> {
        Err(FeatureError::UnsupportedOperation(function))
    }
}

/// Typed copy of a function's collection; `Ok(None)` when never populated.
pub fn read_records<T, A>(accessor: &A) -> Result<Option<Vec<T>>>
where
    T: FunctionRecord,
    A: FeatureDataAccessor + ?Sized,
{
    match accessor.read_copy(T::FUNCTION)? {
        None => Ok(None),
        Some(data) => T::unwrap_ref(&data)
            .cloned()
            .map(Some)
            .ok_or(FeatureError::UnexpectedPayload(T::FUNCTION)),
    }
}
