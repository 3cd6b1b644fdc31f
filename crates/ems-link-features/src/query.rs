//! ---
//! ems_section: "02-messaging-ipc-data-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Feature data access and partial update planning."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Read helpers per feature, built on the filtered query engine.
//!
//! Filter reads return an empty vector when nothing matches and
//! [`FeatureError::NotAvailable`] when the collection was never populated.
//! Lookups meant to identify one record refuse both zero and several matches.
use ems_link_model::{
    join_descriptions, limits_for_parameter, search, single_description, CharacteristicData,
    ElectricalConnectionDescription, ElectricalConnectionId, HeartbeatData, KeyId, KeyValueData,
    KeyValueDescription, LimitData, LimitDescription, LimitId, MeasurementData,
    MeasurementDescription, MeasurementId, ParameterDescription, ParameterId, ParameterLimits,
    PermittedValueSetData, Record,
};

use crate::accessor::{read_records, FeatureDataAccessor};
use crate::function::FunctionType;
use crate::payload::{FunctionData, FunctionRecord, MsgCounter};
use crate::planner::PartialUpdatePlanner;
use crate::{FeatureError, Result};

/// Generic description/value queries over one feature.
pub struct FeatureQuery<'a, A: FeatureDataAccessor + ?Sized> {
    accessor: &'a A,
}

impl<'a, A: FeatureDataAccessor + ?Sized> FeatureQuery<'a, A> {
    /// Query through `accessor`.
    pub fn new(accessor: &'a A) -> Self {
        Self { accessor }
    }

    /// The whole collection of `T`.
    pub fn all<T: FunctionRecord>(&self) -> Result<Vec<T>> {
        read_records::<T, A>(self.accessor)?.ok_or(FeatureError::NotAvailable)
    }

    /// Records matching `filter`, possibly none.
    pub fn descriptions_for_filter<D: FunctionRecord>(&self, filter: &D) -> Result<Vec<D>> {
        Ok(search(&self.all::<D>()?, filter))
    }

    /// The one description carrying `id`.
    pub fn description_for_id<D: FunctionRecord>(&self, id: D::Id) -> Result<D> {
        Ok(single_description(&self.all::<D>()?, &D::with_identifier(id))?)
    }

    /// Values of every description matching `filter`; fails when nothing joins.
    pub fn data_for_filter<D, V>(&self, filter: &D) -> Result<Vec<V>>
    where
        D: FunctionRecord,
        V: FunctionRecord<Id = D::Id>,
    {
        let descriptions = self.all::<D>()?;
        let values = self.all::<V>()?;
        let joined = join_descriptions(&descriptions, &values, filter)?;
        if joined.is_empty() {
            return Err(FeatureError::NotAvailable);
        }
        Ok(joined)
    }

    /// The value of the one description carrying `id`.
    pub fn data_for_id<D, V>(&self, id: D::Id) -> Result<V>
    where
        D: FunctionRecord,
        V: FunctionRecord<Id = D::Id>,
    {
        self.description_for_id::<D>(id)?;
        Ok(single_description(&self.all::<V>()?, &V::with_identifier(id))?)
    }

    /// The value of the single description matching `filter`.
    pub fn single_data_for_filter<D, V>(&self, filter: &D) -> Result<V>
    where
        D: FunctionRecord,
        V: FunctionRecord<Id = D::Id>,
    {
        let description = single_description(&self.all::<D>()?, filter)?;
        let id = description
            .identifier()
            .ok_or(FeatureError::MissingRequiredField("identifier"))?;
        self.data_for_id::<D, V>(id)
    }

    /// Ask the owner for fresh data of `function`.
    pub fn request(
        &self,
        function: FunctionType,
        selector: Option<FunctionData>,
    ) -> Result<MsgCounter> {
        PartialUpdatePlanner::new(self.accessor).request(function, selector)
    }
}

/// Load control limits.
pub struct LoadControl<'a, A: FeatureDataAccessor + ?Sized>(FeatureQuery<'a, A>);

impl<'a, A: FeatureDataAccessor + ?Sized> LoadControl<'a, A> {
    /// Query limits through `accessor`.
    pub fn new(accessor: &'a A) -> Self {
        Self(FeatureQuery::new(accessor))
    }

    /// Limit descriptions matching `filter`.
    pub fn limit_descriptions_for_filter(
        &self,
        filter: &LimitDescription,
    ) -> Result<Vec<LimitDescription>> {
        self.0.descriptions_for_filter(filter)
    }

    /// The description of limit `id`.
    pub fn limit_description_for_id(&self, id: LimitId) -> Result<LimitDescription> {
        self.0.description_for_id(id)
    }

    /// Limit values of every description matching `filter`.
    pub fn limit_data_for_filter(&self, filter: &LimitDescription) -> Result<Vec<LimitData>> {
        self.0.data_for_filter(filter)
    }

    /// The value of limit `id`.
    pub fn limit_data_for_id(&self, id: LimitId) -> Result<LimitData> {
        self.0.data_for_id::<LimitDescription, _>(id)
    }

    /// The value of the single limit described by `filter`.
    pub fn single_limit_data_for_filter(&self, filter: &LimitDescription) -> Result<LimitData> {
        self.0.single_data_for_filter(filter)
    }

    /// Ask for fresh limit values.
    pub fn request_limit_data(&self) -> Result<MsgCounter> {
        self.0.request(FunctionType::LoadControlLimitListData, None)
    }
}

/// Configuration key/value pairs.
pub struct DeviceConfiguration<'a, A: FeatureDataAccessor + ?Sized>(FeatureQuery<'a, A>);

impl<'a, A: FeatureDataAccessor + ?Sized> DeviceConfiguration<'a, A> {
    /// Query key/value pairs through `accessor`.
    pub fn new(accessor: &'a A) -> Self {
        Self(FeatureQuery::new(accessor))
    }

    /// Key descriptions matching `filter`.
    pub fn key_value_descriptions_for_filter(
        &self,
        filter: &KeyValueDescription,
    ) -> Result<Vec<KeyValueDescription>> {
        self.0.descriptions_for_filter(filter)
    }

    /// The description of key `id`.
    pub fn key_value_description_for_key_id(&self, id: KeyId) -> Result<KeyValueDescription> {
        self.0.description_for_id(id)
    }

    /// The value of key `id`.
    pub fn key_value_data_for_key_id(&self, id: KeyId) -> Result<KeyValueData> {
        self.0.data_for_id::<KeyValueDescription, _>(id)
    }

    /// The value of the single key described by `filter`.
    pub fn key_value_data_for_filter(&self, filter: &KeyValueDescription) -> Result<KeyValueData> {
        self.0.single_data_for_filter(filter)
    }
}

/// Measured values.
pub struct Measurement<'a, A: FeatureDataAccessor + ?Sized>(FeatureQuery<'a, A>);

impl<'a, A: FeatureDataAccessor + ?Sized> Measurement<'a, A> {
    /// Query measurements through `accessor`.
    pub fn new(accessor: &'a A) -> Self {
        Self(FeatureQuery::new(accessor))
    }

    /// Measurement descriptions matching `filter`.
    pub fn descriptions_for_filter(
        &self,
        filter: &MeasurementDescription,
    ) -> Result<Vec<MeasurementDescription>> {
        self.0.descriptions_for_filter(filter)
    }

    /// Values of every measurement matching `filter`.
    pub fn data_for_filter(&self, filter: &MeasurementDescription) -> Result<Vec<MeasurementData>> {
        self.0.data_for_filter(filter)
    }

    /// The value of measurement `id`.
    pub fn data_for_id(&self, id: MeasurementId) -> Result<MeasurementData> {
        self.0.data_for_id::<MeasurementDescription, _>(id)
    }
}

/// Electrical connection parameters, permitted values and characteristics.
pub struct ElectricalConnection<'a, A: FeatureDataAccessor + ?Sized>(FeatureQuery<'a, A>);

impl<'a, A: FeatureDataAccessor + ?Sized> ElectricalConnection<'a, A> {
    /// Query the electrical connection through `accessor`.
    pub fn new(accessor: &'a A) -> Self {
        Self(FeatureQuery::new(accessor))
    }

    /// Connection descriptions matching `filter`.
    pub fn descriptions_for_filter(
        &self,
        filter: &ElectricalConnectionDescription,
    ) -> Result<Vec<ElectricalConnectionDescription>> {
        self.0.descriptions_for_filter(filter)
    }

    /// Parameter descriptions matching `filter`.
    pub fn parameter_descriptions_for_filter(
        &self,
        filter: &ParameterDescription,
    ) -> Result<Vec<ParameterDescription>> {
        self.0.descriptions_for_filter(filter)
    }

    /// Minimum, maximum and default value permitted for one parameter.
    pub fn limits_for_parameter(
        &self,
        electrical_connection_id: ElectricalConnectionId,
        parameter_id: ParameterId,
    ) -> Result<ParameterLimits> {
        let permitted = self.0.all::<PermittedValueSetData>()?;
        Ok(limits_for_parameter(
            &permitted,
            electrical_connection_id,
            parameter_id,
        )?)
    }

    /// Characteristics matching `filter`; fails when none match.
    pub fn characteristics_for_filter(
        &self,
        filter: &CharacteristicData,
    ) -> Result<Vec<CharacteristicData>> {
        let matched = search(&self.0.all::<CharacteristicData>()?, filter);
        if matched.is_empty() {
            return Err(FeatureError::NotAvailable);
        }
        Ok(matched)
    }
}

/// Heartbeat of a device diagnosis server.
pub struct DeviceDiagnosis<'a, A: FeatureDataAccessor + ?Sized>(FeatureQuery<'a, A>);

impl<'a, A: FeatureDataAccessor + ?Sized> DeviceDiagnosis<'a, A> {
    /// Query the diagnosis feature through `accessor`.
    pub fn new(accessor: &'a A) -> Self {
        Self(FeatureQuery::new(accessor))
    }

    /// Last heartbeat received.
    pub fn heartbeat(&self) -> Result<HeartbeatData> {
        match self
            .0
            .accessor
            .read_copy(FunctionType::DeviceDiagnosisHeartbeatData)?
        {
            Some(FunctionData::Heartbeat(heartbeat)) => Ok(heartbeat),
            Some(_) => Err(FeatureError::UnexpectedPayload(
                FunctionType::DeviceDiagnosisHeartbeatData,
            )),
            None => Err(FeatureError::NotAvailable),
        }
    }

    /// Ask for a fresh heartbeat.
    pub fn request_heartbeat(&self) -> Result<MsgCounter> {
        self.0
            .request(FunctionType::DeviceDiagnosisHeartbeatData, None)
    }
}
