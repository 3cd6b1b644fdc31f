//! ---
//! ems_section: "09-integration-interoperability"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Write approval, heartbeat resolution and power-limit use cases."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Controllable system side of power limitation (consumption or production).
//!
//! The use case owns three local server features: the active power limit
//! (load control), the failsafe values (device configuration) and the
//! contractual nominal maximum (electrical connection). Remote writes to the
//! limit need an application decision; every other write is accepted by the
//! approval dispatcher.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ems_link_common::{HeartbeatConfig, LimitDirection};
use ems_link_features::{
    DeviceConfiguration, ElectricalConnection, EntityType, FeatureError, FeatureQuery,
    FeatureType, FunctionData, FunctionType, LoadControl, LocalFeatureStore, MsgCounter,
    Operations, PartialUpdatePlanner,
};
use ems_link_model::{
    single_description, CharacteristicContext, CharacteristicData, CharacteristicType,
    ElectricalConnectionDescription, EnergyDirection, HeartbeatData, KeyId, KeyName, KeyValue,
    KeyValueData, KeyValueDescription, KeyValueType, LimitCategory, LimitData, LimitDataElements,
    LimitDescription, LimitId, LimitType, ParameterDescription, PowerSupplyType, ScaledNumber,
    ScopeType, TimePeriod, UnitOfMeasurement, XsDuration,
};
use tracing::{debug, info};

use crate::approval::{Observation, PendingApprovalRegistry};
use crate::dispatcher::ApprovalDispatcher;
use crate::event::{ChangeType, EventCallback, EventPayload, EventType, UseCaseEvent, WriteMessage};
use crate::heartbeat::{HeartbeatBindingResolver, HeartbeatMonitor};
use crate::link::{DeviceLink, WriteResponder};
use crate::metrics::ApprovalMetrics;
use crate::Result;

/// Entity types allowed to control the limit and provide the heartbeat.
const CONTROLLING_ENTITIES: [EntityType; 2] = [EntityType::Cem, EntityType::GridGuard];

/// Active power limit as seen by the application.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoadLimit {
    /// Remaining validity; zero when the limit has no end.
    pub duration: Duration,
    /// Whether the controlling side may change the limit.
    pub is_changeable: bool,
    /// Whether the limit is enforced.
    pub is_active: bool,
    /// Limit in watts.
    pub value: f64,
    /// Clear a previously set duration when writing.
    pub delete_duration: bool,
}

/// A configured value and whether the controlling side may change it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfiguredValue<T> {
    /// The value.
    pub value: T,
    /// Whether the controlling side may change it.
    pub is_changeable: bool,
}

/// Engine handles and application hooks injected into a use case.
pub struct UseCaseWiring {
    /// Answers pending writes.
    pub responder: Arc<dyn WriteResponder>,
    /// Access to remote devices.
    pub link: Arc<dyn DeviceLink>,
    /// Worker pool for automatic approvals.
    pub dispatcher: Arc<ApprovalDispatcher>,
    /// Receives [`UseCaseEvent`]s.
    pub callback: EventCallback,
    /// Optional approval metrics.
    pub metrics: Option<ApprovalMetrics>,
}

/// Power limitation of a controllable system.
pub struct PowerLimitUseCase {
    direction: LimitDirection,
    load_control: Arc<LocalFeatureStore>,
    configuration: Arc<LocalFeatureStore>,
    electrical_connection: Arc<LocalFeatureStore>,
    registry: PendingApprovalRegistry,
    dispatcher: Arc<ApprovalDispatcher>,
    resolver: HeartbeatBindingResolver,
    monitor: HeartbeatMonitor,
    callback: EventCallback,
}

impl PowerLimitUseCase {
    /// Use case limiting `direction`, judging heartbeats against `heartbeat.window`.
    pub fn new(
        direction: LimitDirection,
        heartbeat: &HeartbeatConfig,
        wiring: UseCaseWiring,
    ) -> Self {
        let mut registry = PendingApprovalRegistry::new(wiring.responder);
        if let Some(metrics) = wiring.metrics {
            registry = registry.with_metrics(metrics);
        }
        Self {
            direction,
            load_control: Arc::new(LocalFeatureStore::new(FeatureType::LoadControl)),
            configuration: Arc::new(LocalFeatureStore::new(FeatureType::DeviceConfiguration)),
            electrical_connection: Arc::new(LocalFeatureStore::new(
                FeatureType::ElectricalConnection,
            )),
            registry,
            dispatcher: wiring.dispatcher,
            resolver: HeartbeatBindingResolver::new(
                wiring.link,
                CONTROLLING_ENTITIES.to_vec(),
                FeatureType::LoadControl,
            ),
            monitor: HeartbeatMonitor::new(heartbeat.window),
            callback: wiring.callback,
        }
    }

    /// Direction this use case limits.
    pub fn direction(&self) -> LimitDirection {
        self.direction
    }

    /// Local load control server feature.
    pub fn load_control_store(&self) -> &Arc<LocalFeatureStore> {
        &self.load_control
    }

    /// Local device configuration server feature.
    pub fn configuration_store(&self) -> &Arc<LocalFeatureStore> {
        &self.configuration
    }

    /// Local electrical connection server feature.
    pub fn electrical_connection_store(&self) -> &Arc<LocalFeatureStore> {
        &self.electrical_connection
    }

    /// Create the descriptions this use case publishes. Calling it again adds nothing.
    pub fn setup(&self) -> Result<()> {
        self.load_control
            .set_operations(FunctionType::LoadControlLimitListData, Operations::full());
        self.configuration.set_operations(
            FunctionType::DeviceConfigurationKeyValueListData,
            Operations::full(),
        );

        let limits = LoadControl::new(&*self.load_control);
        if is_absent(limits.limit_descriptions_for_filter(&self.limit_filter()))? {
            let limit_id = self.load_control.add_description(LimitDescription {
                unit: Some(UnitOfMeasurement::Watt),
                ..self.limit_filter()
            })?;
            self.load_control.update_by_id(
                limit_id,
                LimitData {
                    is_limit_changeable: Some(true),
                    is_limit_active: Some(false),
                    value: Some(ScaledNumber::from_f64(0.0)),
                    ..LimitData::default()
                },
                None,
            )?;
        }

        let configuration = DeviceConfiguration::new(&*self.configuration);
        let keys = [
            (
                self.failsafe_limit_filter(),
                KeyValueType::ScaledNumber,
                Some(UnitOfMeasurement::Watt),
            ),
            (failsafe_duration_filter(), KeyValueType::Duration, None),
        ];
        for (filter, value_type, unit) in keys {
            if is_absent(configuration.key_value_descriptions_for_filter(&filter))? {
                self.configuration.add_description(KeyValueDescription {
                    value_type: Some(value_type),
                    unit,
                    ..filter
                })?;
            }
        }

        let electrical = ElectricalConnection::new(&*self.electrical_connection);
        if is_absent(electrical.characteristics_for_filter(&self.nominal_max_filter()))? {
            let connection_id =
                self.electrical_connection
                    .add_description(ElectricalConnectionDescription {
                        power_supply_type: Some(PowerSupplyType::Ac),
                        positive_energy_direction: Some(EnergyDirection::Consume),
                        ..ElectricalConnectionDescription::default()
                    })?;
            let parameter_id = self.electrical_connection.add_description(ParameterDescription {
                electrical_connection_id: Some(connection_id),
                scope_type: Some(ScopeType::AcPowerTotal),
                ..ParameterDescription::default()
            })?;
            self.electrical_connection.add_characteristic(CharacteristicData {
                electrical_connection_id: Some(connection_id),
                parameter_id: Some(parameter_id),
                unit: Some(UnitOfMeasurement::Watt),
                ..self.nominal_max_filter()
            })?;
        }

        info!(direction = %self.direction, "power limit use case set up");
        Ok(())
    }

    /// Current active power limit.
    pub fn limit(&self) -> Result<LoadLimit> {
        let data = LoadControl::new(&*self.load_control)
            .single_limit_data_for_filter(&self.limit_filter())?;
        Ok(decode_limit(&data))
    }

    /// Change the active power limit locally.
    pub fn set_limit(&self, limit: LoadLimit) -> Result<()> {
        let data = LimitData {
            limit_id: None,
            is_limit_changeable: Some(limit.is_changeable),
            is_limit_active: Some(limit.is_active),
            time_period: (!limit.duration.is_zero())
                .then(|| TimePeriod::ending_after(limit.duration)),
            value: Some(ScaledNumber::from_f64(limit.value)),
        };
        let delete = limit.delete_duration.then(|| LimitDataElements {
            time_period: true,
            ..LimitDataElements::default()
        });
        PartialUpdatePlanner::new(&*self.load_control).write_for_filter(
            &self.limit_filter(),
            data,
            delete,
        )?;
        Ok(())
    }

    /// Limits proposed by writes awaiting a decision, by correlation id.
    ///
    /// Pending writes that do not carry this use case's limit are left out.
    pub fn pending_limits(&self) -> Result<HashMap<MsgCounter, LoadLimit>> {
        let limit_id = self.limit_id()?;
        let pending = self
            .registry
            .snapshot()
            .into_iter()
            .filter_map(|(counter, message)| {
                let FunctionData::Limits(items) = &message.data else {
                    return None;
                };
                items
                    .iter()
                    .find(|item| item.limit_id == Some(limit_id))
                    .map(|item| (counter, decode_limit(item)))
            })
            .collect();
        Ok(pending)
    }

    /// Approve or deny the pending write `counter`. Returns `false` when no such
    /// write is pending.
    pub fn approve_or_deny_limit(&self, counter: MsgCounter, approve: bool, reason: &str) -> bool {
        self.registry.resolve(counter, approve, reason)
    }

    /// Failsafe active power limit in watts.
    pub fn failsafe_active_power_limit(&self) -> Result<ConfiguredValue<f64>> {
        let data = self.key_value(&self.failsafe_limit_filter())?;
        let value = data
            .value
            .scaled_number
            .ok_or(FeatureError::NotAvailable)?;
        Ok(ConfiguredValue {
            value: value.value(),
            is_changeable: data.is_value_changeable.unwrap_or(false),
        })
    }

    /// Change the failsafe active power limit.
    pub fn set_failsafe_active_power_limit(&self, value: f64, is_changeable: bool) -> Result<()> {
        self.write_key_value(
            &self.failsafe_limit_filter(),
            KeyValue {
                scaled_number: Some(ScaledNumber::from_f64(value)),
                ..KeyValue::default()
            },
            is_changeable,
        )
    }

    /// Minimum time the failsafe limit stays in effect.
    pub fn failsafe_duration_minimum(&self) -> Result<ConfiguredValue<Duration>> {
        let data = self.key_value(&failsafe_duration_filter())?;
        let duration = data
            .value
            .duration
            .as_ref()
            .ok_or(FeatureError::NotAvailable)?
            .to_std()?;
        Ok(ConfiguredValue {
            value: duration,
            is_changeable: data.is_value_changeable.unwrap_or(false),
        })
    }

    /// Change the failsafe minimum duration.
    pub fn set_failsafe_duration_minimum(
        &self,
        duration: Duration,
        is_changeable: bool,
    ) -> Result<()> {
        self.write_key_value(
            &failsafe_duration_filter(),
            KeyValue {
                duration: Some(XsDuration::from_std(duration)),
                ..KeyValue::default()
            },
            is_changeable,
        )
    }

    /// Contractual nominal maximum in watts.
    pub fn contractual_nominal_max(&self) -> Result<f64> {
        let characteristics = ElectricalConnection::new(&*self.electrical_connection)
            .characteristics_for_filter(&self.nominal_max_filter())?;
        let value = characteristics
            .first()
            .and_then(|characteristic| characteristic.value)
            .ok_or(FeatureError::NotAvailable)?;
        Ok(value.value())
    }

    /// Change the contractual nominal maximum.
    pub fn set_contractual_nominal_max(&self, value: f64) -> Result<()> {
        let characteristics = ElectricalConnection::new(&*self.electrical_connection)
            .characteristics_for_filter(&self.nominal_max_filter())?;
        let id = characteristics
            .first()
            .and_then(|characteristic| characteristic.characteristic_id)
            .ok_or(FeatureError::NotAvailable)?;
        self.electrical_connection.update_by_id(
            id,
            CharacteristicData {
                value: Some(ScaledNumber::from_f64(value)),
                ..CharacteristicData::default()
            },
            None,
        )?;
        Ok(())
    }

    /// `true` when the authoritative entity sent a heartbeat within the window.
    pub fn is_heartbeat_within_duration(&self) -> bool {
        self.monitor.is_alive(Instant::now())
    }

    /// Route an inbound write against a local feature.
    ///
    /// A write carrying this use case's limit is held for an application
    /// decision and announced with [`UseCaseEvent::WriteApprovalRequired`];
    /// anything else is handed to the approval dispatcher.
    pub fn handle_write(&self, message: WriteMessage) -> Observation {
        let targets_tracked = match (&message.data, self.limit_id()) {
            (FunctionData::Limits(items), Ok(limit_id)) => {
                items.iter().any(|item| item.limit_id == Some(limit_id))
            }
            _ => false,
        };

        let observation = self.registry.observe(&message, targets_tracked);
        match observation {
            Observation::Registered => (self.callback)(
                &message.device.ski,
                Some(&message.device),
                Some(&message.entity),
                UseCaseEvent::WriteApprovalRequired,
            ),
            Observation::Duplicate => {}
            Observation::AutoApprove => {
                // Failures are logged and counted by the dispatcher.
                let _ = self.dispatcher.submit(message);
            }
        }
        observation
    }

    /// React to a change notification from the engine.
    pub fn handle_event(&self, payload: &EventPayload) {
        match (payload.event_type, payload.change_type) {
            (EventType::DeviceChange, ChangeType::Add) => {
                if let Some(device) = &payload.device {
                    self.resolver.device_connected(device);
                }
            }
            (EventType::DeviceChange, ChangeType::Remove) => {
                if let Some(device) = &payload.device {
                    if self.resolver.authoritative_entity(device).is_some() {
                        self.monitor.reset();
                    }
                    self.resolver.device_disconnected(device);
                }
            }
            (EventType::BindingChange, ChangeType::Add) => {
                if let (Some(entity), Some(local_feature)) =
                    (&payload.entity, &payload.local_feature)
                {
                    self.resolver.binding_added(entity, local_feature);
                }
            }
            (EventType::DataChange, ChangeType::Add | ChangeType::Update) => {
                if payload.local_feature.is_some() {
                    self.local_data_changed(payload);
                } else {
                    self.remote_data_changed(payload);
                }
            }
            _ => {}
        }
    }

    fn local_data_changed(&self, payload: &EventPayload) {
        match payload.function {
            Some(FunctionType::LoadControlLimitListData) => {
                let touches_limit = match (&payload.data, self.limit_id()) {
                    (Some(FunctionData::Limits(items)), Ok(limit_id)) => {
                        items.iter().any(|item| item.limit_id == Some(limit_id))
                    }
                    (None, _) => true,
                    _ => false,
                };
                if touches_limit {
                    self.emit(payload, UseCaseEvent::DataUpdateLimit);
                }
            }
            Some(FunctionType::DeviceConfigurationKeyValueListData) => {
                let changed: Option<Vec<KeyId>> = match &payload.data {
                    Some(FunctionData::KeyValues(items)) => {
                        Some(items.iter().filter_map(|item| item.key_id).collect())
                    }
                    _ => None,
                };
                let watched = [
                    (self.failsafe_limit_filter(), UseCaseEvent::DataUpdateFailsafePowerLimit),
                    (failsafe_duration_filter(), UseCaseEvent::DataUpdateFailsafeDurationMinimum),
                ];
                for (filter, event) in watched {
                    let Ok(key_id) = self.key_id(&filter) else {
                        continue;
                    };
                    if changed.as_ref().map_or(true, |keys| keys.contains(&key_id)) {
                        self.emit(payload, event);
                    }
                }
            }
            _ => {}
        }
    }

    fn remote_data_changed(&self, payload: &EventPayload) {
        if payload.function != Some(FunctionType::DeviceDiagnosisHeartbeatData) {
            return;
        }
        let (Some(device), Some(entity)) = (&payload.device, &payload.entity) else {
            return;
        };
        if self.resolver.authoritative_entity(device).as_ref() != Some(entity) {
            debug!(entity = %entity, "heartbeat from non-authoritative entity ignored");
            return;
        }
        let heartbeat = match &payload.data {
            Some(FunctionData::Heartbeat(heartbeat)) => heartbeat.clone(),
            _ => HeartbeatData::default(),
        };
        self.monitor.record(heartbeat, Instant::now());
        self.emit(payload, UseCaseEvent::DataUpdateHeartbeat);
    }

    fn emit(&self, payload: &EventPayload, event: UseCaseEvent) {
        debug!(ski = %payload.ski, event = %event, "raising use case event");
        (self.callback)(&payload.ski, payload.device.as_ref(), payload.entity.as_ref(), event);
    }

    fn energy_direction(&self) -> EnergyDirection {
        match self.direction {
            LimitDirection::Consumption => EnergyDirection::Consume,
            LimitDirection::Production => EnergyDirection::Produce,
        }
    }

    fn limit_filter(&self) -> LimitDescription {
        LimitDescription {
            limit_type: Some(LimitType::SignDependentAbsValueLimit),
            limit_category: Some(LimitCategory::Obligation),
            limit_direction: Some(self.energy_direction()),
            scope_type: Some(ScopeType::ActivePowerLimit),
            ..LimitDescription::default()
        }
    }

    fn failsafe_limit_filter(&self) -> KeyValueDescription {
        let key_name = match self.direction {
            LimitDirection::Consumption => KeyName::FailsafeConsumptionActivePowerLimit,
            LimitDirection::Production => KeyName::FailsafeProductionActivePowerLimit,
        };
        KeyValueDescription {
            key_name: Some(key_name),
            ..KeyValueDescription::default()
        }
    }

    fn nominal_max_filter(&self) -> CharacteristicData {
        let characteristic_type = match self.direction {
            LimitDirection::Consumption => CharacteristicType::ContractualConsumptionNominalMax,
            LimitDirection::Production => CharacteristicType::ContractualProductionNominalMax,
        };
        CharacteristicData {
            characteristic_context: Some(CharacteristicContext::Entity),
            characteristic_type: Some(characteristic_type),
            ..CharacteristicData::default()
        }
    }

    fn limit_id(&self) -> Result<LimitId> {
        let descriptions = FeatureQuery::new(&*self.load_control).all::<LimitDescription>()?;
        let description = single_description(&descriptions, &self.limit_filter())
            .map_err(FeatureError::from)?;
        Ok(description.limit_id.ok_or(FeatureError::NotAvailable)?)
    }

    fn key_id(&self, filter: &KeyValueDescription) -> Result<KeyId> {
        let descriptions = FeatureQuery::new(&*self.configuration).all::<KeyValueDescription>()?;
        let description = single_description(&descriptions, filter).map_err(FeatureError::from)?;
        Ok(description.key_id.ok_or(FeatureError::NotAvailable)?)
    }

    fn key_value(&self, filter: &KeyValueDescription) -> Result<KeyValueData> {
        Ok(DeviceConfiguration::new(&*self.configuration).key_value_data_for_filter(filter)?)
    }

    fn write_key_value(
        &self,
        filter: &KeyValueDescription,
        value: KeyValue,
        is_changeable: bool,
    ) -> Result<()> {
        PartialUpdatePlanner::new(&*self.configuration).write_for_filter(
            filter,
            KeyValueData {
                key_id: None,
                value,
                is_value_changeable: Some(is_changeable),
            },
            None,
        )?;
        Ok(())
    }
}

fn failsafe_duration_filter() -> KeyValueDescription {
    KeyValueDescription {
        key_name: Some(KeyName::FailsafeDurationMinimum),
        ..KeyValueDescription::default()
    }
}

/// Decode a limit record; a missing or malformed duration reads as zero.
fn decode_limit(data: &LimitData) -> LoadLimit {
    LoadLimit {
        duration: data
            .time_period
            .as_ref()
            .and_then(|period| period.duration().ok())
            .unwrap_or_default(),
        is_changeable: data.is_limit_changeable.unwrap_or(false),
        is_active: data.is_limit_active.unwrap_or(false),
        value: data.value.map(|value| value.value()).unwrap_or_default(),
        delete_duration: false,
    }
}

fn is_absent<T>(found: ems_link_features::Result<Vec<T>>) -> Result<bool> {
    match found {
        Ok(items) => Ok(items.is_empty()),
        Err(FeatureError::NotAvailable) => Ok(true),
        Err(err) => Err(err.into()),
    }
}
