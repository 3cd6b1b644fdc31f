//! ---
//! ems_section: "15-testing-qa-runbook"
//! ems_subsection: "integration-tests"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Integration and validation tests for the ems-link stack."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use ems_link_common::{LimitDirection, LinkConfig};
use ems_link_features::{
    DeviceConfiguration, ElectricalConnection, EntityType, FeatureDataAccessor, FeatureType,
    FunctionData, FunctionRecord, FunctionType, LoadControl, LocalFeatureStore, MsgCounter, Role,
};
use ems_link_model::{
    CharacteristicData, CharacteristicType, EnergyDirection, HeartbeatData, KeyName,
    KeyValueDescription, LimitData, LimitDescription, ScaledNumber, TimePeriod,
};
use ems_link_usecases::{
    ApprovalDispatcher, ChangeType, DeviceLink, DeviceRef, EngineError, EntityRef, EventPayload,
    EventType, FeatureRef, Observation, PowerLimitUseCase, RemoteEntity, UseCaseEvent,
    UseCaseWiring, WriteMessage, WriteResponder,
};
use parking_lot::Mutex;
use tempfile::tempdir;

/// Engine double that applies accepted writes to the local load control feature.
#[derive(Default)]
struct Engine {
    target: Mutex<Option<Arc<LocalFeatureStore>>>,
    entities: Mutex<Vec<RemoteEntity>>,
    accepted: Mutex<Vec<Option<MsgCounter>>>,
}

impl WriteResponder for Engine {
    fn accept(&self, request: &WriteMessage) -> Result<(), EngineError> {
        if let Some(store) = self.target.lock().clone() {
            store
                .write(request.data.function(), request.data.clone(), true, None)
                .map_err(|err| EngineError(err.to_string()))?;
        }
        self.accepted.lock().push(request.counter());
        Ok(())
    }

    fn reject(&self, _request: &WriteMessage, _reason: &str) -> Result<(), EngineError> {
        Ok(())
    }
}

impl DeviceLink for Engine {
    fn entities(&self, device: &DeviceRef) -> Vec<RemoteEntity> {
        self.entities
            .lock()
            .iter()
            .filter(|remote| &remote.entity.device == device)
            .cloned()
            .collect()
    }

    fn subscribe(
        &self,
        _entity: &EntityRef,
        _feature: FeatureType,
    ) -> Result<MsgCounter, EngineError> {
        Ok(MsgCounter(1))
    }

    fn request(
        &self,
        _entity: &EntityRef,
        _function: FunctionType,
    ) -> Result<MsgCounter, EngineError> {
        Ok(MsgCounter(2))
    }
}

struct Stack {
    engine: Arc<Engine>,
    usecase: PowerLimitUseCase,
    dispatcher: Arc<ApprovalDispatcher>,
    events: Arc<Mutex<Vec<UseCaseEvent>>>,
}

fn stack(config: &LinkConfig) -> Stack {
    let engine = Arc::new(Engine::default());
    let dispatcher = Arc::new(ApprovalDispatcher::start(
        &config.approval,
        engine.clone(),
        None,
    ));
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let usecase = PowerLimitUseCase::new(
        config.limits.direction,
        &config.heartbeat,
        UseCaseWiring {
            responder: engine.clone(),
            link: engine.clone(),
            dispatcher: dispatcher.clone(),
            callback: Arc::new(move |_ski, _device, _entity, event| sink.lock().push(event)),
            metrics: None,
        },
    );
    usecase.setup().expect("setup");
    *engine.target.lock() = Some(usecase.load_control_store().clone());
    Stack {
        engine,
        usecase,
        dispatcher,
        events,
    }
}

fn energy_guard() -> EntityRef {
    EntityRef::new(
        DeviceRef::new("ski-eg", "d:_i:eg"),
        vec![1],
        EntityType::GridGuard,
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn configuration_selects_the_controlled_direction() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("ems-link.toml");
    fs::write(
        &path,
        concat!(
            "[limits]\ndirection = \"production\"\n\n",
            "[heartbeat]\nwindow = 30\n\n",
            "[approval]\nworkers = 1\nqueue_depth = 4\n",
        ),
    )
    .expect("write config");
    let config = LinkConfig::from_path(&path).expect("config");
    assert_eq!(config.limits.direction, LimitDirection::Production);
    assert_eq!(config.heartbeat.window, Duration::from_secs(30));

    let stack = stack(&config);
    let limits = LoadControl::new(&**stack.usecase.load_control_store())
        .limit_descriptions_for_filter(&LimitDescription {
            limit_direction: Some(EnergyDirection::Produce),
            ..LimitDescription::default()
        })
        .expect("limit descriptions");
    assert_eq!(limits.len(), 1);

    let keys = DeviceConfiguration::new(&**stack.usecase.configuration_store())
        .key_value_descriptions_for_filter(&KeyValueDescription {
            key_name: Some(KeyName::FailsafeProductionActivePowerLimit),
            ..KeyValueDescription::default()
        })
        .expect("key descriptions");
    assert_eq!(keys.len(), 1);

    let characteristics = ElectricalConnection::new(&**stack.usecase.electrical_connection_store())
        .characteristics_for_filter(&CharacteristicData {
            characteristic_type: Some(CharacteristicType::ContractualProductionNominalMax),
            ..CharacteristicData::default()
        })
        .expect("characteristics");
    assert_eq!(characteristics.len(), 1);

    stack.dispatcher.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn approved_write_is_applied_and_announced() {
    let stack = stack(&LinkConfig::default());
    let limit_id = LoadControl::new(&**stack.usecase.load_control_store())
        .limit_descriptions_for_filter(&LimitDescription::default())
        .expect("descriptions")[0]
        .limit_id
        .expect("limit id");

    let proposal = LimitData::wrap(vec![LimitData {
        limit_id: Some(limit_id),
        is_limit_active: Some(true),
        time_period: Some(TimePeriod::ending_after(Duration::from_secs(3600))),
        value: Some(ScaledNumber::from_f64(4_200.0)),
        ..LimitData::default()
    }]);
    let write = WriteMessage::new(energy_guard(), Some(MsgCounter(500)), proposal.clone());
    assert_eq!(stack.usecase.handle_write(write), Observation::Registered);
    assert!(!stack.usecase.limit().expect("limit").is_active);

    assert!(stack.usecase.approve_or_deny_limit(MsgCounter(500), true, ""));
    assert_eq!(*stack.engine.accepted.lock(), vec![Some(MsgCounter(500))]);

    // The engine reports the applied write as a local data change.
    stack.usecase.handle_event(
        &EventPayload::new("ski-eg", EventType::DataChange, ChangeType::Update)
            .with_entity(energy_guard())
            .with_local_feature(FeatureRef {
                entity: energy_guard(),
                feature_type: FeatureType::LoadControl,
                role: Role::Server,
            })
            .with_data(proposal),
    );

    let limit = stack.usecase.limit().expect("limit");
    assert!(limit.is_active);
    assert!(limit.is_changeable);
    assert_eq!(limit.value, 4_200.0);
    assert_eq!(limit.duration, Duration::from_secs(3600));
    assert_eq!(
        *stack.events.lock(),
        vec![UseCaseEvent::WriteApprovalRequired, UseCaseEvent::DataUpdateLimit]
    );

    stack.dispatcher.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn heartbeat_goes_stale_after_the_configured_window() {
    let config: LinkConfig = "[heartbeat]\nwindow = 1\n".parse().expect("config");
    let stack = stack(&config);
    let device = DeviceRef::new("ski-cem", "d:_i:cem");
    let cem = EntityRef::new(device.clone(), vec![1], EntityType::Cem);
    *stack.engine.entities.lock() = vec![RemoteEntity {
        entity: cem.clone(),
        features: vec![(FeatureType::DeviceDiagnosis, Role::Server)],
    }];

    stack.usecase.handle_event(
        &EventPayload::new("ski-cem", EventType::DeviceChange, ChangeType::Add)
            .with_device(device),
    );
    stack.usecase.handle_event(
        &EventPayload::new("ski-cem", EventType::DataChange, ChangeType::Update)
            .with_entity(cem)
            .with_data(FunctionData::Heartbeat(HeartbeatData::default())),
    );
    assert!(stack.usecase.is_heartbeat_within_duration());

    tokio::time::sleep(Duration::from_millis(1_200)).await;
    assert!(!stack.usecase.is_heartbeat_within_duration());

    stack.dispatcher.shutdown().await;
}
