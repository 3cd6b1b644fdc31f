//! ---
//! ems_section: "09-integration-interoperability"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Write approval, heartbeat resolution and power-limit use cases."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Pending write approvals keyed by correlation id.
//!
//! An entry moves `Unseen -> Pending -> Resolved` and is deleted on resolution.
//! The map lock is only held for the map operation itself: the responder runs
//! after the entry left the map, so a decision callback may re-enter the registry.
use std::collections::HashMap;
use std::sync::Arc;

use ems_link_features::MsgCounter;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::event::WriteMessage;
use crate::link::WriteResponder;
use crate::metrics::ApprovalMetrics;

/// What [`PendingApprovalRegistry::observe`] did with a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// New tracked write, now pending an application decision.
    Registered,
    /// The correlation id is already pending; nothing changed.
    Duplicate,
    /// The write does not need a decision; approve it without registering.
    AutoApprove,
}

/// Store of writes waiting for an application decision.
pub struct PendingApprovalRegistry {
    pending: Mutex<HashMap<MsgCounter, WriteMessage>>,
    responder: Arc<dyn WriteResponder>,
    metrics: Option<ApprovalMetrics>,
}

impl PendingApprovalRegistry {
    /// Registry answering decisions through `responder`.
    pub fn new(responder: Arc<dyn WriteResponder>) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            responder,
            metrics: None,
        }
    }

    /// Report pending counts and decisions to `metrics`.
    pub fn with_metrics(mut self, metrics: ApprovalMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Classify an inbound write.
    ///
    /// Writes that do not target a tracked record, or that carry no correlation
    /// id, never enter the registry.
    pub fn observe(&self, request: &WriteMessage, targets_tracked: bool) -> Observation {
        let Some(counter) = request.counter().filter(|_| targets_tracked) else {
            return Observation::AutoApprove;
        };

        let pending = {
            let mut pending = self.pending.lock();
            if pending.contains_key(&counter) {
                None
            } else {
                pending.insert(counter, request.clone());
                Some(pending.len())
            }
        };

        match pending {
            Some(len) => {
                if let Some(metrics) = &self.metrics {
                    metrics.set_pending(len);
                }
                info!(
                    counter = %counter,
                    device = %request.device,
                    "write awaiting approval"
                );
                Observation::Registered
            }
            None => {
                debug!(counter = %counter, "write already pending");
                Observation::Duplicate
            }
        }
    }

    /// Decide on a pending write. Returns `false` for an unknown correlation id,
    /// which is not an error.
    ///
    /// The responder is called exactly once per entry; its failures are logged
    /// and counted, not returned.
    pub fn resolve(&self, counter: MsgCounter, approve: bool, reason: &str) -> bool {
        let (request, remaining) = {
            let mut pending = self.pending.lock();
            let request = pending.remove(&counter);
            (request, pending.len())
        };
        let Some(request) = request else {
            debug!(counter = %counter, "no pending write for correlation id");
            return false;
        };
        if let Some(metrics) = &self.metrics {
            metrics.set_pending(remaining);
        }

        let outcome = if approve {
            self.responder.accept(&request)
        } else {
            self.responder.reject(&request, reason)
        };
        match outcome {
            Ok(()) => {
                info!(counter = %counter, approve, reason, "write decided");
                if let Some(metrics) = &self.metrics {
                    metrics.observe_decision(approve);
                }
            }
            Err(err) => {
                warn!(counter = %counter, approve, error = %err, "write decision not delivered");
                if let Some(metrics) = &self.metrics {
                    metrics.observe_failed();
                }
            }
        }
        true
    }

    /// Copy of every pending write.
    pub fn snapshot(&self) -> HashMap<MsgCounter, WriteMessage> {
        self.pending.lock().clone()
    }

    /// Number of pending writes.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// `true` when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Weak;

    use ems_link_features::{EntityType, FunctionRecord};
    use ems_link_model::LimitData;
    use prometheus::Registry;

    use super::*;
    use crate::event::{DeviceRef, EntityRef};
    use crate::link::EngineError;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Response {
        Accepted(Option<MsgCounter>),
        Rejected(Option<MsgCounter>, String),
    }

    #[derive(Default)]
    pub(crate) struct RecordingResponder {
        pub(crate) responses: Mutex<Vec<Response>>,
        pub(crate) fail: bool,
    }

    impl WriteResponder for RecordingResponder {
        fn accept(&self, request: &WriteMessage) -> Result<(), EngineError> {
            self.responses
                .lock()
                .push(Response::Accepted(request.counter()));
            if self.fail {
                return Err(EngineError("connection closed".into()));
            }
            Ok(())
        }

        fn reject(&self, request: &WriteMessage, reason: &str) -> Result<(), EngineError> {
            self.responses
                .lock()
                .push(Response::Rejected(request.counter(), reason.to_owned()));
            Ok(())
        }
    }

    pub(crate) fn write(counter: u64) -> WriteMessage {
        WriteMessage::new(
            EntityRef::new(
                DeviceRef::new("ski-grid", "d:_i:grid"),
                vec![1],
                EntityType::GridGuard,
            ),
            Some(MsgCounter(counter)),
            LimitData::wrap(vec![LimitData::default()]),
        )
    }

    fn registry() -> (Arc<RecordingResponder>, PendingApprovalRegistry) {
        let responder = Arc::new(RecordingResponder::default());
        let registry = PendingApprovalRegistry::new(responder.clone());
        (responder, registry)
    }

    #[test]
    fn observing_twice_keeps_one_entry() {
        let (_, registry) = registry();
        assert_eq!(registry.observe(&write(7), true), Observation::Registered);
        assert_eq!(registry.observe(&write(7), true), Observation::Duplicate);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn untracked_or_uncorrelated_writes_are_auto_approved() {
        let (_, registry) = registry();
        assert_eq!(registry.observe(&write(1), false), Observation::AutoApprove);
        let mut anonymous = write(2);
        anonymous.header.msg_counter = None;
        assert_eq!(registry.observe(&anonymous, true), Observation::AutoApprove);
        assert!(registry.is_empty());
    }

    #[test]
    fn resolved_entries_are_gone() {
        let (responder, registry) = registry();
        registry.observe(&write(500), true);
        registry.observe(&write(499), true);

        assert!(registry.resolve(MsgCounter(500), true, ""));
        assert!(registry.resolve(MsgCounter(499), false, "leave me alone"));
        assert!(!registry.resolve(MsgCounter(500), true, ""));
        assert!(registry.is_empty());
        assert_eq!(
            *responder.responses.lock(),
            vec![
                Response::Accepted(Some(MsgCounter(500))),
                Response::Rejected(Some(MsgCounter(499)), "leave me alone".into()),
            ]
        );
    }

    #[test]
    fn responder_failures_do_not_keep_entries() {
        let responder = Arc::new(RecordingResponder {
            fail: true,
            ..RecordingResponder::default()
        });
        let metrics = ApprovalMetrics::register(&Registry::new()).expect("metrics");
        let registry = PendingApprovalRegistry::new(responder.clone()).with_metrics(metrics);
        registry.observe(&write(3), true);
        assert!(registry.resolve(MsgCounter(3), true, ""));
        assert!(registry.is_empty());
        assert_eq!(responder.responses.lock().len(), 1);
    }

    struct ReentrantResponder {
        registry: Mutex<Weak<PendingApprovalRegistry>>,
        inner: RecordingResponder,
    }

    impl WriteResponder for ReentrantResponder {
        fn accept(&self, request: &WriteMessage) -> Result<(), EngineError> {
            if let Some(registry) = self.registry.lock().upgrade() {
                // The entry is already gone and the lock released.
                assert!(!registry.resolve(MsgCounter(10), true, ""));
                assert_eq!(registry.len(), 1);
            }
            self.inner.accept(request)
        }

        fn reject(&self, request: &WriteMessage, reason: &str) -> Result<(), EngineError> {
            self.inner.reject(request, reason)
        }
    }

    #[test]
    fn responder_may_reenter_the_registry() {
        let responder = Arc::new(ReentrantResponder {
            registry: Mutex::new(Weak::new()),
            inner: RecordingResponder::default(),
        });
        let registry = Arc::new(PendingApprovalRegistry::new(responder.clone()));
        *responder.registry.lock() = Arc::downgrade(&registry);

        registry.observe(&write(10), true);
        registry.observe(&write(11), true);
        assert!(registry.resolve(MsgCounter(10), true, ""));
        assert_eq!(registry.len(), 1);
        assert_eq!(responder.inner.responses.lock().len(), 1);
    }
}
