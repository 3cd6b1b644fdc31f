//! ---
//! ems_section: "09-integration-interoperability"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Write approval, heartbeat resolution and power-limit use cases."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use prometheus::{IntCounter, IntGauge, Opts, Registry};

/// Prometheus handles for the write approval workflow.
#[derive(Clone)]
pub struct ApprovalMetrics {
    pending: IntGauge,
    approved: IntCounter,
    denied: IntCounter,
    auto_approved: IntCounter,
    failed: IntCounter,
    dispatch_rejected: IntCounter,
}

impl ApprovalMetrics {
    /// Register the approval metrics with `registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let pending = IntGauge::with_opts(Opts::new(
            "ems_link_pending_approvals",
            "Writes waiting for an application decision",
        ))?;
        let approved = IntCounter::with_opts(Opts::new(
            "ems_link_writes_approved_total",
            "Pending writes approved by the application",
        ))?;
        let denied = IntCounter::with_opts(Opts::new(
            "ems_link_writes_denied_total",
            "Pending writes denied by the application",
        ))?;
        let auto_approved = IntCounter::with_opts(Opts::new(
            "ems_link_writes_auto_approved_total",
            "Untracked writes approved by the dispatcher",
        ))?;
        let failed = IntCounter::with_opts(Opts::new(
            "ems_link_write_responses_failed_total",
            "Accept or reject calls the protocol engine refused",
        ))?;
        let dispatch_rejected = IntCounter::with_opts(Opts::new(
            "ems_link_dispatch_rejected_total",
            "Automatic approvals dropped because the queue was full or closed",
        ))?;

        registry.register(Box::new(pending.clone()))?;
        registry.register(Box::new(approved.clone()))?;
        registry.register(Box::new(denied.clone()))?;
        registry.register(Box::new(auto_approved.clone()))?;
        registry.register(Box::new(failed.clone()))?;
        registry.register(Box::new(dispatch_rejected.clone()))?;

        Ok(Self {
            pending,
            approved,
            denied,
            auto_approved,
            failed,
            dispatch_rejected,
        })
    }

    pub(crate) fn set_pending(&self, pending: usize) {
        self.pending.set(pending as i64);
    }

    pub(crate) fn observe_decision(&self, approved: bool) {
        if approved {
            self.approved.inc();
        } else {
            self.denied.inc();
        }
    }

    pub(crate) fn observe_auto_approved(&self) {
        self.auto_approved.inc();
    }

    pub(crate) fn observe_failed(&self) {
        self.failed.inc();
    }

    pub(crate) fn observe_dispatch_rejected(&self) {
        self.dispatch_rejected.inc();
    }
}
