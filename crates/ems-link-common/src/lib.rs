//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared configuration and logging for the middleware."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Shared primitives for the ems-link workspace: configuration loading and
//! tracing initialisation used by hosts embedding the use cases.

pub mod config;
pub mod logging;

pub use config::{
    ApprovalConfig, HeartbeatConfig, LimitDirection, LimitsConfig, LinkConfig, LoadedLinkConfig,
    LoggingConfig,
};
pub use logging::{init_tracing, LogFormat};
