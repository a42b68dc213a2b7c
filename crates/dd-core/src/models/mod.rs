pub mod config;
pub mod event;
pub mod report;
pub mod service;

pub use config::{LauncherConfig, ProbeMethod, ProbeSettings};
pub use event::LaunchEvent;
pub use report::{Endpoint, RunReport};
pub use service::{ServiceOutcome, ServiceSpec, ServiceStatus};
