/// Progress notifications emitted while a batch runs.
///
/// The console front end turns these into tagged lines and progress dots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchEvent {
    SystemServiceStarted {
        name: String,
    },
    SystemServiceFailed {
        name: String,
        error: String,
    },
    ServiceStarting {
        name: String,
        port: u16,
    },
    /// Start artifact missing; the service is treated as disabled.
    ServiceSkipped {
        name: String,
        artifact: String,
    },
    LaunchFailed {
        name: String,
        exit_code: Option<i32>,
    },
    /// One poll of the service port.
    ProbeAttempt {
        name: String,
        port: u16,
        attempt: u32,
        max_attempts: u32,
    },
    ServiceReady {
        name: String,
        port: u16,
        attempts: u32,
    },
    ServiceUnreachable {
        name: String,
        port: u16,
        attempts: u32,
    },
    ServiceCancelled {
        name: String,
    },
}
