pub mod config_loader;
pub mod host;
pub mod launcher;
pub mod listeners;
pub mod log_tailer;
pub mod orchestrator;
pub mod prober;
pub mod state;
pub mod system;
