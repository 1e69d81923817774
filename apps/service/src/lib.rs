pub mod cli;
pub mod clock;
pub mod config;
pub mod logs;
pub mod monitoring;
pub mod notifications;
pub mod orchestrator;
pub mod store;
