pub mod api;
pub mod cache;
pub mod config;
pub mod health;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod service;

pub use config::Config;
pub use health::{Health, Snapshot};
pub use service::StatusService;
