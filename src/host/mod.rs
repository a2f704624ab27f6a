//! Host side: launching plugins and routing calls to them

pub mod config;
pub mod manager;
pub mod plugin;

pub use config::{resolve_env_var, HostConfig, PluginEntry};
pub use manager::{HostClient, PluginManager};
pub use plugin::{PluginInfo, PluginState};
