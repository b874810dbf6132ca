// src/core/mod.rs
//! Configuration and file system services shared by the server and the CLI

pub mod config_manager;
pub mod fs_ops;

pub use config_manager::{BrowserConfig, ConfigManager, EnvironmentConfig};
pub use fs_ops::FsOps;
