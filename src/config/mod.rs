//! Configuration management for the web client
//!
//! This module handles loading and managing configuration settings
//! for the library and the command-line front end.

pub mod loader;
pub mod settings;

pub use loader::ConfigLoader;
pub use settings::{
    CredentialSettings, DelaySettings, LimitSettings, LoggingSettings, PlatformSettings,
    SessionSettings, Settings, TransportSettings, UploadSettings,
};
