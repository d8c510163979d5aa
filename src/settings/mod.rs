//! Read-only boundary to the external settings service

mod resolver;

pub use resolver::{HttpSettingsStore, SettingsError, SettingsStore};
