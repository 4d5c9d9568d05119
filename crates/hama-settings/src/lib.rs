//! # hama-settings
//!
//! Configuration for the Hama client and server, loaded from three layers
//! (in priority order):
//! 1. **Compiled defaults**: [`HamaSettings::default()`]
//! 2. **User file**: `~/.hama/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `HAMA_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
