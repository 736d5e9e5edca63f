//! Typed settings sections persisted as a single TOML delta file.
//!
//! Every section is one struct implementing [`Settings`]. Defaults live in the
//! struct's `Default` impl; the file on disk only carries values that differ
//! from those defaults.

mod errors;
mod store;

pub use errors::SettingsError;
pub use store::{SettingsStore, SettingsStoreBuilder};

use serde::{Serialize, de::DeserializeOwned};

/// A section of the settings file.
pub trait Settings: Default + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Table name of this section inside the settings file.
    const SECTION: &'static str;

    fn name() -> &'static str {
        Self::SECTION
    }

    /// Checked on `register`, on `reload` and before every persisted `update`.
    fn validate(&self) -> Result<(), SettingsError> {
        Ok(())
    }
}
