//! # Drop Rate Configuration
//!
//! User-facing settings for the drop chance pipeline.
//!
//! Settings can change while a run is in progress (the host exposes them in a
//! settings panel), so the engine never caches them: every computation reads a
//! fresh snapshot from a [`SharedConfig`] handle.
//!
//! ## File Format
//!
//! ```toml
//! drop_chance_multiplier = 1.0
//! base_drop_chance = 5.0
//! minimum_drop_chance = 1.0
//! enable_bad_luck_protection = true
//! enable_swarms_scaling = true
//! enable_player_scaling = true
//! ```
//!
//! Missing keys fall back to [`DropRateConfig::default`].

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{DropRateError, DropRateResult};

/// Drop chance settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DropRateConfig {
    /// Scalar applied to the player-aware base chance.
    pub drop_chance_multiplier: f32,
    /// Nominal drop chance in percent (0-100) before scaling.
    pub base_drop_chance: f32,
    /// Floor applied after player-count scaling, in percent.
    pub minimum_drop_chance: f32,
    /// Boost the chance once a player falls behind on drops.
    pub enable_bad_luck_protection: bool,
    /// Dampen the swarm artifact's enemy-count bonus.
    pub enable_swarms_scaling: bool,
    /// Divide the base chance between players.
    pub enable_player_scaling: bool,
}

impl Default for DropRateConfig {
    fn default() -> Self {
        Self {
            drop_chance_multiplier: 1.0,
            base_drop_chance: 5.0,
            minimum_drop_chance: 1.0,
            enable_bad_luck_protection: true,
            enable_swarms_scaling: true,
            enable_player_scaling: true,
        }
    }
}

impl DropRateConfig {
    /// Parses a configuration from TOML text and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`DropRateError::InvalidConfig`] if the text is not valid TOML
    /// or a value is out of range.
    pub fn from_toml_str(text: &str) -> DropRateResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| DropRateError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`DropRateError::Io`] if the file cannot be read, or
    /// [`DropRateError::InvalidConfig`] if its contents are invalid.
    pub fn from_toml_file(path: impl AsRef<Path>) -> DropRateResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks that every numeric setting is finite and in range.
    ///
    /// # Errors
    ///
    /// Returns [`DropRateError::InvalidConfig`] naming the first bad setting.
    pub fn validate(&self) -> DropRateResult<()> {
        if !self.drop_chance_multiplier.is_finite() || self.drop_chance_multiplier < 0.0 {
            return Err(DropRateError::InvalidConfig(format!(
                "drop_chance_multiplier must be a non-negative number, got {}",
                self.drop_chance_multiplier
            )));
        }
        check_percent("base_drop_chance", self.base_drop_chance)?;
        check_percent("minimum_drop_chance", self.minimum_drop_chance)?;
        Ok(())
    }
}

fn check_percent(name: &str, value: f32) -> DropRateResult<()> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(DropRateError::InvalidConfig(format!(
            "{name} must be a percentage between 0 and 100, got {value}"
        )))
    }
}

/// Live, shareable handle to the current configuration.
///
/// Cloning the handle shares the underlying settings; an update made through
/// any clone is visible to the next computation on every other clone.
#[derive(Clone, Debug, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<DropRateConfig>>,
}

impl SharedConfig {
    /// Wraps a configuration in a shareable handle.
    #[must_use]
    pub fn new(config: DropRateConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Returns a copy of the current settings.
    #[must_use]
    pub fn snapshot(&self) -> DropRateConfig {
        *self.inner.read()
    }

    /// Replaces the settings wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`DropRateError::InvalidConfig`] and leaves the current
    /// settings untouched if `config` does not validate.
    pub fn replace(&self, config: DropRateConfig) -> DropRateResult<()> {
        config.validate()?;
        *self.inner.write() = config;
        Ok(())
    }

    /// Edits the settings in place.
    ///
    /// The edit is applied to a copy and only committed if it validates.
    ///
    /// # Errors
    ///
    /// Returns [`DropRateError::InvalidConfig`] if the edited settings are
    /// invalid.
    pub fn update(&self, edit: impl FnOnce(&mut DropRateConfig)) -> DropRateResult<()> {
        let mut guard = self.inner.write();
        let mut candidate = *guard;
        edit(&mut candidate);
        candidate.validate()?;
        *guard = candidate;
        Ok(())
    }
}

impl From<DropRateConfig> for SharedConfig {
    fn from(config: DropRateConfig) -> Self {
        Self::new(config)
    }
}
