use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::error::ConfigError;
use crate::policy::EligibilityRequirement;
use crate::policy::RequirementConfig;

/// Configuration for the whole rating gate, usually read from a TOML file.
///
/// ```toml
/// native_prompt_min_stars = 4
/// store_path = "rating-counters.json"
///
/// [requirement]
/// max_prompts_per_year = 3
/// cooldown_days = 30
/// yearly_reset = "calendar_year"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub requirement: RequirementConfig,
    /// Star ratings at or above this lead to the native prompt.
    pub native_prompt_min_stars: u8,
    /// Where counters are persisted. In memory only when absent.
    pub store_path: Option<PathBuf>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            requirement: RequirementConfig::default(),
            native_prompt_min_stars: 4,
            store_path: None,
        }
    }
}

impl GateConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// The validated requirement.
    pub fn requirement(&self) -> Result<EligibilityRequirement, ConfigError> {
        EligibilityRequirement::try_from(self.requirement.clone())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=5).contains(&self.native_prompt_min_stars) {
            return Err(ConfigError::InvalidStars(self.native_prompt_min_stars));
        }
        self.requirement().map(|_| ())
    }
}
