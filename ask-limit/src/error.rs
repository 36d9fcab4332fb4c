use std::path::PathBuf;

/// Errors produced while building an [`EligibilityRequirement`](crate::EligibilityRequirement)
/// or loading a [`GateConfig`](crate::GateConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A threshold was below zero. Thresholds are never clamped.
    #[error("`{field}` must not be negative, got {value}")]
    Negative { field: &'static str, value: i64 },

    /// A threshold does not fit in 32 bits.
    #[error("`{field}` is out of range, got {value}")]
    OutOfRange { field: &'static str, value: i64 },

    /// The star rating that leads to the native prompt must be in `1..=5`.
    #[error("`native_prompt_min_stars` must be between 1 and 5, got {0}")]
    InvalidStars(u8),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read configuration from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors reported by a [`CounterRepository`](crate::CounterRepository).
///
/// The core never treats these as fatal: a failed load means "no prior data" and
/// a failed save is logged and dropped.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("counter storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("counter snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
