//! Runtime configuration.

use serde::{Deserialize, Serialize};

/// Default number of new graph entries between sweeps of dead objects.
pub const DEFAULT_PRUNE_INTERVAL: usize = 64;

/// Tunables for a [`Runtime`](crate::Runtime).
///
/// Deserializes from any serde format; missing fields take their defaults.
///
/// ```rust
/// use reflex_core::RuntimeConfig;
///
/// let config: RuntimeConfig = serde_json::from_str(r#"{ "prune_interval": 8 }"#).unwrap();
/// assert_eq!(config.prune_interval, 8);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// How many objects may be added to the dependency graph before entries
    /// whose objects have been dropped are swept out.
    ///
    /// Zero disables automatic sweeping; [`Runtime::prune`](crate::Runtime::prune)
    /// can still be called by hand.
    pub prune_interval: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            prune_interval: DEFAULT_PRUNE_INTERVAL,
        }
    }
}

impl RuntimeConfig {
    /// Set the sweep interval.
    pub fn with_prune_interval(mut self, interval: usize) -> Self {
        self.prune_interval = interval;
        self
    }
}
