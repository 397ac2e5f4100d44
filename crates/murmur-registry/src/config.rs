//! Registry configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the session registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// How long a peer may stay silent before it is evicted. Any
    /// received segment (heartbeats included) resets the clock.
    pub afk_timeout: Duration,

    /// Password required by the in-band `!kill` shutdown command.
    pub kill_password: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            afk_timeout: Duration::from_secs(30),
            kill_password: "admin123".to_string(),
        }
    }
}
