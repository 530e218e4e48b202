//! Authentication gate configuration.

use serde::{Deserialize, Serialize};

/// Paths the authentication gate never inspects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Exact paths, or prefixes when the pattern ends in `*`.
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            public_paths: default_public_paths(),
        }
    }
}

fn default_public_paths() -> Vec<String> {
    vec![
        "/api/health".to_string(),
        "/api/auth/login".to_string(),
        "/api/auth/signup".to_string(),
        "/api/auth/refresh".to_string(),
        "/api/auth/password-reset*".to_string(),
    ]
}
