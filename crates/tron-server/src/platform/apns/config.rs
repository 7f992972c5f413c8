//! APNS configuration loading from `~/.tron/mods/apns/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// APNS configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApnsConfig {
    /// Apple Developer Key ID (10-char alphanumeric).
    pub key_id: String,
    /// Apple Developer Team ID (10-char alphanumeric).
    pub team_id: String,
    /// App bundle identifier (e.g., "com.example.TronMobile").
    pub bundle_id: String,
    /// APNS environment: "sandbox" or "production".
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Optional explicit path to the .p8 key file.
    pub key_path: Option<String>,
}

fn default_environment() -> String {
    "sandbox".to_string()
}

impl ApnsConfig {
    /// Resolve the path to the private key file.
    pub fn resolved_key_path(&self) -> PathBuf {
        if let Some(ref path) = self.key_path {
            let expanded = if path.starts_with('~') {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/root".to_string());
                PathBuf::from(home).join(path.trim_start_matches("~/"))
            } else {
                PathBuf::from(path)
            };
            return expanded;
        }
        // Default: ~/.tron/mods/apns/AuthKey_{keyId}.p8
        let home = std::env::var("HOME").unwrap_or_else(|_| "/root".to_string());
        PathBuf::from(home)
            .join(".tron")
            .join("mods")
            .join("apns")
            .join(format!("AuthKey_{}.p8", self.key_id))
    }

    /// APNS server hostname based on environment.
    pub fn apns_host(&self) -> &str {
        if self.environment == "production" {
            "api.push.apple.com"
        } else {
            "api.sandbox.push.apple.com"
        }
    }
}

/// Load APNS config from `~/.tron/mods/apns/config.json`.
///
/// Returns `None` if config doesn't exist or is invalid (not an error —
/// APNS is optional).
pub fn load_apns_config() -> Option<ApnsConfig> {
    load_from_path(None)
}

/// Load APNS config from a specific base directory (for testing).
pub(crate) fn load_from_path(base: Option<&Path>) -> Option<ApnsConfig> {
    let config_path = if let Some(base) = base {
        base.join("config.json")
    } else {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/root".to_string());
        PathBuf::from(home)
            .join(".tron")
            .join("mods")
            .join("apns")
            .join("config.json")
    };

    if !config_path.exists() {
        debug!(?config_path, "APNS config not found, push notifications disabled");
        return None;
    }

    let content = match std::fs::read_to_string(&config_path) {
        Ok(c) => c,
        Err(e) => {
            warn!(?config_path, error = %e, "failed to read APNS config");
            return None;
        }
    };

    let config: ApnsConfig = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!(?config_path, error = %e, "failed to parse APNS config");
            return None;
        }
    };

    // Validate required fields
    if config.key_id.is_empty() || config.team_id.is_empty() || config.bundle_id.is_empty() {
        warn!("APNS config missing required fields (keyId, teamId, bundleId)");
        return None;
    }

    // Check key file exists
    let key_path = config.resolved_key_path();
    if !key_path.exists() {
        warn!(?key_path, "APNS private key file not found");
        return None;
    }

    debug!(
        key_id = %config.key_id,
        team_id = %config.team_id,
        bundle_id = %config.bundle_id,
        environment = %config.environment,
        "APNS config loaded"
    );

    Some(config)
}
