//! APNS service — JWT signing, HTTP/2 notification delivery.
//!
//! Uses `reqwest` for HTTP/2 transport and `jsonwebtoken` for ES256 JWT signing.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::config::ApnsConfig;
use super::types::{ApnsNotification, ApnsSendResult};

/// JWT token validity period (55 minutes — refresh before Apple's 1-hour expiry).
const TOKEN_VALIDITY: Duration = Duration::from_secs(55 * 60);

fn truncate(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// JWT claims for APNS authentication.
#[derive(Debug, Serialize, Deserialize)]
struct ApnsClaims {
    /// Issuer (Team ID).
    iss: String,
    /// Issued at (Unix timestamp).
    iat: i64,
}

/// Cached JWT token with expiry tracking.
struct CachedToken {
    token: String,
    created_at: Instant,
}

/// APNS service for sending push notifications to Apple devices.
pub struct ApnsService {
    config: ApnsConfig,
    encoding_key: EncodingKey,
    client: reqwest::Client,
    cached_token: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for ApnsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApnsService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ApnsService {
    /// Create a new APNS service from config.
    ///
    /// Reads the private key from disk and builds an HTTP/2 client.
    pub fn new(config: ApnsConfig) -> Result<Self, ApnsError> {
        let key_path = config.resolved_key_path();
        let key_pem = std::fs::read(&key_path).map_err(|e| ApnsError::KeyRead {
            path: key_path.display().to_string(),
            reason: e.to_string(),
        })?;

        let encoding_key = EncodingKey::from_ec_pem(&key_pem).map_err(|e| ApnsError::KeyParse {
            reason: e.to_string(),
        })?;

        // APNs requires HTTP/2. Force it via http2_prior_knowledge — ALPN
        // alone isn't enough because reqwest defaults to HTTP/1.1 unless told otherwise.
        let client = reqwest::Client::builder()
            .http2_prior_knowledge()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ApnsError::ClientBuild {
                reason: e.to_string(),
            })?;

        info!(
            key_id = %config.key_id,
            team_id = %config.team_id,
            environment = %config.environment,
            "APNS service initialized"
        );

        Ok(Self {
            config,
            encoding_key,
            client,
            cached_token: Mutex::new(None),
        })
    }

    /// Send a notification to a single device.
    #[allow(clippy::too_many_lines)]
    pub async fn send(
        &self,
        device_token: &str,
        notification: &ApnsNotification,
    ) -> ApnsSendResult {
        let jwt = match self.get_or_refresh_token() {
            Ok(t) => t,
            Err(e) => {
                return ApnsSendResult {
                    success: false,
                    device_token: device_token.to_string(),
                    apns_id: None,
                    status_code: None,
                    reason: None,
                    error: Some(format!("JWT generation failed: {e}")),
                };
            }
        };

        let url = format!(
            "https://{}:443/3/device/{}",
            self.config.apns_host(),
            device_token
        );

        let priority = if notification.priority == "high" {
            "10"
        } else {
            "5"
        };

        let payload = self.build_payload(notification);

        info!(
            url = %url,
            token_len = device_token.len(),
            token_prefix = truncate(device_token, 8),
            bundle_id = %self.config.bundle_id,
            priority = priority,
            payload = %payload,
            "APNS request"
        );

        let result = self
            .client
            .post(&url)
            .header("authorization", format!("bearer {jwt}"))
            .header("apns-topic", &self.config.bundle_id)
            .header("apns-push-type", "alert")
            .header("apns-priority", priority)
            .header("apns-expiration", "0")
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status().as_u16();
                let apns_id = response
                    .headers()
                    .get("apns-id")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from);
                let http_version = format!("{:?}", response.version());

                if response.status().is_success() {
                    info!(
                        status,
                        http_version = %http_version,
                        device_token = truncate(device_token, 8),
                        apns_id = ?apns_id,
                        "APNS send OK"
                    );
                    ApnsSendResult {
                        success: true,
                        device_token: device_token.to_string(),
                        apns_id,
                        status_code: Some(status),
                        reason: None,
                        error: None,
                    }
                } else {
                    let body = response.text().await.unwrap_or_default();
                    let reason = serde_json::from_str::<serde_json::Value>(&body)
                        .ok()
                        .and_then(|v| v.get("reason")?.as_str().map(String::from));

                    warn!(
                        status,
                        http_version = %http_version,
                        reason = ?reason,
                        body = %body,
                        device_token = truncate(device_token, 8),
                        "APNS send FAILED"
                    );

                    ApnsSendResult {
                        success: false,
                        device_token: device_token.to_string(),
                        apns_id,
                        status_code: Some(status),
                        reason,
                        error: Some(body),
                    }
                }
            }
            Err(e) => {
                warn!(
                    error = %e,
                    error_debug = ?e,
                    url = %url,
                    "APNS HTTP request FAILED (transport error)"
                );
                ApnsSendResult {
                    success: false,
                    device_token: device_token.to_string(),
                    apns_id: None,
                    status_code: None,
                    reason: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Send a notification to multiple devices in parallel.
    pub async fn send_to_many(
        &self,
        device_tokens: &[String],
        notification: &ApnsNotification,
    ) -> Vec<ApnsSendResult> {
        let futures: Vec<_> = device_tokens
            .iter()
            .map(|token| self.send(token, notification))
            .collect();
        futures::future::join_all(futures).await
    }

    /// Get a cached JWT or generate a new one.
    fn get_or_refresh_token(&self) -> Result<String, ApnsError> {
        let mut cached = self
            .cached_token
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if let Some(ref token) = *cached {
            if token.created_at.elapsed() < TOKEN_VALIDITY {
                return Ok(token.token.clone());
            }
        }

        let jwt = self.generate_jwt()?;
        *cached = Some(CachedToken {
            token: jwt.clone(),
            created_at: Instant::now(),
        });

        Ok(jwt)
    }

    /// Generate a new ES256 JWT for APNS authentication.
    fn generate_jwt(&self) -> Result<String, ApnsError> {
        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.config.key_id.clone());

        let claims = ApnsClaims {
            iss: self.config.team_id.clone(),
            iat: chrono::Utc::now().timestamp(),
        };

        jsonwebtoken::encode(&header, &claims, &self.encoding_key).map_err(|e| ApnsError::JwtSign {
            reason: e.to_string(),
        })
    }

    /// Build the APNS JSON payload.
    #[allow(clippy::unused_self)]
    fn build_payload(&self, notification: &ApnsNotification) -> serde_json::Value {
        let mut aps = serde_json::json!({
            "alert": {
                "title": notification.title,
                "body": notification.body,
            },
        });

        if let Some(ref sound) = notification.sound {
            aps["sound"] = serde_json::json!(sound);
        }
        if let Some(badge) = notification.badge {
            aps["badge"] = serde_json::json!(badge);
        }
        if let Some(ref thread_id) = notification.thread_id {
            aps["thread-id"] = serde_json::json!(thread_id);
        }
        aps["mutable-content"] = serde_json::json!(1);

        let mut payload = serde_json::json!({ "aps": aps });

        if let Some(obj) = payload.as_object_mut() {
            for (key, value) in &notification.data {
                let _ = obj.insert(key.clone(), serde_json::json!(value));
            }
        }

        payload
    }
}

/// APNS service errors.
#[derive(Debug, thiserror::Error)]
pub enum ApnsError {
    /// Failed to read private key file.
    #[error("failed to read APNS key at {path}: {reason}")]
    KeyRead {
        /// Key file path.
        path: String,
        /// Error description.
        reason: String,
    },
    /// Failed to parse private key.
    #[error("failed to parse APNS key: {reason}")]
    KeyParse {
        /// Error description.
        reason: String,
    },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {reason}")]
    ClientBuild {
        /// Error description.
        reason: String,
    },
    /// Failed to sign JWT.
    #[error("failed to sign JWT: {reason}")]
    JwtSign {
        /// Error description.
        reason: String,
    },
}
