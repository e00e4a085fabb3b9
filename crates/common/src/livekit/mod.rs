//! LiveKit access tokens and media endpoint resolution
//!
//! The lifecycle core only sees the `TokenIssuer` trait; `LiveKitTokenIssuer`
//! mints HS256 access tokens in the format the LiveKit server expects.

use crate::config::LiveKitConfig;
use crate::db::models::Role;
use crate::errors::{AppError, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

/// Media sources a publisher may use
pub const PUBLISH_SOURCES: &[&str] = &["camera", "microphone", "screen_share"];

/// Mints role-scoped, time-bounded media access credentials
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, room: &str, identity: &str, display_name: &str, role: Role) -> Result<String>;
}

/// Room permissions carried in the `video` claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrant {
    pub room_join: bool,
    pub room: String,
    pub can_subscribe: bool,
    pub can_publish: bool,
    pub can_publish_data: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub can_publish_sources: Vec<String>,
}

/// LiveKit access token claims
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    /// API key
    pub iss: String,

    /// Participant identity
    pub sub: String,

    /// Display name
    pub name: String,

    pub nbf: i64,

    pub exp: i64,

    pub video: VideoGrant,

    /// JSON blob visible to other participants
    #[serde(default)]
    pub metadata: String,
}

/// Which roles may publish media
#[derive(Debug, Clone, Copy)]
pub struct PublishPolicy {
    pub student_can_publish: bool,
}

impl PublishPolicy {
    /// Everyone subscribes and chats; publishing depends on role
    pub fn grant_for(&self, room: &str, role: Role) -> VideoGrant {
        let can_publish = match role {
            Role::Teacher => true,
            Role::Student => self.student_can_publish,
        };

        VideoGrant {
            room_join: true,
            room: room.to_string(),
            can_subscribe: true,
            can_publish,
            can_publish_data: true,
            can_publish_sources: if can_publish {
                PUBLISH_SOURCES.iter().map(|s| s.to_string()).collect()
            } else {
                Vec::new()
            },
        }
    }
}

pub struct LiveKitTokenIssuer {
    api_key: String,
    encoding_key: EncodingKey,
    ttl: Duration,
    policy: PublishPolicy,
}

impl LiveKitTokenIssuer {
    pub fn new(api_key: &str, api_secret: &str, ttl_secs: u64, policy: PublishPolicy) -> Self {
        Self {
            api_key: api_key.to_string(),
            encoding_key: EncodingKey::from_secret(api_secret.as_bytes()),
            ttl: Duration::seconds(ttl_secs as i64),
            policy,
        }
    }

    pub fn from_config(config: &LiveKitConfig) -> Self {
        Self::new(
            &config.api_key,
            &config.api_secret,
            config.token_ttl_secs,
            PublishPolicy {
                student_can_publish: config.student_can_publish,
            },
        )
    }
}

impl TokenIssuer for LiveKitTokenIssuer {
    fn issue(&self, room: &str, identity: &str, display_name: &str, role: Role) -> Result<String> {
        let now = Utc::now();
        let metadata = serde_json::json!({ "role": role.as_str() }).to_string();

        let claims = AccessClaims {
            iss: self.api_key.clone(),
            sub: identity.to_string(),
            name: display_name.to_string(),
            nbf: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            video: self.policy.grant_for(room, role),
            metadata,
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::TokenIssue {
            message: e.to_string(),
        })
    }
}

/// Builds the websocket URL clients use to reach LiveKit
#[derive(Debug, Clone)]
pub struct MediaEndpoint {
    public_host: String,
    port: u16,
    secure: bool,
}

impl MediaEndpoint {
    pub fn new(public_host: &str, port: u16, secure: bool) -> Self {
        Self {
            public_host: public_host.trim().to_string(),
            port,
            secure,
        }
    }

    pub fn from_config(config: &LiveKitConfig) -> Self {
        Self::new(&config.public_host, config.port, config.secure)
    }

    /// Base URL without a path. The configured public host wins over the
    /// request's Host header, which phones on the LAN cannot resolve.
    pub fn ws_url(&self, host_header: Option<&str>) -> String {
        let hostname = if self.public_host.is_empty() {
            extract_hostname(host_header.unwrap_or(""))
        } else {
            self.public_host.clone()
        };
        let scheme = if self.secure { "wss" } else { "ws" };

        format!("{}://{}:{}", scheme, hostname, self.port)
    }
}

/// Hostname part of a Host header, without port or IPv6 brackets
fn extract_hostname(host: &str) -> String {
    let host = host.trim();
    if host.is_empty() {
        return "localhost".to_string();
    }

    // "[::1]:3010"
    if let Some(rest) = host.strip_prefix('[') {
        if let Some((addr, _)) = rest.split_once(']') {
            return addr.to_string();
        }
    }

    // "127.0.0.1:3010"; a bare IPv6 address has several colons and no port
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => {
            name.to_string()
        }
        _ => host.trim_matches(|c| c == '[' || c == ']').to_string(),
    }
}
