use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Access and refresh tokens as returned by the provider, along with any
/// provider-specific fields (token type, scope, account ids).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of a successful refresh response. Only the fields that may change on
/// refresh are kept.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenRefresh {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl TokenRecord {
    pub fn new(access_token: &str, refresh_token: Option<&str>, expires_in: Option<u64>) -> Self {
        Self {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(str::to_string),
            expires_in,
            extra: Map::new(),
        }
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }

    /// Replaces the access token and its lifetime. The refresh token and every
    /// other field are left as they are.
    pub fn apply_refresh(&mut self, refresh: TokenRefresh) {
        self.access_token = refresh.access_token;
        self.expires_in = refresh.expires_in;
    }

    /// Absolute expiry, given the moment the current access token was issued.
    pub fn expires_at(&self, issued_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let seconds = i64::try_from(self.expires_in?).ok()?;
        issued_at.checked_add_signed(Duration::try_seconds(seconds)?)
    }

    pub fn is_expired_since(&self, issued_at: DateTime<Utc>) -> bool {
        if let Some(expiration) = self.expires_at(issued_at) {
            Utc::now() > expiration
        } else {
            false
        }
    }
}
