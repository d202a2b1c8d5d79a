use std::fmt;

use encryption::CryptoError;
use thiserror::Error;
use token::{TokenRecord, TokenRefresh};

pub mod encryption;
pub mod token;

/// State value sent with the authorization request when none is configured.
pub const DEFAULT_STATE: &str = "boka";

/// Represents an error that can occur during the token lifecycle.
#[derive(Error, Debug)]
pub enum TokenError {
    /// The token endpoint rejected an authorization code exchange.
    #[error("authorization code exchange failed with status {status}: {body}")]
    AuthExchange { status: u16, body: String },

    /// The token endpoint rejected a refresh request.
    #[error("token refresh failed with status {status}: {body}")]
    TokenRefresh { status: u16, body: String },

    #[error("refresh token not available, run the authorization flow first")]
    MissingRefreshToken,

    #[error("token store not found at {0}, run the authorization flow first")]
    StoreNotFound(String),

    #[error("token store is malformed: {0}")]
    MalformedStore(String),

    #[error("authorization code must not be empty")]
    InvalidCode,

    #[error("request to token endpoint failed: {0}")]
    Transport(String),

    #[error("unexpected token endpoint response: {0}")]
    InvalidResponse(String),

    #[error("token store error: {0}")]
    Storage(String),

    #[error("token store encryption error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("could not launch user agent: {0}")]
    UserAgent(String),

    #[error("could not read authorization code: {0}")]
    CodeInput(String),
}

impl TokenError {
    /// HTTP status carried by a provider rejection, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            TokenError::AuthExchange { status, .. } | TokenError::TokenRefresh { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// True when the only way forward is a fresh authorization flow.
    pub fn requires_reauthorization(&self) -> bool {
        matches!(
            self,
            TokenError::MissingRefreshToken | TokenError::StoreNotFound(_)
        )
    }
}

pub type TokenResult<T> = Result<T, TokenError>;

/// Static application credentials registered with the provider.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub app_key: String,
    pub app_secret: String,
    pub redirect_uri: String,
    pub state: String,
}

impl ClientCredentials {
    pub fn new(
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            redirect_uri: redirect_uri.into(),
            state: DEFAULT_STATE.to_string(),
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("app_key", &self.app_key)
            .field("app_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("state", &self.state)
            .finish()
    }
}

/// Defines the wire operations an OAuth provider must implement.
#[async_trait::async_trait]
pub trait OAuthProvider {
    /// Returns the URL to initiate the OAuth authorization flow.
    fn auth_url(&self) -> String;

    /// Exchanges an authorization code for a token record.
    async fn exchange_code(&self, code: &str) -> Result<TokenRecord, TokenError>;

    /// Requests a new access token for a refresh token.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenRefresh, TokenError>;
}

/// Shows an authorization URL to a human, typically by opening a browser.
pub trait UserAgent {
    fn launch(&self, url: &str) -> Result<(), TokenError>;
}

/// Supplies the authorization code the user received after consent.
pub trait CodeProvider {
    fn authorization_code(&self) -> Result<String, TokenError>;
}

impl<F> CodeProvider for F
where
    F: Fn() -> Result<String, TokenError>,
{
    fn authorization_code(&self) -> Result<String, TokenError> {
        self()
    }
}
