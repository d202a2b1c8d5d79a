use core_lib::{
    token::{TokenRecord, TokenRefresh},
    ClientCredentials, OAuthProvider, TokenError,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error};

pub mod manager;

pub use manager::TokenManager;

pub const DROPBOX_AUTH_URL: &str = "https://www.dropbox.com/oauth2/authorize";
pub const DROPBOX_TOKEN_URL: &str = "https://api.dropbox.com/oauth2/token";

/// Error payload the token endpoint sends with a non-200 status.
#[derive(Deserialize, Debug)]
struct DropboxErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

pub struct DropboxProvider {
    credentials: ClientCredentials,
    auth_endpoint: String,
    token_endpoint: String,
    client: Client,
}

impl DropboxProvider {
    pub fn new(credentials: ClientCredentials) -> Self {
        DropboxProvider {
            credentials,
            auth_endpoint: DROPBOX_AUTH_URL.to_string(),
            token_endpoint: DROPBOX_TOKEN_URL.to_string(),
            client: Client::new(),
        }
    }

    /// Points the provider at different authorization and token endpoints.
    pub fn with_endpoints(
        mut self,
        auth_endpoint: impl Into<String>,
        token_endpoint: impl Into<String>,
    ) -> Self {
        self.auth_endpoint = auth_endpoint.into();
        self.token_endpoint = token_endpoint.into();
        self
    }

    /// Uses a preconfigured HTTP client, e.g. one with a request timeout.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn credentials(&self) -> &ClientCredentials {
        &self.credentials
    }

    /// POSTs a form to the token endpoint and returns the status and raw body.
    async fn post_token_form(&self, form: &[(&str, &str)]) -> Result<(StatusCode, String), TokenError> {
        let res = self
            .client
            .post(&self.token_endpoint)
            .form(form)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|err| {
                error!("Token endpoint request failed: {}", err);
                TokenError::Transport(err.to_string())
            })?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|err| TokenError::Transport(format!("Failed to read response body: {err}")))?;

        Ok((status, body))
    }
}

fn describe_failure(body: &str) -> String {
    match serde_json::from_str::<DropboxErrorBody>(body) {
        Ok(DropboxErrorBody {
            error,
            error_description: Some(description),
        }) => format!("{error}: {description}"),
        Ok(DropboxErrorBody { error, .. }) => error,
        Err(_) => "unrecognised error body".to_string(),
    }
}

#[async_trait::async_trait]
impl OAuthProvider for DropboxProvider {
    fn auth_url(&self) -> String {
        // Values are inserted verbatim; the provider accepts an unescaped
        // redirect URI here.
        format!(
            "{}?client_id={}&response_type=code&token_access_type=offline&redirect_uri={}&state={}",
            self.auth_endpoint,
            self.credentials.app_key,
            self.credentials.redirect_uri,
            self.credentials.state
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenRecord, TokenError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(TokenError::InvalidCode);
        }

        debug!("Exchanging authorization code at {}", self.token_endpoint);
        let (status, body) = self
            .post_token_form(&[
                ("code", code),
                ("grant_type", "authorization_code"),
                ("client_id", self.credentials.app_key.as_str()),
                ("client_secret", self.credentials.app_secret.as_str()),
                ("redirect_uri", self.credentials.redirect_uri.as_str()),
            ])
            .await?;

        if status != StatusCode::OK {
            error!(
                "Authorization code exchange failed with status {} ({})",
                status,
                describe_failure(&body)
            );
            return Err(TokenError::AuthExchange {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body)
            .map_err(|err| TokenError::InvalidResponse(format!("Error parsing token response: {err}")))
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenRefresh, TokenError> {
        debug!("Refreshing access token at {}", self.token_endpoint);
        let (status, body) = self
            .post_token_form(&[
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
                ("client_id", self.credentials.app_key.as_str()),
                ("client_secret", self.credentials.app_secret.as_str()),
            ])
            .await?;

        if status != StatusCode::OK {
            error!(
                "Token refresh failed with status {} ({})",
                status,
                describe_failure(&body)
            );
            return Err(TokenError::TokenRefresh {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body)
            .map_err(|err| TokenError::InvalidResponse(format!("Error parsing refresh response: {err}")))
    }
}
