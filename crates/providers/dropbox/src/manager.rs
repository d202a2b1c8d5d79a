use core_lib::{token::TokenRecord, CodeProvider, OAuthProvider, TokenError, TokenResult, UserAgent};
use store::TokenStore;
use tracing::{info, warn};

use crate::DropboxProvider;

/// Owns the token lifecycle for one provider application: consent URL, code
/// exchange, refresh, and persistence of the resulting record.
///
/// The manager does not track expiry. Callers decide when to refresh, either
/// from `expires_in` or after the access token is rejected.
pub struct TokenManager<S, P = DropboxProvider> {
    provider: P,
    store: S,
}

impl<S, P> TokenManager<S, P>
where
    S: TokenStore,
    P: OAuthProvider + Sync,
{
    pub fn new(provider: P, store: S) -> Self {
        Self { provider, store }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn build_authorization_url(&self) -> String {
        self.provider.auth_url()
    }

    /// Exchanges a single-use authorization code and persists the result,
    /// replacing any earlier record. Nothing is written on failure.
    pub async fn exchange_code_for_tokens(&self, code: &str) -> TokenResult<TokenRecord> {
        let record = self.provider.exchange_code(code).await?;
        self.store.save(&record).await?;
        info!("Tokens received and saved to {}", self.store.location());
        Ok(record)
    }

    /// Replaces the stored access token with a fresh one. The refresh token
    /// and all other stored fields are kept.
    pub async fn refresh_access_token(&self) -> TokenResult<TokenRecord> {
        let mut record = match self.store.load().await {
            Ok(record) => record,
            Err(TokenError::StoreNotFound(location)) => {
                warn!("No token record at {}, cannot refresh", location);
                return Err(TokenError::MissingRefreshToken);
            }
            Err(err) => return Err(err),
        };

        if !record.has_refresh_token() {
            warn!("Stored token record has no refresh token");
            return Err(TokenError::MissingRefreshToken);
        }
        let refresh_token = record.refresh_token.clone().unwrap_or_default();

        let refresh = self.provider.refresh_token(&refresh_token).await?;
        record.apply_refresh(refresh);
        self.store.save(&record).await?;

        info!("Access token refreshed and saved to {}", self.store.location());
        Ok(record)
    }

    pub async fn save(&self, record: &TokenRecord) -> TokenResult<()> {
        self.store.save(record).await
    }

    pub async fn load(&self) -> TokenResult<TokenRecord> {
        self.store.load().await
    }

    /// Runs the interactive flow: show the consent page, wait for the code the
    /// user pastes back, and exchange it.
    ///
    /// A user agent that cannot be launched is not fatal, the URL is logged so
    /// it can be opened by hand.
    pub async fn authorize(
        &self,
        user_agent: &dyn UserAgent,
        codes: &dyn CodeProvider,
    ) -> TokenResult<TokenRecord> {
        let url = self.build_authorization_url();
        info!("Requesting user consent");

        if let Err(err) = user_agent.launch(&url) {
            warn!("{}. Please open this URL manually: {}", err, url);
        }

        let code = codes.authorization_code()?;
        self.exchange_code_for_tokens(code.trim()).await
    }
}
