use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use core_lib::{encryption::Encryptor, ClientCredentials, DEFAULT_STATE};
use store::{EncryptedFileTokenStore, FileTokenStore, TokenStore, DEFAULT_TOKEN_FILE};

#[derive(Parser, Debug)]
#[command(
    name = "dropbox-token",
    version,
    about = "Obtain, store and refresh Dropbox OAuth2 tokens"
)]
pub struct Cli {
    /// Dropbox app key
    #[arg(long, env = "DROPBOX_APP_KEY")]
    pub app_key: Option<String>,

    /// Dropbox app secret
    #[arg(long, env = "DROPBOX_APP_SECRET", hide_env_values = true)]
    pub app_secret: Option<String>,

    /// Redirect URI registered for the app
    #[arg(long, env = "DROPBOX_REDIRECT_URI", default_value = "http://localhost")]
    pub redirect_uri: String,

    /// State value echoed back by the consent page
    #[arg(long, env = "DROPBOX_STATE", default_value = DEFAULT_STATE)]
    pub state: String,

    /// Where the token record is kept
    #[arg(long, env = "DROPBOX_TOKEN_FILE", default_value = DEFAULT_TOKEN_FILE)]
    pub token_file: PathBuf,

    /// Base64 encoded 32-byte key; when set the token file is encrypted
    #[arg(long, env = "DROPBOX_TOKEN_KEY", hide_env_values = true)]
    pub token_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open the consent page, read the pasted code and exchange it
    Authorize {
        /// Skip the refresh that follows the exchange
        #[arg(long)]
        no_refresh: bool,
    },
    /// Print the authorization URL
    Url,
    /// Exchange a code obtained out-of-band
    Exchange { code: String },
    /// Refresh the access token and print the stored record
    Refresh,
    /// Refresh the access token and print only the token
    AccessToken,
    /// Print the stored record and its estimated expiry
    Show,
    /// Print a fresh key for the encrypted token file
    GenerateKey,
}

impl Cli {
    pub fn credentials(&self) -> Result<ClientCredentials> {
        let app_key = self
            .app_key
            .clone()
            .ok_or_else(|| anyhow!("missing app key, set --app-key or DROPBOX_APP_KEY"))?;
        let app_secret = self
            .app_secret
            .clone()
            .ok_or_else(|| anyhow!("missing app secret, set --app-secret or DROPBOX_APP_SECRET"))?;

        Ok(ClientCredentials::new(app_key, app_secret, self.redirect_uri.clone())
            .with_state(self.state.clone()))
    }

    pub fn token_store(&self) -> Result<Box<dyn TokenStore>> {
        match &self.token_key {
            Some(key) => {
                let encryptor = Encryptor::from_base64_key(key)
                    .context("DROPBOX_TOKEN_KEY is not a usable key")?;
                Ok(Box::new(EncryptedFileTokenStore::new(
                    &self.token_file,
                    encryptor,
                )))
            }
            None => Ok(Box::new(FileTokenStore::new(&self.token_file))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["dropbox-token", "--app-key", "k", "--app-secret", "s", "url"])
            .unwrap();

        assert_eq!(cli.command, Command::Url);
        assert_eq!(cli.token_file, PathBuf::from(DEFAULT_TOKEN_FILE));

        let credentials = cli.credentials().unwrap();
        assert_eq!(credentials.redirect_uri, "http://localhost");
        assert_eq!(credentials.state, DEFAULT_STATE);
    }

    #[test]
    fn test_authorize_flags() {
        let cli = Cli::try_parse_from(["dropbox-token", "authorize", "--no-refresh"]).unwrap();
        assert_eq!(cli.command, Command::Authorize { no_refresh: true });
    }

    #[test]
    fn test_bad_token_key_is_rejected() {
        let cli = Cli::try_parse_from(["dropbox-token", "--token-key", "short", "show"]).unwrap();
        assert!(cli.token_store().is_err());
    }
}
