mod config;
mod prompt;

use anyhow::Result;
use clap::Parser;
use config::{Cli, Command};
use core_lib::{encryption::Encryptor, token::TokenRecord, TokenError};
use dropbox::{DropboxProvider, TokenManager};
use prompt::{BrowserUserAgent, PromptCodeProvider};
use store::TokenStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn print_record(record: &TokenRecord) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let result = run(&cli).await;
    if let Some(hint) = result.as_ref().err().and_then(reauthorization_hint) {
        warn!("{}", hint);
    }
    result
}

async fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Authorize { no_refresh } => {
            let manager = token_manager(cli)?;
            let record = manager
                .authorize(&BrowserUserAgent, &PromptCodeProvider::stdin())
                .await?;
            if *no_refresh {
                print_record(&record)?;
            } else {
                print_record(&manager.refresh_access_token().await?)?;
            }
        }
        Command::Url => println!("{}", token_manager(cli)?.build_authorization_url()),
        Command::Exchange { code } => {
            let record = token_manager(cli)?.exchange_code_for_tokens(code).await?;
            print_record(&record)?;
        }
        Command::Refresh => print_record(&token_manager(cli)?.refresh_access_token().await?)?,
        Command::AccessToken => {
            let record = token_manager(cli)?.refresh_access_token().await?;
            println!("{}", record.access_token);
        }
        Command::Show => show(cli).await?,
        Command::GenerateKey => println!("{}", Encryptor::generate_key()),
    }

    Ok(())
}

/// Points the user back at `authorize` when no usable token record exists.
fn reauthorization_hint(err: &anyhow::Error) -> Option<&'static str> {
    err.downcast_ref::<TokenError>()
        .filter(|e| e.requires_reauthorization())
        .map(|_| "No usable token record, run `dropbox-token authorize` to obtain one")
}

fn token_manager(cli: &Cli) -> Result<TokenManager<Box<dyn TokenStore>>> {
    let provider = DropboxProvider::new(cli.credentials()?);
    Ok(TokenManager::new(provider, cli.token_store()?))
}

/// Prints the stored record. The access token's issue time is not stored, so
/// expiry is estimated from when the file was last written.
async fn show(cli: &Cli) -> Result<()> {
    let record = cli.token_store()?.load().await?;
    print_record(&record)?;

    let saved_at = store::last_modified(&cli.token_file).await?;
    match record.expires_at(saved_at) {
        Some(expires_at) if record.is_expired_since(saved_at) => {
            info!("Access token expired at {}", expires_at.to_rfc3339());
        }
        Some(expires_at) => info!("Access token expires at {}", expires_at.to_rfc3339()),
        None => info!("Access token has no reported lifetime"),
    }
    Ok(())
}
