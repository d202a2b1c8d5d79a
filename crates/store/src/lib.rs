use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use core_lib::{encryption::Encryptor, token::TokenRecord, TokenError, TokenResult};
use serde::Serialize;
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};
use tracing::debug;

/// File name used when no store path is configured.
pub const DEFAULT_TOKEN_FILE: &str = "tokens.json";

/// Repository for the single token record owned by a token manager.
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    /// Reads the persisted record. Fails with `StoreNotFound` if nothing was
    /// ever saved and `MalformedStore` if the contents cannot be parsed.
    async fn load(&self) -> TokenResult<TokenRecord>;

    /// Replaces the persisted record. Either the whole write lands or the
    /// previous contents stay readable.
    async fn save(&self, record: &TokenRecord) -> TokenResult<()>;

    /// Human readable location, used in logs.
    fn location(&self) -> String;
}

#[async_trait::async_trait]
impl<S: TokenStore + ?Sized> TokenStore for Arc<S> {
    async fn load(&self) -> TokenResult<TokenRecord> {
        (**self).load().await
    }

    async fn save(&self, record: &TokenRecord) -> TokenResult<()> {
        (**self).save(record).await
    }

    fn location(&self) -> String {
        (**self).location()
    }
}

#[async_trait::async_trait]
impl<S: TokenStore + ?Sized> TokenStore for Box<S> {
    async fn load(&self) -> TokenResult<TokenRecord> {
        (**self).load().await
    }

    async fn save(&self, record: &TokenRecord) -> TokenResult<()> {
        (**self).save(record).await
    }

    fn location(&self) -> String {
        (**self).location()
    }
}

/// Modification time of a store file, i.e. when the current access token was
/// last written.
pub async fn last_modified(path: &Path) -> TokenResult<DateTime<Utc>> {
    let metadata = fs::metadata(path).await.map_err(|e| io_error(path, e))?;
    let modified = metadata
        .modified()
        .map_err(|e| TokenError::Storage(format!("Modification time unavailable: {e}")))?;
    Ok(DateTime::<Utc>::from(modified))
}

/// Plain JSON file store, pretty printed so it can be inspected by hand.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileTokenStore {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_FILE)
    }
}

#[async_trait::async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> TokenResult<TokenRecord> {
        let bytes = read_store(&self.path).await?;
        let record = parse_record(&bytes)?;
        debug!("Loaded token record from {}", self.path.display());
        Ok(record)
    }

    async fn save(&self, record: &TokenRecord) -> TokenResult<()> {
        let bytes = to_pretty_json(record)?;
        write_atomically(&self.path, &bytes).await?;
        debug!("Saved token record to {}", self.path.display());
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// File store whose contents are sealed with AES-256-GCM.
#[derive(Clone)]
pub struct EncryptedFileTokenStore {
    path: PathBuf,
    encryptor: Encryptor,
}

impl EncryptedFileTokenStore {
    pub fn new(path: impl Into<PathBuf>, encryptor: Encryptor) -> Self {
        Self {
            path: path.into(),
            encryptor,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl TokenStore for EncryptedFileTokenStore {
    async fn load(&self) -> TokenResult<TokenRecord> {
        let bytes = read_store(&self.path).await?;
        let sealed = String::from_utf8(bytes)
            .map_err(|_| TokenError::MalformedStore("Store is not valid UTF-8".to_string()))?;
        let plaintext = self
            .encryptor
            .open(&sealed)
            .map_err(|e| TokenError::MalformedStore(format!("Decryption failed: {e}")))?;
        let record = parse_record(&plaintext)?;
        debug!("Loaded encrypted token record from {}", self.path.display());
        Ok(record)
    }

    async fn save(&self, record: &TokenRecord) -> TokenResult<()> {
        let json = serde_json::to_vec(record)
            .map_err(|e| TokenError::Storage(format!("Serialization failed: {e}")))?;
        let sealed = self.encryptor.seal(&json)?;
        write_atomically(&self.path, sealed.as_bytes()).await?;
        debug!("Saved encrypted token record to {}", self.path.display());
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-process store, lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    record: Mutex<Option<TokenRecord>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: TokenRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }
}

#[async_trait::async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> TokenResult<TokenRecord> {
        self.record
            .lock()
            .await
            .clone()
            .ok_or_else(|| TokenError::StoreNotFound(self.location()))
    }

    async fn save(&self, record: &TokenRecord) -> TokenResult<()> {
        *self.record.lock().await = Some(record.clone());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

fn io_error(path: &Path, err: std::io::Error) -> TokenError {
    if err.kind() == ErrorKind::NotFound {
        TokenError::StoreNotFound(path.display().to_string())
    } else {
        TokenError::Storage(format!("Failed to access {}: {err}", path.display()))
    }
}

async fn read_store(path: &Path) -> TokenResult<Vec<u8>> {
    fs::read(path).await.map_err(|e| io_error(path, e))
}

fn parse_record(bytes: &[u8]) -> TokenResult<TokenRecord> {
    serde_json::from_slice(bytes).map_err(|e| TokenError::MalformedStore(e.to_string()))
}

fn to_pretty_json(record: &TokenRecord) -> TokenResult<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    record
        .serialize(&mut serializer)
        .map_err(|e| TokenError::Storage(format!("Serialization failed: {e}")))?;
    Ok(buf)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| DEFAULT_TOKEN_FILE.into());
    name.push(".tmp");
    path.with_file_name(name)
}

async fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

/// Writes to a sibling temp file and renames it over the target, so a reader
/// sees either the old contents or the new ones.
async fn write_atomically(path: &Path, bytes: &[u8]) -> TokenResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(|e| {
            TokenError::Storage(format!(
                "Failed to create store directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    let tmp_path = temp_path_for(path);
    if let Err(e) = write_private(&tmp_path, bytes).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(TokenError::Storage(format!(
            "Failed to write {}: {e}",
            tmp_path.display()
        )));
    }

    if let Err(e) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(TokenError::Storage(format!(
            "Failed to move token file into place {}: {e}",
            path.display()
        )));
    }

    Ok(())
}
