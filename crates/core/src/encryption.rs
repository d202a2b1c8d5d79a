use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose, Engine};
use rand::RngCore;

const NONCE_SIZE: usize = 12;
pub const KEY_SIZE: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    InvalidKeyLength(usize),
    InvalidKeyEncoding,
    EncryptionError,
    DecryptionError,
    InvalidFormat,
    Utf8Error,
}

impl std::fmt::Display for CryptoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CryptoError::InvalidKeyLength(len) => {
                write!(f, "Invalid key length: {} (expected {})", len, KEY_SIZE)
            }
            CryptoError::InvalidKeyEncoding => write!(f, "Key is not valid base64"),
            CryptoError::EncryptionError => write!(f, "Encryption failed"),
            CryptoError::DecryptionError => write!(f, "Decryption failed"),
            CryptoError::InvalidFormat => write!(f, "Invalid format"),
            CryptoError::Utf8Error => write!(f, "UTF-8 conversion error"),
        }
    }
}

impl std::error::Error for CryptoError {}

/// AES-256-GCM sealing for token store contents.
///
/// Sealed output is `base64(nonce):base64(ciphertext)`, with a fresh random
/// nonce per call.
#[derive(Clone)]
pub struct Encryptor {
    cipher: Aes256Gcm,
}

impl Encryptor {
    pub fn try_new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength(key.len()));
        }
        let key = Key::<Aes256Gcm>::from_slice(key);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Builds an encryptor from a standard base64 encoded 32-byte key.
    pub fn from_base64_key(encoded: &str) -> Result<Self, CryptoError> {
        let key = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|_| CryptoError::InvalidKeyEncoding)?;
        Self::try_new(&key)
    }

    /// Generates a random key, base64 encoded, suitable for `from_base64_key`.
    pub fn generate_key() -> String {
        let mut key = [0u8; KEY_SIZE];
        rand::rng().fill_bytes(&mut key);
        general_purpose::STANDARD.encode(key)
    }

    pub fn seal(&self, plaintext: &[u8]) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce_bytes);

        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CryptoError::EncryptionError)?;

        Ok(format!(
            "{}:{}",
            general_purpose::STANDARD.encode(nonce_bytes),
            general_purpose::STANDARD.encode(ciphertext)
        ))
    }

    pub fn open(&self, sealed: &str) -> Result<Vec<u8>, CryptoError> {
        let (nonce_part, cipher_part) = sealed
            .trim()
            .split_once(':')
            .ok_or(CryptoError::InvalidFormat)?;

        let nonce_bytes = general_purpose::STANDARD
            .decode(nonce_part)
            .map_err(|_| CryptoError::InvalidFormat)?;
        if nonce_bytes.len() != NONCE_SIZE {
            return Err(CryptoError::InvalidFormat);
        }
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = general_purpose::STANDARD
            .decode(cipher_part)
            .map_err(|_| CryptoError::InvalidFormat)?;

        self.cipher
            .decrypt(nonce, ciphertext.as_ref())
            .map_err(|_| CryptoError::DecryptionError)
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        self.seal(plaintext.as_bytes())
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        String::from_utf8(self.open(encoded)?).map_err(|_| CryptoError::Utf8Error)
    }
}
