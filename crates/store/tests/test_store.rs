#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use core_lib::{encryption::Encryptor, token::TokenRecord, TokenError};
    use hex_literal::hex;
    use serde_json::json;
    use store::{EncryptedFileTokenStore, FileTokenStore, MemoryTokenStore, TokenStore};
    use tempfile::TempDir;

    fn test_encryptor() -> Encryptor {
        let key = hex!(
            "000102030405060708090a0b0c0d0e0f"
            "101112131415161718191a1b1c1d1e1f"
        );
        Encryptor::try_new(&key).unwrap()
    }

    fn test_record() -> TokenRecord {
        serde_json::from_value(json!({
            "access_token": "access_123",
            "refresh_token": "refresh_456",
            "expires_in": 14400,
            "token_type": "bearer",
            "scope": "account_info.read files.content.read",
            "nested": { "list": [1, 2, 3], "flag": true }
        }))
        .unwrap()
    }

    fn create_store() -> (FileTokenStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path().join("tokens.json"));
        (store, dir)
    }

    #[tokio::test]
    async fn test_store_and_load_token_roundtrip() {
        let (store, _dir) = create_store();
        let record = test_record();

        store.save(&record).await.expect("Failed to store token");
        let loaded = store.load().await.expect("Failed to load token");

        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn test_load_nonexistent_store() {
        let (store, _dir) = create_store();

        match store.load().await {
            Err(TokenError::StoreNotFound(path)) => assert!(path.ends_with("tokens.json")),
            other => panic!("Expected StoreNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_load_malformed_store() {
        let (store, _dir) = create_store();

        std::fs::write(store.path(), "{ not json").unwrap();
        assert!(matches!(
            store.load().await,
            Err(TokenError::MalformedStore(_))
        ));

        std::fs::write(store.path(), r#"{"refresh_token": "R1"}"#).unwrap();
        assert!(matches!(
            store.load().await,
            Err(TokenError::MalformedStore(_))
        ));
    }

    #[tokio::test]
    async fn test_saved_file_is_pretty_json() {
        let (store, _dir) = create_store();
        store
            .save(&TokenRecord::new("A1", Some("R1"), Some(3600)))
            .await
            .unwrap();

        let contents = std::fs::read_to_string(store.path()).unwrap();
        assert!(contents.contains("\n    \"access_token\": \"A1\""));

        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(
            value,
            json!({ "access_token": "A1", "refresh_token": "R1", "expires_in": 3600 })
        );
    }

    #[tokio::test]
    async fn test_provider_fields_keep_order_and_precision() {
        let (store, _dir) = create_store();
        let record: TokenRecord = serde_json::from_str(
            r#"{"access_token":"A1","refresh_token":"R1","expires_in":14400,"uid":123456789012345678901234567890,"token_type":"bearer","account_id":"dbid:x"}"#,
        )
        .unwrap();

        store.save(&record).await.unwrap();

        let contents = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(
            contents,
            r#"{
    "access_token": "A1",
    "refresh_token": "R1",
    "expires_in": 14400,
    "uid": 123456789012345678901234567890,
    "token_type": "bearer",
    "account_id": "dbid:x"
}"#
        );
        assert_eq!(store.load().await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_save_replaces_previous_record() {
        let (store, dir) = create_store();

        store.save(&test_record()).await.unwrap();
        let replacement = TokenRecord::new("A2", Some("R2"), None);
        store.save(&replacement).await.unwrap();

        assert_eq!(store.load().await.unwrap(), replacement);
        assert!(!dir.path().join("tokens.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_failed_save_keeps_previous_contents() {
        let (store, dir) = create_store();
        store.save(&test_record()).await.unwrap();
        let before = std::fs::read(store.path()).unwrap();

        // A directory squatting on the temp path makes the write fail.
        std::fs::create_dir(dir.path().join("tokens.json.tmp")).unwrap();
        let result = store.save(&TokenRecord::new("A2", None, None)).await;

        assert!(matches!(result, Err(TokenError::Storage(_))));
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn test_save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested").join("deeper").join("t.json"));

        store.save(&test_record()).await.unwrap();

        assert_eq!(store.load().await.unwrap(), test_record());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_store_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let (store, _dir) = create_store();
        store.save(&test_record()).await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_last_modified() {
        let (store, _dir) = create_store();
        assert!(matches!(
            store::last_modified(store.path()).await,
            Err(TokenError::StoreNotFound(_))
        ));

        store.save(&test_record()).await.unwrap();
        let saved = store::last_modified(store.path()).await.unwrap();

        assert!((Utc::now() - saved).num_seconds().abs() < 60);
    }

    #[tokio::test]
    async fn test_encrypted_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = EncryptedFileTokenStore::new(dir.path().join("tokens.enc"), test_encryptor());

        store.save(&test_record()).await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(!raw.contains("access_123"));
        assert!(!raw.contains("refresh_456"));
        assert_eq!(store.load().await.unwrap(), test_record());
    }

    #[tokio::test]
    async fn test_encrypted_store_rejects_other_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tokens.enc");
        EncryptedFileTokenStore::new(&path, test_encryptor())
            .save(&test_record())
            .await
            .unwrap();

        let other_key = Encryptor::from_base64_key(&Encryptor::generate_key()).unwrap();
        let store = EncryptedFileTokenStore::new(&path, other_key);

        assert!(matches!(
            store.load().await,
            Err(TokenError::MalformedStore(_))
        ));
    }

    #[tokio::test]
    async fn test_encrypted_store_not_found() {
        let dir = TempDir::new().unwrap();
        let store = EncryptedFileTokenStore::new(dir.path().join("missing.enc"), test_encryptor());

        assert!(matches!(
            store.load().await,
            Err(TokenError::StoreNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = Arc::new(MemoryTokenStore::new());
        assert!(matches!(
            store.load().await,
            Err(TokenError::StoreNotFound(_))
        ));

        store.save(&test_record()).await.unwrap();

        assert_eq!(store.load().await.unwrap(), test_record());
        assert_eq!(store.location(), "memory");
    }
}
