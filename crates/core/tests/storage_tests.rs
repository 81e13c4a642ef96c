// ═══════════════════════════════════════════════════════════════════
// Storage Tests — encryption, snapshot file format, StorageManager,
// LocalRepository persistence
// ═══════════════════════════════════════════════════════════════════

use finance_tracker_core::errors::CoreError;
use finance_tracker_core::models::holding::NewHolding;
use finance_tracker_core::models::snapshot::DataSnapshot;
use finance_tracker_core::repository::local::LocalRepository;
use finance_tracker_core::repository::traits::Repository;
use finance_tracker_core::storage::encryption::{self, derive_key, KdfParams};
use finance_tracker_core::storage::format::{self, CURRENT_VERSION, HEADER_SIZE, MAGIC};
use finance_tracker_core::storage::manager::StorageManager;

/// Cheap Argon2 parameters so tests stay fast.
fn fast_params() -> KdfParams {
    KdfParams {
        memory_cost: 1024,
        time_cost: 1,
        parallelism: 1,
    }
}

fn sample_snapshot() -> DataSnapshot {
    let mut snapshot = DataSnapshot::default();
    snapshot.settings.exchange_rates.set_rate("EUR", 1.1);
    snapshot.settings.api_keys.insert("alphavantage".into(), "demo".into());
    snapshot
}

// ═══════════════════════════════════════════════════════════════════
// Key derivation & sealing
// ═══════════════════════════════════════════════════════════════════

mod encryption_tests {
    use super::*;

    #[test]
    fn default_kdf_params() {
        let p = KdfParams::default();
        assert_eq!(p.memory_cost, 65_536);
        assert_eq!(p.time_cost, 3);
        assert_eq!(p.parallelism, 4);
    }

    #[test]
    fn derive_key_is_deterministic() {
        let salt = [7u8; 16];
        let a = derive_key("password", &salt, &fast_params()).unwrap();
        let b = derive_key("password", &salt, &fast_params()).unwrap();
        let c = derive_key("other", &salt, &fast_params()).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn invalid_kdf_params_are_rejected() {
        let params = KdfParams {
            memory_cost: 1,
            time_cost: 0,
            parallelism: 0,
        };
        let err = derive_key("pw", &[0u8; 16], &params).unwrap_err();
        assert!(matches!(err, CoreError::Encryption(_)));
    }

    #[test]
    fn seal_then_open() {
        let sealed = encryption::seal(b"hello", "pw", fast_params()).unwrap();
        assert_ne!(sealed.ciphertext, b"hello");
        assert_eq!(encryption::open(&sealed, "pw").unwrap(), b"hello");
    }

    #[test]
    fn wrong_password_fails_with_decryption() {
        let sealed = encryption::seal(b"hello", "pw", fast_params()).unwrap();
        assert!(matches!(
            encryption::open(&sealed, "wrong"),
            Err(CoreError::Decryption)
        ));
    }

    #[test]
    fn fresh_salt_and_nonce_each_time() {
        let a = encryption::seal(b"same", "pw", fast_params()).unwrap();
        let b = encryption::seal(b"same", "pw", fast_params()).unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.nonce, b.nonce);
    }
}

// ═══════════════════════════════════════════════════════════════════
// File format
// ═══════════════════════════════════════════════════════════════════

mod file_format {
    use super::*;

    fn encoded() -> Vec<u8> {
        let sealed = encryption::seal(b"payload", "pw", fast_params()).unwrap();
        format::encode(&sealed)
    }

    #[test]
    fn header_layout() {
        let bytes = encoded();
        assert_eq!(&bytes[..4], MAGIC);
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), CURRENT_VERSION);
        assert!(bytes.len() > HEADER_SIZE);
    }

    #[test]
    fn decode_roundtrip() {
        let sealed = encryption::seal(b"payload", "pw", fast_params()).unwrap();
        let decoded = format::decode(&format::encode(&sealed)).unwrap();
        assert_eq!(decoded.salt, sealed.salt);
        assert_eq!(decoded.nonce, sealed.nonce);
        assert_eq!(decoded.kdf_params, sealed.kdf_params);
        assert_eq!(decoded.ciphertext, sealed.ciphertext);
    }

    #[test]
    fn too_small() {
        assert!(matches!(
            format::decode(&[0u8; 10]),
            Err(CoreError::InvalidFileFormat(_))
        ));
    }

    #[test]
    fn bad_magic() {
        let mut bytes = encoded();
        bytes[0] = b'X';
        assert!(matches!(
            format::decode(&bytes),
            Err(CoreError::InvalidFileFormat(_))
        ));
    }

    #[test]
    fn future_version() {
        let mut bytes = encoded();
        bytes[4..6].copy_from_slice(&(CURRENT_VERSION + 1).to_le_bytes());
        assert!(matches!(
            format::decode(&bytes),
            Err(CoreError::UnsupportedVersion(v)) if v == u32::from(CURRENT_VERSION + 1)
        ));
    }

    #[test]
    fn hostile_kdf_params() {
        let mut bytes = encoded();
        bytes[6..10].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            format::decode(&bytes),
            Err(CoreError::InvalidFileFormat(_))
        ));
    }

    #[test]
    fn truncated_ciphertext() {
        let mut bytes = encoded();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(
            format::decode(&bytes),
            Err(CoreError::InvalidFileFormat(_))
        ));
    }
}

// ═══════════════════════════════════════════════════════════════════
// StorageManager
// ═══════════════════════════════════════════════════════════════════

mod manager {
    use super::*;

    #[test]
    fn bytes_roundtrip() {
        let snapshot = sample_snapshot();
        let bytes = StorageManager::save_with_params(&snapshot, "pw", fast_params()).unwrap();
        let loaded = StorageManager::load_from_bytes(&bytes, "pw").unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn wrong_password() {
        let bytes =
            StorageManager::save_with_params(&sample_snapshot(), "pw", fast_params()).unwrap();
        assert!(matches!(
            StorageManager::load_from_bytes(&bytes, "nope"),
            Err(CoreError::Decryption)
        ));
    }

    #[test]
    fn tampered_ciphertext() {
        let mut bytes =
            StorageManager::save_with_params(&sample_snapshot(), "pw", fast_params()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(
            StorageManager::load_from_bytes(&bytes, "pw"),
            Err(CoreError::Decryption)
        ));
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.ftdb");
        assert!(matches!(
            StorageManager::load_from_file(path.to_str().unwrap(), "pw"),
            Err(CoreError::FileIO(_))
        ));
    }
}

// ═══════════════════════════════════════════════════════════════════
// LocalRepository persistence
// ═══════════════════════════════════════════════════════════════════

mod repository_persistence {
    use super::*;

    #[tokio::test]
    async fn file_roundtrip_keeps_records() {
        let repo = LocalRepository::new();
        let created = repo
            .create_holding(NewHolding::stock("AAPL", "Apple").with_position(10.0, 1500.0))
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portfolio.ftdb");
        let path = path.to_str().unwrap();
        repo.save_to_file(path, "secret").unwrap();

        let loaded = LocalRepository::load_from_file(path, "secret").unwrap();
        let holding = loaded.get_holding(created.id).await.unwrap();
        assert_eq!(holding.quantity, 10.0);
        assert_eq!(loaded.list_transactions(Some(created.id)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bytes_roundtrip_with_wrong_password_fails() {
        let repo = LocalRepository::new();
        let bytes = repo.save_to_bytes("secret").unwrap();
        assert!(matches!(
            LocalRepository::load_from_bytes(&bytes, "guess"),
            Err(CoreError::Decryption)
        ));
    }
}
