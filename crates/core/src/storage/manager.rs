use crate::errors::CoreError;
use crate::models::snapshot::DataSnapshot;

use super::encryption::{self, KdfParams};
use super::format;

/// Save/load a whole database snapshot to/from encrypted bytes or files.
pub struct StorageManager;

impl StorageManager {
    /// DataSnapshot → bincode → AES-256-GCM(Argon2id(password)) → FTDB bytes
    pub fn save_to_bytes(snapshot: &DataSnapshot, password: &str) -> Result<Vec<u8>, CoreError> {
        Self::save_with_params(snapshot, password, KdfParams::default())
    }

    /// Same as `save_to_bytes` with explicit KDF cost (cheap params keep tests fast).
    pub fn save_with_params(
        snapshot: &DataSnapshot,
        password: &str,
        kdf_params: KdfParams,
    ) -> Result<Vec<u8>, CoreError> {
        let plaintext = bincode::serialize(snapshot)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize snapshot: {e}")))?;
        let sealed = encryption::seal(&plaintext, password, kdf_params)?;
        Ok(format::encode(&sealed))
    }

    /// FTDB bytes → header → Argon2id(password, salt) → AES-256-GCM → bincode → DataSnapshot
    pub fn load_from_bytes(data: &[u8], password: &str) -> Result<DataSnapshot, CoreError> {
        let sealed = format::decode(data)?;
        let plaintext = encryption::open(&sealed, password)?;
        bincode::deserialize(&plaintext)
            .map_err(|e| CoreError::Deserialization(format!("Failed to deserialize snapshot: {e}")))
    }

    /// Save a snapshot to an encrypted file on disk (native only).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to_file(snapshot: &DataSnapshot, path: &str, password: &str) -> Result<(), CoreError> {
        let bytes = Self::save_to_bytes(snapshot, password)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Load a snapshot from an encrypted file on disk (native only).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_file(path: &str, password: &str) -> Result<DataSnapshot, CoreError> {
        let bytes = std::fs::read(path)?;
        Self::load_from_bytes(&bytes, password)
    }
}
