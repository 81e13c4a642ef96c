use crate::errors::CoreError;
use super::encryption::{KdfParams, Sealed};

/// Magic bytes identifying a Finance Tracker database snapshot.
pub const MAGIC: &[u8; 4] = b"FTDB";

/// Current snapshot file version.
pub const CURRENT_VERSION: u16 = 1;

/// magic(4) + version(2) + kdf_params(12) + salt(16) + nonce(12) + ciphertext_len(8)
pub const HEADER_SIZE: usize = 54;

/// Encode a sealed snapshot.
///
/// Layout (integers little-endian):
/// ```text
/// [FTDB: 4B] [version: 2B] [memory_cost: 4B] [time_cost: 4B]
/// [parallelism: 4B] [salt: 16B] [nonce: 12B] [ciphertext_len: 8B]
/// [ciphertext: variable]
/// ```
pub fn encode(sealed: &Sealed) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + sealed.ciphertext.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&CURRENT_VERSION.to_le_bytes());
    buf.extend_from_slice(&sealed.kdf_params.memory_cost.to_le_bytes());
    buf.extend_from_slice(&sealed.kdf_params.time_cost.to_le_bytes());
    buf.extend_from_slice(&sealed.kdf_params.parallelism.to_le_bytes());
    buf.extend_from_slice(&sealed.salt);
    buf.extend_from_slice(&sealed.nonce);
    buf.extend_from_slice(&(sealed.ciphertext.len() as u64).to_le_bytes());
    buf.extend_from_slice(&sealed.ciphertext);
    buf
}

/// Sequential reader over the header bytes.
struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn take<const N: usize>(&mut self, what: &str) -> Result<[u8; N], CoreError> {
        let end = self.offset + N;
        let bytes: [u8; N] = self
            .data
            .get(self.offset..end)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| CoreError::InvalidFileFormat(format!("Failed to read {what}")))?;
        self.offset = end;
        Ok(bytes)
    }

    fn u32(&mut self, what: &str) -> Result<u32, CoreError> {
        self.take::<4>(what).map(u32::from_le_bytes)
    }
}

/// Decode and sanity-check a snapshot file.
pub fn decode(data: &[u8]) -> Result<Sealed, CoreError> {
    if data.len() < HEADER_SIZE {
        return Err(CoreError::InvalidFileFormat(
            "File too small to be a Finance Tracker snapshot".into(),
        ));
    }

    let mut cursor = Cursor { data, offset: 0 };
    if &cursor.take::<4>("magic")? != MAGIC {
        return Err(CoreError::InvalidFileFormat(
            "Invalid magic bytes — not a Finance Tracker snapshot".into(),
        ));
    }

    let version = u16::from_le_bytes(cursor.take::<2>("version")?);
    if version == 0 || version > CURRENT_VERSION {
        return Err(CoreError::UnsupportedVersion(u32::from(version)));
    }

    let kdf_params = KdfParams {
        memory_cost: cursor.u32("KDF memory_cost")?,
        time_cost: cursor.u32("KDF time_cost")?,
        parallelism: cursor.u32("KDF parallelism")?,
    };
    // Bound the KDF cost so a crafted file cannot exhaust memory or CPU.
    if !(8..=1_048_576).contains(&kdf_params.memory_cost)
        || !(1..=20).contains(&kdf_params.time_cost)
        || !(1..=16).contains(&kdf_params.parallelism)
    {
        return Err(CoreError::InvalidFileFormat(format!(
            "KDF parameters out of safe range: {kdf_params:?}"
        )));
    }

    let salt = cursor.take::<16>("salt")?;
    let nonce = cursor.take::<12>("nonce")?;
    let ciphertext_len = u64::from_le_bytes(cursor.take::<8>("ciphertext length")?) as usize;

    let ciphertext = data
        .get(cursor.offset..cursor.offset.saturating_add(ciphertext_len))
        .ok_or_else(|| {
            CoreError::InvalidFileFormat(format!(
                "File truncated: expected {} bytes of ciphertext, got {}",
                ciphertext_len,
                data.len() - cursor.offset
            ))
        })?;

    Ok(Sealed {
        kdf_params,
        salt,
        nonce,
        ciphertext: ciphertext.to_vec(),
    })
}
