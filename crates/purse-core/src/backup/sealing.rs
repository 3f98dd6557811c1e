//! Payload sealing with AES-256-GCM under an Argon2id-derived key.
//!
//! The key is derived from the caller's identity key over a fresh salt for
//! every backup. The user id is bound as associated data, so a sealed payload
//! copied under another user's document fails to open.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::{BackupError, RecordCounts};

/// Cipher identifier written into sealed payloads
pub const SEALING_ALGORITHM: &str = "aes-256-gcm";
const KDF_ALGORITHM: &str = "argon2id";

const KEY_LEN: usize = 32;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;

/// Ceilings on the cost accepted from a fetched document
const MAX_MEMORY_KIB: u32 = 64 * 1024;
const MAX_ITERATIONS: u32 = 8;
const MAX_PARALLELISM: u32 = 4;

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    #[must_use]
    pub const fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism,
        }
    }

    fn argon2(self) -> Result<Argon2<'static>, BackupError> {
        if self.memory_kib > MAX_MEMORY_KIB
            || self.iterations > MAX_ITERATIONS
            || self.parallelism > MAX_PARALLELISM
        {
            return Err(BackupError::Sealing(format!(
                "key derivation cost exceeds limit (memory {} KiB, {} iterations, parallelism {})",
                self.memory_kib, self.iterations, self.parallelism
            )));
        }
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| BackupError::Sealing(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KdfDescriptor {
    pub algorithm: String,
    #[serde(flatten)]
    pub params: KdfParams,
}

/// Sealed snapshot as stored inside the envelope payload.
///
/// Binary fields are standard base64. `counts` stays readable so backup info
/// can be reported without the identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedPayload {
    pub algorithm: String,
    pub kdf: KdfDescriptor,
    pub salt: String,
    pub nonce: String,
    pub ciphertext: String,
    pub counts: RecordCounts,
}

impl SealedPayload {
    /// Encrypt `plaintext` for `user_id` under a key derived from `identity_key`.
    pub fn seal(
        plaintext: &[u8],
        identity_key: &str,
        user_id: &str,
        kdf: KdfParams,
        counts: RecordCounts,
    ) -> Result<Self, BackupError> {
        let mut salt = [0_u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let mut nonce = [0_u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let mut key = derive_key(identity_key, &salt, kdf)?;
        let sealed = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| BackupError::Sealing(e.to_string()))
            .and_then(|cipher| {
                cipher
                    .encrypt(
                        Nonce::from_slice(&nonce),
                        Payload {
                            msg: plaintext,
                            aad: user_id.as_bytes(),
                        },
                    )
                    .map_err(|_| BackupError::Sealing("encryption failed".to_string()))
            });
        key.zeroize();

        Ok(Self {
            algorithm: SEALING_ALGORITHM.to_string(),
            kdf: KdfDescriptor {
                algorithm: KDF_ALGORITHM.to_string(),
                params: kdf,
            },
            salt: STANDARD.encode(salt),
            nonce: STANDARD.encode(nonce),
            ciphertext: STANDARD.encode(sealed?),
            counts,
        })
    }

    /// Decrypt and authenticate the payload for `user_id`.
    pub fn unseal(&self, identity_key: &str, user_id: &str) -> Result<Vec<u8>, BackupError> {
        if self.algorithm != SEALING_ALGORITHM {
            return Err(BackupError::Sealing(format!(
                "unsupported cipher {}",
                self.algorithm
            )));
        }
        if self.kdf.algorithm != KDF_ALGORITHM {
            return Err(BackupError::Sealing(format!(
                "unsupported key derivation {}",
                self.kdf.algorithm
            )));
        }

        let salt: [u8; SALT_LEN] = decode_fixed(&self.salt, "salt")?;
        let nonce: [u8; NONCE_LEN] = decode_fixed(&self.nonce, "nonce")?;
        let ciphertext = STANDARD
            .decode(&self.ciphertext)
            .map_err(|e| BackupError::Sealing(format!("ciphertext is not base64: {e}")))?;

        let mut key = derive_key(identity_key, &salt, self.kdf.params)?;
        let opened = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| BackupError::Sealing(e.to_string()))
            .and_then(|cipher| {
                cipher
                    .decrypt(
                        Nonce::from_slice(&nonce),
                        Payload {
                            msg: &ciphertext,
                            aad: user_id.as_bytes(),
                        },
                    )
                    .map_err(|_| {
                        BackupError::Sealing(
                            "payload could not be opened with this identity key".to_string(),
                        )
                    })
            });
        key.zeroize();
        opened
    }
}

fn derive_key(
    identity_key: &str,
    salt: &[u8; SALT_LEN],
    kdf: KdfParams,
) -> Result<[u8; KEY_LEN], BackupError> {
    if identity_key.is_empty() {
        return Err(BackupError::Sealing(
            "identity key must not be empty".to_string(),
        ));
    }
    let mut key = [0_u8; KEY_LEN];
    kdf.argon2()?
        .hash_password_into(identity_key.as_bytes(), salt, &mut key)
        .map_err(|e| BackupError::Sealing(e.to_string()))?;
    Ok(key)
}

fn decode_fixed<const N: usize>(encoded: &str, field: &str) -> Result<[u8; N], BackupError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| BackupError::Sealing(format!("{field} is not base64: {e}")))?;
    <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| {
        BackupError::Sealing(format!(
            "{field} must be {N} bytes, got {}",
            bytes.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHEAP: KdfParams = KdfParams::new(64, 1, 1);

    fn sealed(plaintext: &[u8]) -> SealedPayload {
        SealedPayload::seal(plaintext, "correct horse", "user-1", CHEAP, RecordCounts::default())
            .unwrap()
    }

    #[test]
    fn seal_then_unseal_returns_plaintext() {
        let payload = sealed(b"{\"ledgerEntries\":[]}");
        assert_eq!(payload.algorithm, SEALING_ALGORITHM);
        assert_eq!(payload.kdf.algorithm, "argon2id");

        let opened = payload.unseal("correct horse", "user-1").unwrap();
        assert_eq!(opened, b"{\"ledgerEntries\":[]}");
    }

    #[test]
    fn wrong_identity_key_fails() {
        let payload = sealed(b"secret");
        let error = payload.unseal("wrong", "user-1").unwrap_err();
        assert!(matches!(error, BackupError::Sealing(_)));
    }

    #[test]
    fn payload_is_bound_to_user_id() {
        let payload = sealed(b"secret");
        assert!(payload.unseal("correct horse", "user-2").is_err());
    }

    #[test]
    fn fresh_salt_and_nonce_per_seal() {
        let first = sealed(b"same");
        let second = sealed(b"same");
        assert_ne!(first.salt, second.salt);
        assert_ne!(first.nonce, second.nonce);
        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[test]
    fn empty_identity_key_is_rejected() {
        let result = SealedPayload::seal(b"x", "", "user-1", CHEAP, RecordCounts::default());
        assert!(matches!(result, Err(BackupError::Sealing(_))));
    }

    #[test]
    fn tampered_nonce_length_is_rejected() {
        let mut payload = sealed(b"secret");
        payload.nonce = STANDARD.encode([0_u8; 4]);
        let error = payload.unseal("correct horse", "user-1").unwrap_err();
        assert!(error.to_string().contains("nonce must be 12 bytes"));
    }

    #[test]
    fn excessive_memory_cost_is_rejected() {
        let mut payload = sealed(b"secret");
        payload.kdf.params.memory_kib = u32::MAX;
        assert!(payload.unseal("correct horse", "user-1").is_err());
    }

    #[test]
    fn excessive_time_cost_is_rejected() {
        let mut payload = sealed(b"secret");
        payload.kdf.params.iterations = u32::MAX;
        let error = payload.unseal("correct horse", "user-1").unwrap_err();
        assert!(error.to_string().contains("exceeds limit"));

        let mut payload = sealed(b"secret");
        payload.kdf.params.parallelism = 64;
        assert!(payload.unseal("correct horse", "user-1").is_err());
    }

    #[test]
    fn default_cost_is_within_limits() {
        assert!(KdfParams::default().argon2().is_ok());
    }

    #[test]
    fn wire_format_flattens_kdf_params() {
        let value = serde_json::to_value(sealed(b"x")).unwrap();
        assert_eq!(value["kdf"]["algorithm"], "argon2id");
        assert_eq!(value["kdf"]["memoryKib"], 64);
        assert_eq!(value["kdf"]["iterations"], 1);
        assert!(value["counts"].get("hasSavingsTarget").is_some());
    }
}
