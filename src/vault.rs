//! Encrypted signature storage
//!
//! Signature blobs are AES-256-GCM encrypted at rest and decrypted only in
//! memory. The key is derived once at construction from a process secret
//! and a fixed salt; the authentication tag is stored separately from the
//! ciphertext so tampering is detected at retrieve time.

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ConformaError, ConformaResult};
use crate::logger::{LogLevel, LOGGER};
use crate::pdf::SignatureKind;
use crate::store::SignatureRepository;

// Constants
const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;
const TAG_SIZE: usize = 16;
const PBKDF2_ITERATIONS: u32 = 600_000; // OWASP recommendation for 2024
const KEY_SALT: &[u8] = b"conforma-signature-vault-v1";

/// Plausibility floor for a decrypted signature artifact
///
/// Anything smaller cannot be a real PNG/JPEG/PDF; this is a sanity check,
/// not a format check.
const MIN_SIGNATURE_BYTES: usize = 100;

/// One enrolled signature as persisted at rest
#[derive(Debug, Clone)]
pub struct StoredSignature {
    pub id: Uuid,

    /// Staff id of the sole owner
    pub owner_id: String,

    pub kind: SignatureKind,

    /// Cipher identifier, e.g. "AES-256-GCM"
    pub algorithm: String,

    pub nonce: Vec<u8>,
    pub tag: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

impl StoredSignature {
    /// One-line summary for debug logs; never exposes plaintext
    pub fn describe(&self) -> String {
        format!(
            "signature {} owner={} kind={} alg={} nonce={} tag={} ({} ciphertext bytes)",
            self.id,
            self.owner_id,
            self.kind,
            self.algorithm,
            BASE64.encode(&self.nonce),
            BASE64.encode(&self.tag),
            self.ciphertext.len()
        )
    }
}

/// Decrypted signature ready for embedding; never persisted
#[derive(Debug)]
pub struct SignatureArtifact {
    pub kind: SignatureKind,
    pub bytes: Vec<u8>,
}

/// Vault over enrolled, encrypted signatures
pub struct SignatureVault {
    cipher: Aes256Gcm,
    repository: Arc<dyn SignatureRepository>,
}

impl SignatureVault {
    /// Derive the vault key from the process secret and construct the vault
    pub fn new(secret: &str, repository: Arc<dyn SignatureRepository>) -> Self {
        let mut key_bytes = [0u8; KEY_SIZE];
        pbkdf2_hmac::<Sha256>(secret.as_bytes(), KEY_SALT, PBKDF2_ITERATIONS, &mut key_bytes);
        let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
        Self {
            cipher: Aes256Gcm::new(key),
            repository,
        }
    }

    /// Enroll a signature for an owner (one-time; read-only thereafter)
    pub fn store(
        &self,
        owner_id: &str,
        raw_bytes: &[u8],
        kind: SignatureKind,
    ) -> ConformaResult<Uuid> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let mut ciphertext = self
            .cipher
            .encrypt(nonce, raw_bytes)
            .map_err(|e| ConformaError::EncryptionFailed(e.to_string()))?;

        // AES-GCM appends the authentication tag; store it separately
        let tag = ciphertext.split_off(ciphertext.len() - TAG_SIZE);

        let signature = StoredSignature {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            kind,
            algorithm: "AES-256-GCM".to_string(),
            nonce: nonce_bytes.to_vec(),
            tag,
            ciphertext,
        };
        self.repository.save_signature(&signature)?;

        LOGGER.log(
            LogLevel::Info,
            &format!("Enrolled {} signature {} for {}", kind, signature.id, owner_id),
            "vault",
        );
        LOGGER.log(LogLevel::Debug, &signature.describe(), "vault");
        Ok(signature.id)
    }

    /// Decrypt a stored signature
    pub fn retrieve(&self, signature_id: Uuid) -> ConformaResult<SignatureArtifact> {
        let stored = self
            .repository
            .load_signature(signature_id)?
            .ok_or_else(|| ConformaError::SignatureNotFound(signature_id.to_string()))?;
        self.decrypt(&stored)
    }

    /// Decrypt a stored signature, requiring the caller to be its owner
    ///
    /// A signature owned by someone else is indistinguishable from a
    /// missing one, so both surface as NotFound.
    pub fn retrieve_for(&self, signature_id: Uuid, actor_id: &str) -> ConformaResult<SignatureArtifact> {
        let stored = self
            .repository
            .load_signature(signature_id)?
            .filter(|s| s.owner_id == actor_id)
            .ok_or_else(|| ConformaError::SignatureNotFound(signature_id.to_string()))?;
        self.decrypt(&stored)
    }

    fn decrypt(&self, stored: &StoredSignature) -> ConformaResult<SignatureArtifact> {
        let nonce = Nonce::from_slice(&stored.nonce);
        let mut ciphertext = stored.ciphertext.clone();
        ciphertext.extend_from_slice(&stored.tag);

        let bytes = self
            .cipher
            .decrypt(nonce, ciphertext.as_ref())
            .map_err(|_| {
                ConformaError::SignatureCorrupt(format!(
                    "authentication failed for signature {}",
                    stored.id
                ))
            })?;

        if bytes.len() < MIN_SIGNATURE_BYTES {
            return Err(ConformaError::SignatureCorrupt(format!(
                "signature {} decrypted to {} bytes",
                stored.id,
                bytes.len()
            )));
        }

        Ok(SignatureArtifact {
            kind: stored.kind,
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MemoryRepo {
        signatures: Mutex<HashMap<Uuid, StoredSignature>>,
    }

    impl MemoryRepo {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                signatures: Mutex::new(HashMap::new()),
            })
        }
    }

    impl SignatureRepository for MemoryRepo {
        fn save_signature(&self, signature: &StoredSignature) -> ConformaResult<()> {
            self.signatures
                .lock()
                .unwrap()
                .insert(signature.id, signature.clone());
            Ok(())
        }

        fn load_signature(&self, id: Uuid) -> ConformaResult<Option<StoredSignature>> {
            Ok(self.signatures.lock().unwrap().get(&id).cloned())
        }
    }

    fn sample_bytes() -> Vec<u8> {
        vec![0xAB; 4096]
    }

    #[test]
    fn test_store_retrieve_roundtrip() {
        let repo = MemoryRepo::new();
        let vault = SignatureVault::new("process-secret", repo.clone());

        let id = vault
            .store("u-1", &sample_bytes(), SignatureKind::RasterImage)
            .unwrap();

        let stored = repo.load_signature(id).unwrap().unwrap();
        assert_eq!(stored.algorithm, "AES-256-GCM");
        assert_eq!(stored.nonce.len(), NONCE_SIZE);
        assert_eq!(stored.tag.len(), TAG_SIZE);
        // Ciphertext at rest never equals the plaintext
        assert_ne!(stored.ciphertext, sample_bytes());

        let artifact = vault.retrieve(id).unwrap();
        assert_eq!(artifact.kind, SignatureKind::RasterImage);
        assert_eq!(artifact.bytes, sample_bytes());
    }

    #[test]
    fn test_tampered_ciphertext_is_data_corrupt() {
        let repo = MemoryRepo::new();
        let vault = SignatureVault::new("process-secret", repo.clone());
        let id = vault
            .store("u-1", &sample_bytes(), SignatureKind::EmbeddedPdfPage)
            .unwrap();

        {
            let mut map = repo.signatures.lock().unwrap();
            let stored = map.get_mut(&id).unwrap();
            stored.ciphertext[0] ^= 0xFF;
        }

        let err = vault.retrieve(id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataCorrupt);
    }

    #[test]
    fn test_implausibly_small_plaintext_is_data_corrupt() {
        let repo = MemoryRepo::new();
        let vault = SignatureVault::new("process-secret", repo);
        let id = vault
            .store("u-1", &[0x01; 20], SignatureKind::RasterImage)
            .unwrap();

        let err = vault.retrieve(id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataCorrupt);
        assert!(err.to_string().contains("20 bytes"));
    }

    #[test]
    fn test_ownership_check() {
        let repo = MemoryRepo::new();
        let vault = SignatureVault::new("process-secret", repo);
        let id = vault
            .store("u-1", &sample_bytes(), SignatureKind::RasterImage)
            .unwrap();

        assert!(vault.retrieve_for(id, "u-1").is_ok());
        let err = vault.retrieve_for(id, "u-2").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = vault.retrieve_for(Uuid::new_v4(), "u-1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_describe_shows_no_plaintext() {
        let repo = MemoryRepo::new();
        let vault = SignatureVault::new("process-secret", repo.clone());
        let id = vault
            .store("u-1", &sample_bytes(), SignatureKind::RasterImage)
            .unwrap();

        let stored = repo.load_signature(id).unwrap().unwrap();
        let line = stored.describe();
        assert!(line.contains("owner=u-1"));
        assert!(line.contains("AES-256-GCM"));
        assert!(line.contains(&BASE64.encode(&stored.nonce)));
    }

    #[test]
    fn test_wrong_secret_is_data_corrupt() {
        let repo = MemoryRepo::new();
        let vault = SignatureVault::new("secret-a", repo.clone());
        let id = vault
            .store("u-1", &sample_bytes(), SignatureKind::RasterImage)
            .unwrap();

        let other = SignatureVault::new("secret-b", repo);
        let err = other.retrieve(id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataCorrupt);
    }
}
