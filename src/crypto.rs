//! Password hashing, envelope encryption for stored secrets, and the random
//! source used for key material.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng as AeadOsRng},
};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use hkdf::Hkdf;
use rand::{RngCore, rngs::OsRng};
use sha2::Sha256;

use crate::error::{AppError, Result};

const NONCE_LEN: usize = 12;

/// Cryptographically strong byte source for key material.
pub trait RandomSource: Send + Sync {
    fn fill_bytes(&self, buf: &mut [u8]);
}

/// Reads from the operating system's CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill_bytes(&self, buf: &mut [u8]) {
        OsRng.fill_bytes(buf);
    }
}

// ============ Passwords ============

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy)]
pub struct HashParams {
    pub memory_kib: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            time_cost: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl HashParams {
    /// Cheap parameters for tests. Never use for real accounts.
    pub fn insecure_fast() -> Self {
        Self {
            memory_kib: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    fn argon2(&self) -> Result<Argon2<'static>> {
        let params = Params::new(self.memory_kib, self.time_cost, self.parallelism, None)
            .map_err(|e| AppError::Internal(format!("Invalid Argon2 params: {}", e)))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Hash a password into a PHC string. CPU-heavy: call from `spawn_blocking`.
pub fn hash_password(password: &str, params: &HashParams) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = params
        .argon2()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored PHC string. The cost parameters are
/// read from the hash itself.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(password_hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash format: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

// ============ Envelope encryption ============

/// Root key for encrypting secrets at rest. Each secret is sealed with a
/// subkey derived from the root key and a per-record context string.
#[derive(Clone)]
pub struct MasterKey([u8; 32]);

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a base64-encoded 32-byte key.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| AppError::Internal(format!("MASTER_KEY is not valid base64: {}", e)))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AppError::Internal("MASTER_KEY must decode to 32 bytes".into()))?;
        Ok(Self(bytes))
    }

    /// A fresh random key. Secrets sealed with it are lost on restart.
    pub fn ephemeral(random: &dyn RandomSource) -> Self {
        let mut bytes = [0u8; 32];
        random.fill_bytes(&mut bytes);
        Self(bytes)
    }

    fn cipher_for(&self, context: &str) -> Result<Aes256Gcm> {
        let hk = Hkdf::<Sha256>::new(Some(b"eaforge-envelope-v1"), &self.0);
        let mut okm = [0u8; 32];
        hk.expand(context.as_bytes(), &mut okm)
            .map_err(|_| AppError::Internal("Key derivation failed".into()))?;
        Ok(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&okm)))
    }

    /// Encrypt `plaintext` bound to `context`. Output is `nonce || ciphertext`.
    pub fn encrypt(&self, context: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = self.cipher_for(context)?;
        let nonce = Aes256Gcm::generate_nonce(&mut AeadOsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| AppError::Internal("Encryption failed".into()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    pub fn decrypt(&self, context: &str, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_LEN {
            return Err(AppError::Internal("Ciphertext too short".into()));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        self.cipher_for(context)?
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| AppError::Internal("Decryption failed".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_verifies() {
        let hash = hash_password("correct horse", &HashParams::insecure_fast()).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        let params = HashParams::insecure_fast();
        let a = hash_password("pw123456", &params).unwrap();
        let b = hash_password("pw123456", &params).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(verify_password("x", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_envelope_roundtrip_and_context_binding() {
        let key = MasterKey::from_bytes([7u8; 32]);
        let sealed = key.encrypt("mt5:user-1", b"hunter2").unwrap();
        assert_ne!(&sealed[NONCE_LEN..], b"hunter2");
        assert_eq!(key.decrypt("mt5:user-1", &sealed).unwrap(), b"hunter2");
        assert!(key.decrypt("mt5:user-2", &sealed).is_err());
    }

    #[test]
    fn test_master_key_from_base64_requires_32_bytes() {
        let good = BASE64.encode([1u8; 32]);
        assert!(MasterKey::from_base64(&good).is_ok());
        let short = BASE64.encode([1u8; 16]);
        assert!(MasterKey::from_base64(&short).is_err());
        assert!(MasterKey::from_base64("***").is_err());
    }
}
