//! Argon2id password hashing.
//!
//! Hashing and verification are CPU bound, so both run on the blocking pool.

use aes_gcm::aead::OsRng;
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use tracing::debug;

use crate::error::RegistryError;

#[derive(Debug, Clone)]
pub struct Argon2Config {
    /// Memory cost in KiB
    pub memory_cost: u32,
    /// Iterations
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory_cost: 19 * 1024,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

impl Argon2Config {
    /// Low memory config for tests.
    pub fn testing() -> Self {
        Self {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }
}

#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
}

impl PasswordService {
    pub fn new(config: &Argon2Config) -> Result<Self, RegistryError> {
        let params = Params::new(config.memory_cost, config.time_cost, config.parallelism, None)
            .map_err(|e| RegistryError::PasswordHash(format!("invalid argon2 params: {e}")))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub async fn hash(&self, password: &str) -> Result<String, RegistryError> {
        let argon2 = self.argon2.clone();
        let password = password.to_owned();
        let hash = tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(password.as_bytes(), &salt)
                .map(|h| h.to_string())
        })
        .await
        .map_err(|e| RegistryError::PasswordHash(e.to_string()))?
        .map_err(|e| RegistryError::PasswordHash(e.to_string()))?;
        debug!("password hashed");
        Ok(hash)
    }

    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool, RegistryError> {
        let argon2 = self.argon2.clone();
        let password = password.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&hash)
                .map_err(|e| RegistryError::PasswordHash(format!("invalid stored hash: {e}")))?;
            match argon2.verify_password(password.as_bytes(), &parsed) {
                Ok(()) => Ok(true),
                Err(argon2::password_hash::Error::Password) => Ok(false),
                Err(e) => Err(RegistryError::PasswordHash(e.to_string())),
            }
        })
        .await
        .map_err(|e| RegistryError::PasswordHash(e.to_string()))?
    }
}
