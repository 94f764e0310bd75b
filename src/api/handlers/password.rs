//! Argon2id password hashing.
//!
//! Hashing and verification are CPU bound and run on the blocking pool.

use anyhow::{anyhow, Context, Result};
use argon2::{
    password_hash::{self, SaltString},
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
};
use rand::rngs::OsRng;

const DUMMY_PASSWORD: &str = "oth-dummy-password";

pub struct Hasher {
    params: Params,
    dummy_hash: String,
}

impl std::fmt::Debug for Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hasher")
            .field("memory_kib", &self.params.m_cost())
            .field("iterations", &self.params.t_cost())
            .finish_non_exhaustive()
    }
}

impl Hasher {
    /// Build a hasher and precompute the hash used for unknown accounts.
    ///
    /// # Errors
    /// Returns an error if the parameters are out of range for Argon2.
    pub fn new(memory_kib: u32, iterations: u32) -> Result<Self> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|err| anyhow!("invalid Argon2 parameters: {err}"))?;
        let dummy_hash = hash_with(&params, DUMMY_PASSWORD)?;
        Ok(Self { params, dummy_hash })
    }

    /// Hash with a fresh random salt, returning the PHC string.
    ///
    /// # Errors
    /// Returns an error if hashing fails or the blocking task panics.
    pub async fn hash(&self, password: String) -> Result<String> {
        let params = self.params.clone();
        tokio::task::spawn_blocking(move || hash_with(&params, &password))
            .await
            .context("password hashing task failed")?
    }

    /// Verify `password` against a PHC string in constant time.
    ///
    /// # Errors
    /// Returns an error if the stored hash is malformed or the task panics.
    pub async fn verify(&self, password: String, phc: String) -> Result<bool> {
        tokio::task::spawn_blocking(move || verify_with(&password, &phc))
            .await
            .context("password verification task failed")?
    }

    /// Hash verified when the account does not exist, so both paths cost the same.
    #[must_use]
    pub fn dummy_hash(&self) -> &str {
        &self.dummy_hash
    }
}

fn hash_with(params: &Params, password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone());
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?
        .to_string();
    Ok(hash)
}

fn verify_with(password: &str, phc: &str) -> Result<bool> {
    let parsed = PasswordHash::new(phc).map_err(|err| anyhow!("invalid password hash: {err}"))?;
    // Parameters come from the PHC string, not from the current configuration.
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(err) => Err(anyhow!("failed to verify password: {err}")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cheap_hasher() -> Hasher {
        Hasher::new(8, 1).unwrap()
    }

    #[tokio::test]
    async fn hash_and_verify_round_trip() {
        let hasher = cheap_hasher();
        let hash = hasher.hash("correct horse".to_string()).await.unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher
            .verify("correct horse".to_string(), hash.clone())
            .await
            .unwrap());
        assert!(!hasher.verify("wrong".to_string(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn same_password_gets_distinct_salts() {
        let hasher = cheap_hasher();
        let first = hasher.hash("pw".to_string()).await.unwrap();
        let second = hasher.hash("pw".to_string()).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn dummy_hash_rejects_its_users() {
        let hasher = cheap_hasher();
        let dummy = hasher.dummy_hash().to_string();
        assert!(!hasher.verify("anything".to_string(), dummy).await.unwrap());
    }

    #[tokio::test]
    async fn hashes_from_other_params_still_verify() {
        let old = Hasher::new(16, 2).unwrap();
        let hash = old.hash("pw".to_string()).await.unwrap();
        let current = cheap_hasher();
        assert!(current.verify("pw".to_string(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_hash_is_an_error() {
        let hasher = cheap_hasher();
        assert!(hasher
            .verify("pw".to_string(), "not-a-phc".to_string())
            .await
            .is_err());
    }

    #[test]
    fn debug_hides_dummy_hash() {
        let hasher = cheap_hasher();
        let debug = format!("{hasher:?}");
        assert!(!debug.contains("$argon2id$"));
    }
}
