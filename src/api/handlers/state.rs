//! Auth configuration and the shared state injected into handlers.

use anyhow::Result;

use super::password::Hasher;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
/// Ten years. Keeps `now + ttl` inside SQLite's integer range.
pub const MAX_SESSION_TTL_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;
pub const DEFAULT_HASH_MEMORY_KIB: u32 = 19 * 1024;
pub const DEFAULT_HASH_ITERATIONS: u32 = 2;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    session_ttl_seconds: i64,
    secure_cookies: bool,
    hash_memory_kib: u32,
    hash_iterations: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            secure_cookies: false,
            hash_memory_kib: DEFAULT_HASH_MEMORY_KIB,
            hash_iterations: DEFAULT_HASH_ITERATIONS,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds.clamp(1, MAX_SESSION_TTL_SECONDS);
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn with_hash_memory_kib(mut self, memory_kib: u32) -> Self {
        self.hash_memory_kib = memory_kib;
        self
    }

    #[must_use]
    pub fn with_hash_iterations(mut self, iterations: u32) -> Self {
        self.hash_iterations = iterations;
        self
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.secure_cookies
    }

    #[must_use]
    pub fn hash_memory_kib(&self) -> u32 {
        self.hash_memory_kib
    }

    #[must_use]
    pub fn hash_iterations(&self) -> u32 {
        self.hash_iterations
    }
}

/// Immutable state shared by the public handlers.
#[derive(Debug)]
pub struct AuthState {
    config: AuthConfig,
    hasher: Hasher,
}

impl AuthState {
    /// Build the state, validating the hash parameters.
    ///
    /// # Errors
    /// Returns an error if the Argon2 parameters are rejected.
    pub fn new(config: AuthConfig) -> Result<Self> {
        let hasher = Hasher::new(config.hash_memory_kib(), config.hash_iterations())?;
        Ok(Self { config, hasher })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn hasher(&self) -> &Hasher {
        &self.hasher
    }
}
