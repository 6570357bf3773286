/// Password hashing and verification
use crate::error::{ApiError, ApiResult};

/// Lowest bcrypt work factor the service accepts
pub const MIN_COST: u32 = 4;
/// Highest bcrypt work factor the service accepts
pub const MAX_COST: u32 = 31;

/// bcrypt only reads the first 72 bytes of its input
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Salt and hash of a digest no password is expected to match
const DECOY_SALT_AND_HASH: &str = "L6Bc/AlTQHyd9liGgGEZyOFLPHNgyxeEPfgYfBCVxJ7JIlwxyVU3u";

/// Salted adaptive one-way password hashing
#[derive(Debug, Clone, Copy)]
pub struct PasswordVault {
    cost: u32,
}

impl Default for PasswordVault {
    fn default() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl PasswordVault {
    pub fn new(cost: u32) -> Self {
        Self {
            cost: cost.clamp(MIN_COST, MAX_COST),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Reject input bcrypt cannot hash in full
    pub fn check_length(plaintext: &str) -> ApiResult<()> {
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return Err(ApiError::Validation(format!(
                "Password must be at most {} bytes",
                MAX_PASSWORD_BYTES
            )));
        }
        Ok(())
    }

    /// Hash a plaintext password. Each call uses a fresh salt.
    pub fn hash(&self, plaintext: &str) -> ApiResult<String> {
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return Err(ApiError::Crypto(format!(
                "password exceeds {} bytes",
                MAX_PASSWORD_BYTES
            )));
        }

        bcrypt::hash(plaintext, self.cost)
            .map_err(|e| ApiError::Crypto(format!("Failed to hash password: {}", e)))
    }

    /// Check a plaintext password against a stored digest.
    ///
    /// A malformed digest never matches.
    pub fn verify(&self, plaintext: &str, digest: &str) -> bool {
        match bcrypt::verify(plaintext, digest) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!(error = %e, "stored password digest could not be parsed");
                false
            }
        }
    }

    /// Well-formed digest at this vault's cost, verified against when an
    /// account does not exist so both login failures cost the same
    pub fn decoy_digest(&self) -> String {
        format!("$2b${:02}${}", self.cost, DECOY_SALT_AND_HASH)
    }

    /// Hash on the blocking pool
    pub async fn hash_blocking(&self, plaintext: String) -> ApiResult<String> {
        let vault = *self;
        tokio::task::spawn_blocking(move || vault.hash(&plaintext))
            .await
            .map_err(|e| ApiError::Internal(format!("Hashing task failed: {}", e)))?
    }

    /// Verify on the blocking pool
    pub async fn verify_blocking(&self, plaintext: String, digest: String) -> ApiResult<bool> {
        let vault = *self;
        tokio::task::spawn_blocking(move || vault.verify(&plaintext, &digest))
            .await
            .map_err(|e| ApiError::Internal(format!("Verification task failed: {}", e)))
    }
}
