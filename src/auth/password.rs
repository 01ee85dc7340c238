//! Password hashing and verification using Argon2id

use crate::{config::SecurityConfig, error::AppError, validation::FieldError};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;

/// Password hasher with configurable parameters
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    /// Create hasher from the security section of the configuration
    ///
    /// Defaults follow the OWASP recommendation: m=64MiB, t=3 iterations, p=4 lanes.
    pub fn from_config(config: &SecurityConfig) -> Result<Self, AppError> {
        let params = Params::new(
            config.argon2_memory_kib,
            config.argon2_iterations,
            config.argon2_parallelism,
            None,
        )
        .map_err(|e| AppError::Config(format!("Invalid Argon2 params: {}", e)))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a password
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                tracing::error!("Failed to hash password: {:?}", e);
                AppError::Internal(format!("Failed to hash password: {}", e))
            })?
            .to_string();

        Ok(password_hash)
    }

    /// Verify a password against a hash
    ///
    /// Unparseable hashes (such as the `!` placeholder of accounts that
    /// cannot log in) are treated as a failed verification.
    pub fn verify(&self, password: &str, hash: &str) -> Result<(), AppError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|e| {
            tracing::debug!("Failed to parse password hash: {:?}", e);
            AppError::Unauthorized
        })?;

        self.argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| AppError::Unauthorized)
    }

    /// Validate password against policy
    pub fn password_policy(password: &str, policy: &SecurityConfig) -> Vec<FieldError> {
        let mut errors = Vec::new();

        if password.chars().count() < policy.password_min_length {
            errors.push(FieldError::new(
                "password",
                "min_length",
                format!(
                    "password must be at least {} characters",
                    policy.password_min_length
                ),
            ));
        }

        if policy.password_require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            errors.push(FieldError::new(
                "password",
                "uppercase",
                "password must contain at least one uppercase letter",
            ));
        }

        if policy.password_require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            errors.push(FieldError::new(
                "password",
                "digit",
                "password must contain at least one digit",
            ));
        }

        if policy.password_require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
            errors.push(FieldError::new(
                "password",
                "special",
                "password must contain at least one special character",
            ));
        }

        errors
    }
}
