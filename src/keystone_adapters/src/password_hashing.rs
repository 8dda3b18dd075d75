use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordVerifier, Version,
    password_hash::{self, PasswordHasher, SaltString, rand_core},
};
use keystone_core::Password;
use secrecy::{ExposeSecret, Secret};
use thiserror::Error;

use crate::config::PasswordHashingSettings;

#[derive(Debug, Error)]
pub enum PasswordHashingError {
    #[error("Password does not match")]
    Mismatch,
    #[error("Invalid hashing parameters: {0}")]
    InvalidParams(#[from] argon2::Error),
    #[error("Password hashing failed: {0}")]
    Hash(password_hash::Error),
    #[error("Password hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Argon2id with a random salt per hash. Hashing and verification are run on
/// the blocking pool so they never stall the async executor.
#[derive(Debug, Clone)]
pub struct Argon2PasswordHasher {
    params: Params,
}

impl Argon2PasswordHasher {
    pub fn new(settings: &PasswordHashingSettings) -> Result<Self, PasswordHashingError> {
        let params = Params::new(
            settings.memory_kib,
            settings.iterations,
            settings.parallelism,
            None,
        )?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    #[tracing::instrument(name = "Computing password hash", skip_all)]
    pub async fn compute_password_hash(
        &self,
        password: Password,
    ) -> Result<Secret<String>, PasswordHashingError> {
        let current_span: tracing::Span = tracing::Span::current();
        let hasher = self.argon2();

        tokio::task::spawn_blocking(move || {
            current_span.in_scope(move || {
                let salt = SaltString::generate(rand_core::OsRng);
                hasher
                    .hash_password(password.as_ref().expose_secret().as_bytes(), &salt)
                    .map(|hash| Secret::new(hash.to_string()))
                    .map_err(PasswordHashingError::Hash)
            })
        })
        .await?
    }

    /// The cost parameters are read from `expected_password_hash`, so hashes
    /// made under older settings still verify.
    #[tracing::instrument(name = "Verify password hash", skip_all)]
    pub async fn verify_password_hash(
        &self,
        expected_password_hash: Secret<String>,
        password_candidate: Password,
    ) -> Result<(), PasswordHashingError> {
        let current_span: tracing::Span = tracing::Span::current();
        let verifier = self.argon2();

        tokio::task::spawn_blocking(move || {
            current_span.in_scope(move || {
                let expected_password_hash = PasswordHash::new(expected_password_hash.expose_secret())
                    .map_err(PasswordHashingError::Hash)?;

                verifier
                    .verify_password(
                        password_candidate.as_ref().expose_secret().as_bytes(),
                        &expected_password_hash,
                    )
                    .map_err(|e| match e {
                        password_hash::Error::Password => PasswordHashingError::Mismatch,
                        other => PasswordHashingError::Hash(other),
                    })
            })
        })
        .await?
    }
}
