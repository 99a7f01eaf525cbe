use argon2::{
    Argon2,
    password_hash::{
        self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use serde::{Deserialize, Deserializer, de::Error as DeError};
use std::fmt::{Debug, Formatter};
use thiserror::Error;

pub const PASSWORD_MIN_LEN: usize = 6;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Password hashing failed: {0}")]
pub struct PasswordHashingError(password_hash::Error);

/// A plaintext password that passed the minimum-length check. Only ever held
/// transiently; what gets stored is the argon2 PHC string.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Password(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The password is shorter than {PASSWORD_MIN_LEN} characters")]
pub struct WeakPasswordError;

impl Password {
    pub fn new(password: String) -> Result<Self, WeakPasswordError> {
        if password.chars().count() >= PASSWORD_MIN_LEN {
            Ok(Password(password))
        } else {
            Err(WeakPasswordError)
        }
    }

    pub fn hash(&self) -> Result<String, PasswordHashingError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(self.0.as_bytes(), &salt)
            .map_err(PasswordHashingError)?;

        Ok(hash.to_string())
    }
}

impl Debug for Password {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Password").field(&"[redacted]").finish()
    }
}

impl<'de> Deserialize<'de> for Password {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Password::new(inner).map_err(DeError::custom)
    }
}

/// Checks a login attempt against a stored PHC hash. A malformed stored hash
/// is an error, a mismatching password is `Ok(false)`.
pub fn verify_password(attempt: &str, stored_hash: &str) -> Result<bool, PasswordHashingError> {
    let parsed = PasswordHash::new(stored_hash).map_err(PasswordHashingError)?;

    match Argon2::default().verify_password(attempt.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(err) => Err(PasswordHashingError(err)),
    }
}
