// ============================
// authgate-lib/src/auth/password.rs
// ============================
//! Password hashing and verification.
//!
//! Hashes are PHC strings (`$scrypt$ln=15,r=8,p=1$<salt>$<hash>`), so the salt
//! and work factor travel with the hash and verification needs nothing else.
use crate::config::HashingSettings;
use crate::error::AppError;
use argon2::{Algorithm, Argon2, Version};
use rand::{rngs::OsRng, RngCore};
use scrypt::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Scrypt,
};
use serde::{Deserialize, Serialize};

/// Salt length in bytes
const SALT_BYTES: usize = 16;

/// Algorithm used when producing new hashes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Scrypt,
    Argon2,
}

#[derive(Clone)]
enum Params {
    Scrypt(scrypt::Params),
    Argon2(argon2::Params),
}

/// Salted one-way password hasher with a tunable work factor
#[derive(Clone)]
pub struct CredentialHasher {
    params: Params,
}

impl std::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.params {
            Params::Scrypt(p) => write!(
                f,
                "CredentialHasher(scrypt ln={} r={} p={})",
                p.log_n(),
                p.r(),
                p.p()
            ),
            Params::Argon2(p) => write!(
                f,
                "CredentialHasher(argon2id m={} t={} p={})",
                p.m_cost(),
                p.t_cost(),
                p.p_cost()
            ),
        }
    }
}

impl CredentialHasher {
    /// scrypt hasher with explicit parameters
    pub fn scrypt(log_n: u8, r: u32, p: u32) -> Result<Self, AppError> {
        let params = scrypt::Params::new(log_n, r, p, scrypt::Params::RECOMMENDED_LEN)
            .map_err(|e| AppError::Configuration(format!("invalid scrypt parameters: {e}")))?;
        Ok(Self {
            params: Params::Scrypt(params),
        })
    }

    /// Argon2id hasher with explicit parameters
    pub fn argon2(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, AppError> {
        let params = argon2::Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| AppError::Configuration(format!("invalid argon2 parameters: {e}")))?;
        Ok(Self {
            params: Params::Argon2(params),
        })
    }

    /// Build the hasher selected by configuration
    pub fn from_settings(settings: &HashingSettings) -> Result<Self, AppError> {
        match settings.algorithm {
            HashAlgorithm::Scrypt => Self::scrypt(
                settings.scrypt.log_n,
                settings.scrypt.r,
                settings.scrypt.p,
            ),
            HashAlgorithm::Argon2 => Self::argon2(
                settings.argon2.m_cost,
                settings.argon2.t_cost,
                settings.argon2.p_cost,
            ),
        }
    }

    /// Algorithm used for new hashes
    pub fn algorithm(&self) -> HashAlgorithm {
        match self.params {
            Params::Scrypt(_) => HashAlgorithm::Scrypt,
            Params::Argon2(_) => HashAlgorithm::Argon2,
        }
    }

    /// Hash a password with a fresh random salt
    pub fn hash(&self, raw: &str) -> Result<String, AppError> {
        if raw.is_empty() {
            return Err(AppError::InvalidInput("password must not be empty".to_string()));
        }

        let mut salt_bytes = [0u8; SALT_BYTES];
        OsRng.fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| AppError::Internal(format!("salt encoding failed: {e}")))?;

        let hash = match &self.params {
            Params::Scrypt(params) => Scrypt
                .hash_password_customized(raw.as_bytes(), None, None, *params, &salt)
                .map(|h| h.to_string()),
            Params::Argon2(params) => {
                Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone())
                    .hash_password(raw.as_bytes(), &salt)
                    .map(|h| h.to_string())
            },
        };

        hash.map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
    }

    /// Verify a password against a stored hash
    ///
    /// Never fails: a malformed hash simply does not match.
    pub fn verify(&self, raw: &str, hashed: &str) -> bool {
        let parsed = match PasswordHash::new(hashed) {
            Ok(h) => h,
            Err(_) => return false,
        };
        let argon2 = Argon2::default();
        let verifiers: [&dyn PasswordVerifier; 2] = [&Scrypt, &argon2];
        parsed.verify_password(&verifiers, raw.as_bytes()).is_ok()
    }

    /// Whether `hashed` parses as a PHC string this hasher can check
    pub fn is_well_formed(hashed: &str) -> bool {
        match PasswordHash::new(hashed) {
            Ok(h) => matches!(h.algorithm.as_str(), "scrypt" | "argon2id" | "argon2i" | "argon2d"),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_scrypt() -> CredentialHasher {
        CredentialHasher::scrypt(4, 8, 1).unwrap()
    }

    fn fast_argon2() -> CredentialHasher {
        CredentialHasher::argon2(64, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = fast_scrypt();
        let hash = hasher.hash("password").unwrap();

        assert_ne!(hash, "password");
        assert!(hash.starts_with("$scrypt$"));
        assert!(hasher.verify("password", &hash));
        assert!(!hasher.verify("differentPassword", &hash));
    }

    #[test]
    fn test_hash_is_salted() {
        let hasher = fast_scrypt();
        let first = hasher.hash("password").unwrap();
        let second = hasher.hash("password").unwrap();

        assert_ne!(first, second);
        assert!(hasher.verify("password", &first));
        assert!(hasher.verify("password", &second));
    }

    #[test]
    fn test_empty_password_rejected() {
        let err = fast_scrypt().hash("").unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_malformed_hash_does_not_verify() {
        let hasher = fast_scrypt();
        assert!(!hasher.verify("password", ""));
        assert!(!hasher.verify("password", "not-a-hash"));
        assert!(!hasher.verify("password", "$scrypt$garbage"));
        assert!(!hasher.verify("", "$scrypt$ln=4,r=8,p=1$"));
    }

    #[test]
    fn test_argon2_hashes() {
        let hasher = fast_argon2();
        let hash = hasher.hash("password").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("password", &hash));
        assert!(!hasher.verify("wrongPassword", &hash));
    }

    #[test]
    fn test_verify_accepts_either_algorithm() {
        let scrypt_hash = fast_scrypt().hash("password").unwrap();
        let argon2_hash = fast_argon2().hash("password").unwrap();

        // An argon2-configured hasher still verifies legacy scrypt hashes and vice versa.
        assert!(fast_argon2().verify("password", &scrypt_hash));
        assert!(fast_scrypt().verify("password", &argon2_hash));
    }

    #[test]
    fn test_invalid_params_are_configuration_errors() {
        let err = CredentialHasher::scrypt(0, 0, 0).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));

        let err = CredentialHasher::argon2(0, 0, 0).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn test_is_well_formed() {
        let hash = fast_scrypt().hash("password").unwrap();
        assert!(CredentialHasher::is_well_formed(&hash));
        assert!(!CredentialHasher::is_well_formed("plaintext"));
    }
}
