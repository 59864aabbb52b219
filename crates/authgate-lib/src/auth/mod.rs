// ============================
// authgate-lib/src/auth/mod.rs
// ============================
//! Authentication module.
pub mod clock;
pub mod directory;
pub mod login;
pub mod password;
pub mod rate_limit;
pub mod session;
pub mod token_generator;

pub use clock::{Clock, ManualClock, SystemClock};
pub use directory::{InMemoryDirectory, UserDirectory};
pub use login::{LoginHandler, LoginSuccess};
pub use password::{CredentialHasher, HashAlgorithm};
pub use rate_limit::AuthRateLimiter;
pub use session::{Session, SessionStore};
pub use token_generator::generate_secure_token;
