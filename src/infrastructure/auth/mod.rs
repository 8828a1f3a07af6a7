//! Credential primitives: JWT access tokens, Argon2 password hashes and
//! opaque refresh tokens.

mod jwt;
mod password;

pub use jwt::JwtTokenService;
pub use password::{generate_refresh_token, hash_password, hash_refresh_token, verify_password};
