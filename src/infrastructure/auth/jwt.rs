//! HS256 access tokens.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::config::JwtSettings;
use crate::domain::ports::{Claims, TokenError, TokenService};

pub struct JwtTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry_minutes: i64,
}

impl JwtTokenService {
    pub fn new(settings: &JwtSettings) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(settings.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.secret.as_bytes()),
            access_token_expiry_minutes: settings.access_token_expiry_minutes,
        }
    }
}

impl TokenService for JwtTokenService {
    fn issue(&self, user_id: i64, email: &str, name: &str) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            name: name.to_string(),
            exp: (now + Duration::minutes(self.access_token_expiry_minutes)).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })
    }

    fn expires_in(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(secret: &str, minutes: i64) -> JwtSettings {
        JwtSettings {
            secret: secret.to_string(),
            access_token_expiry_minutes: minutes,
            refresh_token_expiry_days: 7,
        }
    }

    #[test]
    fn test_issue_then_verify() {
        let service = JwtTokenService::new(&settings("a-very-long-test-secret-of-32-chars!", 15));
        let token = service.issue(42, "ann@example.com", "Ann").unwrap();
        let claims = service.verify(&token).unwrap();

        assert_eq!(claims.sub, 42);
        assert_eq!(claims.email, "ann@example.com");
        assert_eq!(service.expires_in(), 900);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let service = JwtTokenService::new(&settings("a-very-long-test-secret-of-32-chars!", -10));
        let token = service.issue(1, "a@b.c", "A").unwrap();
        assert!(matches!(service.verify(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn test_foreign_signature_is_rejected() {
        let issuer = JwtTokenService::new(&settings("a-very-long-test-secret-of-32-chars!", 15));
        let verifier = JwtTokenService::new(&settings("another-long-test-secret-of-32-chars", 15));
        let token = issuer.issue(1, "a@b.c", "A").unwrap();
        assert!(matches!(verifier.verify(&token), Err(TokenError::Invalid(_))));
    }
}
