mod claims;

pub use claims::*;

use jwt_simple::prelude::*;

use crate::error::{AppError, Result};

/// Issues and verifies HS256 bearer tokens identifying a user.
#[derive(Clone)]
pub struct TokenIssuer {
    key: HS256Key,
    ttl_minutes: u64,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl_minutes", &self.ttl_minutes)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl_minutes: u64) -> Self {
        Self {
            key: HS256Key::from_bytes(secret),
            ttl_minutes,
        }
    }

    pub fn issue(&self, user_id: &str) -> Result<String> {
        let claims = Claims::with_custom_claims(
            UserClaims {
                user_id: user_id.to_string(),
            },
            Duration::from_mins(self.ttl_minutes),
        );
        self.key
            .authenticate(claims)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Check signature and expiry. Any failure is reported as unauthorized.
    pub fn verify(&self, token: &str) -> Result<UserClaims> {
        let claims = self
            .key
            .verify_token::<UserClaims>(token, None)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected bearer token");
                AppError::Unauthorized("Invalid or expired token".into())
            })?;
        Ok(claims.custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_then_verify() {
        let issuer = TokenIssuer::new(b"test-secret-test-secret-test-sec", 60);
        let token = issuer.issue("user-123").unwrap();
        assert_eq!(issuer.verify(&token).unwrap().user_id, "user-123");
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let a = TokenIssuer::new(b"secret-a-secret-a-secret-a-secre", 60);
        let b = TokenIssuer::new(b"secret-b-secret-b-secret-b-secre", 60);
        let token = a.issue("user-123").unwrap();
        assert!(matches!(b.verify(&token), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let issuer = TokenIssuer::new(b"test-secret-test-secret-test-sec", 60);
        let mut token = issuer.issue("user-123").unwrap();
        token.push('x');
        assert!(issuer.verify(&token).is_err());
        assert!(issuer.verify("not.a.token").is_err());
    }
}
