use super::models::{Claims, Identity};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use shared::UserId;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT decoding error: {0}")]
    Decoding(String),
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid subject in token claims: {0}")]
    InvalidSubject(String),
}

#[derive(Clone)]
pub struct JwtService {
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
        }
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, JwtError> {
        if token.is_empty() {
            return Err(JwtError::InvalidToken);
        }

        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(JwtError::InvalidToken);
        }

        let validation = Validation::new(Algorithm::HS256);

        match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(token_data) => {
                log::debug!(
                    "JWT token decoded successfully. User: {}, Exp: {}",
                    token_data.claims.sub,
                    token_data.claims.exp
                );
                Ok(token_data.claims)
            }
            Err(err) => {
                log::debug!("JWT token decode error: {:?}", err);
                match err.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        Err(JwtError::TokenExpired)
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidToken => Err(JwtError::InvalidToken),
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        Err(JwtError::InvalidToken)
                    }
                    _ => Err(JwtError::Decoding(err.to_string())),
                }
            }
        }
    }

    /// Verifies the token and turns its subject into the caller's identity.
    pub fn identify(&self, token: &str) -> Result<Identity, JwtError> {
        let claims = self.verify_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| JwtError::InvalidSubject(claims.sub.clone()))?;
        Ok(Identity {
            user_id: UserId(user_id),
            email: claims.email,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    /// Signs an HS256 token for `identity` the way the identity provider would.
    pub(crate) fn issue_token(secret: &str, identity: &Identity, ttl: Duration) -> String {
        let now = Utc::now();
        let claims = Claims {
            sub: identity.user_id.to_string(),
            email: identity.email.clone(),
            exp: (now + ttl).timestamp().max(0) as usize,
            iat: now.timestamp().max(0) as usize,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_ref()),
        )
        .unwrap()
    }

    fn identity() -> Identity {
        Identity {
            user_id: UserId(Uuid::new_v4()),
            email: Some("patient@example.com".into()),
        }
    }

    #[test]
    fn issued_token_identifies_the_same_user() {
        let service = JwtService::new("test-secret");
        let me = identity();
        let token = issue_token("test-secret", &me, Duration::hours(1));
        assert_eq!(service.identify(&token).unwrap(), me);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let verifier = JwtService::new("secret-b");
        let token = issue_token("secret-a", &identity(), Duration::hours(1));
        assert!(matches!(
            verifier.identify(&token),
            Err(JwtError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let service = JwtService::new("test-secret");
        let token = issue_token("test-secret", &identity(), Duration::hours(-2));
        assert!(matches!(
            service.identify(&token),
            Err(JwtError::TokenExpired)
        ));
    }

    #[test]
    fn malformed_token_is_rejected() {
        let service = JwtService::new("test-secret");
        assert!(matches!(
            service.identify("not-a-jwt"),
            Err(JwtError::InvalidToken)
        ));
        assert!(matches!(service.identify(""), Err(JwtError::InvalidToken)));
    }
}
