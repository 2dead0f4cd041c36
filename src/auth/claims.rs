/// JWT Claims structure
///
/// The signed payload of both access and refresh tokens. Claims are decoded
/// into this fixed shape once, at parse time; nothing downstream looks at raw
/// JSON.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TokenError;

/// Purpose of a token, carried in the `type` claim
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject, always in string form even for numeric identities
    pub sub: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Unique token ID; keeps same-second tokens distinct
    #[serde(default)]
    pub jti: String,
}

impl Claims {
    /// Build claims for `subject` issued at `now` and valid for `ttl_seconds`.
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if `exp` does not fit in an `i64`
    pub fn new(
        subject: &str,
        token_type: TokenType,
        ttl_seconds: i64,
        now: i64,
    ) -> Result<Self, TokenError> {
        let exp = now
            .checked_add(ttl_seconds)
            .ok_or_else(|| TokenError::Signing("token expiry out of range".to_string()))?;

        Ok(Self {
            sub: subject.to_string(),
            token_type,
            iat: now,
            exp,
            jti: Uuid::new_v4().to_string(),
        })
    }

    /// Expired once `now` reaches `exp`; the expiry second itself counts as expired.
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.exp
    }

    /// The subject, or `None` when it is blank.
    pub fn subject(&self) -> Option<&str> {
        let sub = self.sub.trim();
        if sub.is_empty() || sub.len() != self.sub.len() {
            None
        } else {
            Some(sub)
        }
    }

    /// The subject coerced to the identity's shape (`String`, `u64`, `Uuid`, ...).
    pub fn subject_as<T: FromStr>(&self) -> Option<T> {
        self.subject().and_then(|sub| sub.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_creation() {
        let claims = Claims::new("42", TokenType::Access, 900, 1_000).unwrap();

        assert_eq!(claims.sub, "42");
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.iat, 1_000);
        assert_eq!(claims.exp, 1_900);
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn test_expiry_past_i64_range_is_a_signing_error() {
        let result = Claims::new("42", TokenType::Refresh, i64::MAX, 1_700_000_000);
        assert!(matches!(result, Err(TokenError::Signing(_))));
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let claims = Claims::new("42", TokenType::Access, 10, 1_000).unwrap();

        assert!(!claims.is_expired_at(1_009));
        assert!(claims.is_expired_at(1_010));
        assert!(claims.is_expired_at(1_011));
    }

    #[test]
    fn test_type_claim_wire_name() {
        let claims = Claims::new("42", TokenType::Refresh, 10, 1_000).unwrap();
        let json = serde_json::to_value(&claims).unwrap();

        assert_eq!(json["type"], "refresh");
        assert_eq!(json["sub"], "42");
    }

    #[test]
    fn test_numeric_subject_round_trips_without_loss() {
        let subject = u64::MAX.to_string();
        let claims = Claims::new(&subject, TokenType::Access, 10, 0).unwrap();

        assert_eq!(claims.subject_as::<u64>(), Some(u64::MAX));
    }

    #[test]
    fn test_uuid_subject_extraction() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(&user_id.to_string(), TokenType::Access, 10, 0).unwrap();

        assert_eq!(claims.subject_as::<Uuid>(), Some(user_id));
    }

    #[test]
    fn test_invalid_subject() {
        let mut claims = Claims::new("not-a-number", TokenType::Access, 10, 0).unwrap();
        assert_eq!(claims.subject_as::<u64>(), None);

        claims.sub = "  ".to_string();
        assert_eq!(claims.subject(), None);
        assert_eq!(claims.subject_as::<String>(), None);
    }
}
