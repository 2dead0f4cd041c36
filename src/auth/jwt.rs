/// JWT Token Codec
///
/// Signs and verifies HS256 tokens carrying `sub`, `type`, `iat` and `exp`.
/// The codec only answers "is this a well-formed, correctly signed, unexpired
/// token"; whether the token type or subject fit the operation is up to the
/// caller.

use std::time::Duration;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::{Claims, TokenType};
use crate::error::TokenError;

/// Token signer/verifier bound to one process-wide secret
///
/// Rotating the secret means building a new codec, which invalidates every
/// token signed by the old one.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Create a codec for `secret`
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if the secret is empty
    pub fn new(secret: &str) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::Signing("signing secret is empty".to_string()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the caller's clock in `parse`.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["sub", "exp", "iat"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Sign a token of `token_type` for `subject`, issued at `now`, expiring at `now + ttl`
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if `ttl` is shorter than one second or
    /// encoding fails
    pub fn issue(
        &self,
        subject: &str,
        token_type: TokenType,
        ttl: Duration,
        now: i64,
    ) -> Result<String, TokenError> {
        let ttl_seconds = i64::try_from(ttl.as_secs())
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| TokenError::Signing("token ttl must be positive".to_string()))?;

        let claims = Claims::new(subject, token_type, ttl_seconds, now)?;

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify `token` and return its claims as of `now`
    ///
    /// # Errors
    /// - `InvalidSignature` if the signature does not match this codec's secret
    /// - `Malformed` if the token cannot be decoded into the claim shape
    /// - `Expired` if `now >= exp`
    pub fn parse(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            })?;

        if claims.is_expired_at(now) {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-characters-long";
    const NOW: i64 = 1_700_000_000;

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET).expect("Failed to build codec")
    }

    #[test]
    fn test_issue_and_parse_round_trip() {
        let codec = codec();

        for token_type in [TokenType::Access, TokenType::Refresh] {
            let token = codec
                .issue("42", token_type, Duration::from_secs(60), NOW)
                .expect("Failed to issue token");
            let claims = codec.parse(&token, NOW + 59).expect("Failed to parse token");

            assert_eq!(claims.sub, "42");
            assert_eq!(claims.token_type, token_type);
            assert_eq!(claims.iat, NOW);
            assert_eq!(claims.exp, NOW + 60);
        }
    }

    #[test]
    fn test_expired_at_exact_expiry() {
        let codec = codec();
        let token = codec
            .issue("42", TokenType::Access, Duration::from_secs(60), NOW)
            .unwrap();

        assert_eq!(codec.parse(&token, NOW + 60), Err(TokenError::Expired));
        assert_eq!(codec.parse(&token, NOW + 3_600), Err(TokenError::Expired));
    }

    #[test]
    fn test_short_ttl_expires_after_two_seconds() {
        let codec = codec();
        let token = codec
            .issue("42", TokenType::Access, Duration::from_secs(1), NOW)
            .unwrap();

        assert_eq!(codec.parse(&token, NOW + 2), Err(TokenError::Expired));
    }

    #[test]
    fn test_wrong_secret_is_invalid_signature() {
        let token = codec()
            .issue("42", TokenType::Access, Duration::from_secs(60), NOW)
            .unwrap();
        let other = TokenCodec::new("a-completely-different-secret").unwrap();

        assert_eq!(other.parse(&token, NOW), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_signature_is_checked_before_expiry() {
        let token = codec()
            .issue("42", TokenType::Access, Duration::from_secs(1), NOW)
            .unwrap();
        let other = TokenCodec::new("a-completely-different-secret").unwrap();

        assert_eq!(other.parse(&token, NOW + 10), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert_eq!(codec().parse("not-a-jwt", NOW), Err(TokenError::Malformed));
        assert_eq!(codec().parse("", NOW), Err(TokenError::Malformed));
    }

    #[test]
    fn test_tampered_token() {
        let codec = codec();
        let token = codec
            .issue("42", TokenType::Access, Duration::from_secs(60), NOW)
            .unwrap();

        let tampered = format!("{}X", token);
        assert!(codec.parse(&tampered, NOW).is_err());
    }

    #[test]
    fn test_correctly_signed_token_without_type_is_malformed() {
        let payload = serde_json::json!({ "sub": "42", "iat": NOW, "exp": NOW + 60 });
        let token = encode(
            &Header::new(Algorithm::HS256),
            &payload,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(codec().parse(&token, NOW), Err(TokenError::Malformed));
    }

    #[test]
    fn test_unknown_type_is_malformed() {
        let payload =
            serde_json::json!({ "sub": "42", "type": "session", "iat": NOW, "exp": NOW + 60 });
        let token = encode(
            &Header::new(Algorithm::HS256),
            &payload,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(codec().parse(&token, NOW), Err(TokenError::Malformed));
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        assert!(matches!(TokenCodec::new(""), Err(TokenError::Signing(_))));
    }

    #[test]
    fn test_zero_ttl_is_rejected() {
        let result = codec().issue("42", TokenType::Access, Duration::from_millis(500), NOW);
        assert!(matches!(result, Err(TokenError::Signing(_))));
    }

    #[test]
    fn test_ttl_overflowing_expiry_is_a_signing_error() {
        let result = codec().issue(
            "42",
            TokenType::Refresh,
            Duration::from_secs(i64::MAX as u64),
            NOW,
        );
        assert!(matches!(result, Err(TokenError::Signing(_))));
    }

    #[test]
    fn test_same_second_tokens_differ() {
        let codec = codec();
        let first = codec
            .issue("42", TokenType::Refresh, Duration::from_secs(60), NOW)
            .unwrap();
        let second = codec
            .issue("42", TokenType::Refresh, Duration::from_secs(60), NOW)
            .unwrap();

        assert_ne!(first, second);
    }
}
