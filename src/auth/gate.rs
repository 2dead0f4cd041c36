/// Authorization Gate
///
/// Request-level checks, in order: bearer token present, token verifies,
/// token is an access token, subject is usable, and (for role-gated
/// operations) the user's current role is on the operation's allow-list.
/// The first failing step decides the error; nothing is retried.

use crate::auth::claims::TokenType;
use crate::auth::jwt::TokenCodec;
use crate::error::{AppError, AuthError};
use crate::users::{UserRecord, UserStore};

/// Identity bound to a request once its access token has been accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
pub fn extract_bearer(header: Option<&str>) -> Option<&str> {
    let header = header?.trim();
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Resolve the caller's identity from a bearer token
///
/// # Errors
/// `AuthError::Unauthenticated` with a generic reason on every failure
pub fn authenticate(
    codec: &TokenCodec,
    bearer: Option<&str>,
    now: i64,
) -> Result<AuthenticatedUser, AuthError> {
    let token = bearer.ok_or(AuthError::Unauthenticated("missing authorization token"))?;

    let claims = codec.parse(token, now).map_err(|e| {
        tracing::warn!(reason = %e, "Access token rejected");
        AuthError::Unauthenticated("invalid or expired token")
    })?;

    if claims.token_type != TokenType::Access {
        tracing::warn!(
            token_type = claims.token_type.as_str(),
            "Non-access token presented for authentication"
        );
        return Err(AuthError::Unauthenticated("invalid token type"));
    }

    let user_id = claims
        .subject_as::<String>()
        .ok_or(AuthError::Unauthenticated("invalid subject"))?;

    Ok(AuthenticatedUser { user_id })
}

/// Check the authenticated user's current role against `allowed_roles`
///
/// The role is read from the store on every call, so role changes apply to
/// tokens already issued.
///
/// # Errors
/// - `Unauthorized("user not found")` if the user no longer exists
/// - `Forbidden` if the role is not allowed
pub async fn authorize_role(
    store: &dyn UserStore,
    identity: &AuthenticatedUser,
    allowed_roles: &[String],
) -> Result<UserRecord, AppError> {
    let user = store
        .find_by_id(&identity.user_id)
        .await?
        .ok_or(AuthError::Unauthorized("user not found"))?;

    if allowed_roles.iter().any(|role| *role == user.role) {
        Ok(user)
    } else {
        tracing::warn!(
            user_id = %user.id,
            role = %user.role,
            allowed = ?allowed_roles,
            "Role not permitted for operation"
        );
        Err(AuthError::Forbidden.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::{InMemoryUserStore, NewUser};
    use std::time::Duration;

    const SECRET: &str = "test-secret-key-at-least-32-characters-long";
    const NOW: i64 = 1_700_000_000;

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET).unwrap()
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(Some("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(extract_bearer(Some("bearer abc")), Some("abc"));
        assert_eq!(extract_bearer(Some("Basic abc")), None);
        assert_eq!(extract_bearer(Some("abc.def.ghi")), None);
        assert_eq!(extract_bearer(Some("Bearer   ")), None);
        assert_eq!(extract_bearer(None), None);
    }

    #[test]
    fn test_access_token_authenticates() {
        let codec = codec();
        let token = codec
            .issue("user-1", TokenType::Access, Duration::from_secs(60), NOW)
            .unwrap();

        let identity = authenticate(&codec, Some(&token), NOW).unwrap();
        assert_eq!(identity.user_id, "user-1");
    }

    #[test]
    fn test_missing_token() {
        assert_eq!(
            authenticate(&codec(), None, NOW),
            Err(AuthError::Unauthenticated("missing authorization token"))
        );
    }

    #[test]
    fn test_refresh_token_is_rejected() {
        let codec = codec();
        let token = codec
            .issue("user-1", TokenType::Refresh, Duration::from_secs(60), NOW)
            .unwrap();

        assert_eq!(
            authenticate(&codec, Some(&token), NOW),
            Err(AuthError::Unauthenticated("invalid token type"))
        );
    }

    #[test]
    fn test_malformed_token_gets_generic_message() {
        assert_eq!(
            authenticate(&codec(), Some("not-a-jwt"), NOW),
            Err(AuthError::Unauthenticated("invalid or expired token"))
        );
    }

    #[test]
    fn test_expired_token_gets_generic_message() {
        let codec = codec();
        let token = codec
            .issue("user-1", TokenType::Access, Duration::from_secs(1), NOW)
            .unwrap();

        assert_eq!(
            authenticate(&codec, Some(&token), NOW + 2),
            Err(AuthError::Unauthenticated("invalid or expired token"))
        );
    }

    #[test]
    fn test_blank_subject_is_rejected() {
        let codec = codec();
        let token = codec
            .issue(" ", TokenType::Access, Duration::from_secs(60), NOW)
            .unwrap();

        assert_eq!(
            authenticate(&codec, Some(&token), NOW),
            Err(AuthError::Unauthenticated("invalid subject"))
        );
    }

    async fn user_with_role(store: &InMemoryUserStore, username: &str, role: &str) -> AuthenticatedUser {
        let user = store
            .create(NewUser {
                username: username.to_string(),
                full_name: username.to_string(),
                password_hash: "hash".to_string(),
                role: role.to_string(),
            })
            .await
            .unwrap();
        AuthenticatedUser { user_id: user.id }
    }

    #[tokio::test]
    async fn test_role_gate() {
        let store = InMemoryUserStore::new();
        let admin = user_with_role(&store, "root", "admin").await;
        let guest = user_with_role(&store, "visitor", "guest").await;
        let allowed = vec!["admin".to_string()];

        assert!(authorize_role(&store, &admin, &allowed).await.is_ok());
        assert!(matches!(
            authorize_role(&store, &guest, &allowed).await,
            Err(AppError::Auth(AuthError::Forbidden))
        ));
    }

    #[tokio::test]
    async fn test_role_gate_unknown_user() {
        let store = InMemoryUserStore::new();
        let ghost = AuthenticatedUser {
            user_id: "ghost".to_string(),
        };

        assert!(matches!(
            authorize_role(&store, &ghost, &["admin".to_string()]).await,
            Err(AppError::Auth(AuthError::Unauthorized("user not found")))
        ));
    }
}
