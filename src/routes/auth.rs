/// Authentication Routes
///
/// Registration, login, token refresh, logout and current user information.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{
    hash_password, verify_user_password, AuthenticatedUser, LoginRateLimiter, SessionIssuer,
    TokenPair,
};
use crate::error::{AppError, AuthError, ErrorContext, ValidationError};
use crate::users::{NewUser, UserRecord, UserStore, ASSIGNABLE_ROLES, ROLE_GUEST};

/// User registration request
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub full_name: String,
    pub password: String,
    pub role: Option<String>,
}

/// User login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Token refresh request
#[derive(Deserialize)]
pub struct RefreshRequest {
    #[serde(alias = "refreshToken")]
    pub refresh_token: String,
}

/// Token pair as returned to clients
#[derive(Serialize)]
pub struct TokensResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

impl TokensResponse {
    fn new(pair: TokenPair, issuer: &SessionIssuer) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: issuer.access_ttl().as_secs(),
        }
    }
}

/// User information response; never includes the password hash
#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub role: String,
    pub created_at: String,
}

impl From<UserRecord> for UserResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
            role: user.role,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Login and registration response
#[derive(Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub tokens: TokensResponse,
}

/// Resolve the requested role, defaulting to guest.
pub(crate) fn assignable_role(role: Option<&str>) -> Result<String, AppError> {
    let role = role.unwrap_or(ROLE_GUEST);
    if ASSIGNABLE_ROLES.contains(&role) {
        Ok(role.to_string())
    } else {
        Err(ValidationError::InvalidRole(role.to_string()).into())
    }
}

/// POST /auth/register
///
/// # Errors
/// - 400: Role other than `guest` or `admin`
/// - 409: Username already used
/// - 500: Hashing, signing or storage failure
pub async fn register(
    form: web::Json<RegisterRequest>,
    store: web::Data<dyn UserStore>,
    issuer: web::Data<SessionIssuer>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");
    let form = form.into_inner();

    let role = assignable_role(form.role.as_deref())?;
    let password_hash = hash_password(&form.password)?;

    let user = store
        .create(NewUser {
            username: form.username,
            full_name: form.full_name,
            password_hash,
            role,
        })
        .await?;

    let pair = issuer.start_session(&user.id).await.map_err(|e| {
        context.clone().with_user_id(&user.id).log_error(&e);
        e
    })?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User registered successfully"
    );

    Ok(HttpResponse::Created().json(AuthResponse {
        tokens: TokensResponse::new(pair, &issuer),
        user: user.into(),
    }))
}

/// POST /auth/login
///
/// Unknown usernames and wrong passwords produce the same 401. Attempts are
/// rate-limited per username, falling back to the client IP.
///
/// # Errors
/// - 401: Invalid credentials
/// - 429: Too many attempts for this account within a minute
/// - 500: Signing or storage failure
pub async fn login(
    req: HttpRequest,
    form: web::Json<LoginRequest>,
    store: web::Data<dyn UserStore>,
    issuer: web::Data<SessionIssuer>,
    limiter: web::Data<LoginRateLimiter>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");

    let client_ip = req.peer_addr().map(|addr| addr.ip().to_string());
    limiter.check(&LoginRateLimiter::key_for(&form.username, client_ip.as_deref()))?;

    let user = store.find_by_username(&form.username).await?;

    if !verify_user_password(&form.password, user.as_ref().map(|u| u.password_hash.as_str())) {
        tracing::warn!(request_id = %context.request_id, "Failed login attempt");
        return Err(AuthError::InvalidCredentials.into());
    }
    let user = user.ok_or(AuthError::InvalidCredentials)?;

    let pair = issuer.start_session(&user.id).await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User logged in successfully"
    );

    Ok(HttpResponse::Ok().json(AuthResponse {
        tokens: TokensResponse::new(pair, &issuer),
        user: user.into(),
    }))
}

/// POST /auth/refresh
///
/// Rotates the pair: the presented refresh token stops working once the new
/// one is issued.
///
/// # Errors
/// - 401: Invalid, expired, wrong-type, superseded or revoked refresh token
/// - 500: Signing or storage failure
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    issuer: web::Data<SessionIssuer>,
) -> Result<HttpResponse, AppError> {
    let pair = issuer.refresh(&form.refresh_token).await?;

    Ok(HttpResponse::Ok().json(TokensResponse::new(pair, &issuer)))
}

/// POST /auth/logout
///
/// **Requires valid JWT access token.** Revokes the caller's refresh token;
/// outstanding access tokens stay valid until they expire.
pub async fn logout(
    identity: web::ReqData<AuthenticatedUser>,
    issuer: web::Data<SessionIssuer>,
) -> Result<HttpResponse, AppError> {
    issuer.end_session(&identity.user_id).await?;

    tracing::info!(user_id = %identity.user_id, "User logged out");
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Logout successful" })))
}

/// GET /auth/me
///
/// **Requires valid JWT access token.**
///
/// # Errors
/// - 401: Missing or invalid token, or the user no longer exists
pub async fn get_current_user(
    identity: web::ReqData<AuthenticatedUser>,
    store: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    let user = store
        .find_by_id(&identity.user_id)
        .await?
        .ok_or(AuthError::Unauthorized("user not found"))?;

    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_defaults_to_guest() {
        assert_eq!(assignable_role(None).unwrap(), "guest");
        assert_eq!(assignable_role(Some("admin")).unwrap(), "admin");
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        assert!(matches!(
            assignable_role(Some("superuser")),
            Err(AppError::Validation(ValidationError::InvalidRole(_)))
        ));
    }

    #[test]
    fn test_refresh_request_accepts_camel_case() {
        let body: RefreshRequest =
            serde_json::from_str(r#"{"refreshToken": "abc"}"#).unwrap();
        assert_eq!(body.refresh_token, "abc");
    }
}
