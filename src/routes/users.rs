/// User Management Routes
///
/// `GET /users/{id}` needs an authenticated caller; creating, updating and
/// deleting users additionally needs the `admin` role (enforced by the role
/// guard wrapping those routes).

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::auth::{hash_password, SessionIssuer};
use crate::error::{AppError, DatabaseError};
use crate::routes::auth::{assignable_role, UserResponse};
use crate::users::{NewUser, UserStore, UserUpdate};

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub full_name: String,
    pub password: String,
    pub role: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub role: Option<String>,
    pub password: Option<String>,
}

/// GET /users/{id}
pub async fn get_user(
    path: web::Path<String>,
    store: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let user = store
        .find_by_id(&id)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("user {}", id)))?;

    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

/// POST /users (admin)
pub async fn create_user(
    form: web::Json<CreateUserRequest>,
    store: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
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

    tracing::info!(user_id = %user.id, role = %user.role, "User created");
    Ok(HttpResponse::Created().json(UserResponse::from(user)))
}

/// PUT /users/{id} (admin)
///
/// A password change also revokes the user's refresh token.
pub async fn update_user(
    path: web::Path<String>,
    form: web::Json<UpdateUserRequest>,
    store: web::Data<dyn UserStore>,
    issuer: web::Data<SessionIssuer>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let form = form.into_inner();

    let role = match form.role.as_deref() {
        Some(role) => Some(assignable_role(Some(role))?),
        None => None,
    };
    let password_hash = match form.password.as_deref() {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };
    let password_changed = password_hash.is_some();

    let user = store
        .update_profile(
            &id,
            UserUpdate {
                full_name: form.full_name,
                role,
                password_hash,
            },
        )
        .await?;

    if password_changed {
        issuer.end_session(&user.id).await?;
    }

    tracing::info!(user_id = %user.id, "User updated");
    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

/// DELETE /users/{id} (admin)
pub async fn delete_user(
    path: web::Path<String>,
    store: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    store.delete(&id).await?;

    tracing::info!(user_id = %id, "User deleted");
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "User deleted successfully" })))
}
