use actix_web::{web, HttpResponse};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{hash_password, issue_token, verify_password, AuthConfig};
use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::user::{NewUser, User};
use crate::schema::users;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user_id: Uuid,
    pub name: String,
    pub is_admin: bool,
}

/// POST /api/auth/register
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid email or password"),
        (status = 409, description = "Email already registered"),
    ),
    tag = "auth"
)]
pub async fn register(
    pool: web::Data<DbPool>,
    config: web::Data<AuthConfig>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    if body.email.is_empty() || !body.email.contains('@') {
        return Err(AppError::Validation("Invalid email address".to_string()));
    }
    let password_hash = hash_password(&body.password)?;

    let user = web::block(move || {
        let mut conn = pool.get()?;
        let new_user = NewUser {
            id: Uuid::new_v4(),
            email: body.email,
            password_hash,
            name: body.name,
            is_admin: false,
        };
        let user: User = diesel::insert_into(users::table)
            .values(&new_user)
            .returning(User::as_returning())
            .get_result(&mut conn)
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                ) => AppError::Conflict("Email already registered".to_string()),
                other => other.into(),
            })?;
        Ok::<_, AppError>(user)
    })
    .await??;

    let token = issue_token(&config, user.id, user.is_admin)?;
    Ok(HttpResponse::Created().json(AuthResponse {
        token,
        user_id: user.id,
        name: user.name,
        is_admin: user.is_admin,
    }))
}

/// POST /api/auth/login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Unknown email or wrong password"),
    ),
    tag = "auth"
)]
pub async fn login(
    pool: web::Data<DbPool>,
    config: web::Data<AuthConfig>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();

    let user = web::block(move || {
        let mut conn = pool.get()?;
        let user = users::table
            .filter(users::email.eq(&body.email))
            .select(User::as_select())
            .first(&mut conn)
            .optional()?;

        // Same error for unknown email and wrong password.
        let user = user
            .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;
        if !verify_password(&user.password_hash, &body.password)? {
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        }
        Ok(user)
    })
    .await??;

    let token = issue_token(&config, user.id, user.is_admin)?;
    Ok(HttpResponse::Ok().json(AuthResponse {
        token,
        user_id: user.id,
        name: user.name,
        is_admin: user.is_admin,
    }))
}
