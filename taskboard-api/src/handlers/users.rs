use actix_web::{web, HttpResponse, Result};
use shared_types::{CreateUserRequest, UpdateUserRequest, UserRole};
use std::sync::Arc;

use crate::database::users::{self as users_db, NewUser, UserChanges};
use crate::database::Database;
use crate::handlers::auth::AuthenticatedUser;
use crate::handlers::error::ApiError;
use crate::helpers::password::hash_password;
use crate::policy::require_role;

async fn hash_off_thread(password: String) -> std::result::Result<String, ApiError> {
    web::block(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| ApiError::Internal(e.to_string()))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn list_users(
    db: web::Data<Arc<Database>>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    require_role(&user, &[UserRole::Admin]).map_err(ApiError::from)?;

    let users = users_db::list_users(&db.connection)
        .await
        .map_err(ApiError::from)?;

    Ok(HttpResponse::Ok().json(users))
}

pub async fn get_current_user(
    db: web::Data<Arc<Database>>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    let current = users_db::get_user(&db.connection, &user.id)
        .await
        .map_err(|e| ApiError::from_store(e, "User not found"))?;

    Ok(HttpResponse::Ok().json(current))
}

pub async fn create_user(
    db: web::Data<Arc<Database>>,
    user: AuthenticatedUser,
    request: web::Json<CreateUserRequest>,
) -> Result<HttpResponse> {
    require_role(&user, &[UserRole::Admin]).map_err(ApiError::from)?;
    let req = request.into_inner();

    let mut missing = Vec::new();
    if req.full_name.trim().is_empty() {
        missing.push("fullName");
    }
    if req.email.trim().is_empty() {
        missing.push("email");
    }
    if req.username.trim().is_empty() {
        missing.push("username");
    }
    if req.password.is_empty() {
        missing.push("password");
    }
    if req.role.is_none() {
        missing.push("role");
    }
    let role = match req.role {
        Some(role) if missing.is_empty() => role,
        _ => {
            return Err(ApiError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            ))
            .into())
        }
    };

    let password_hash = hash_off_thread(req.password).await?;

    let new_user = NewUser {
        id: None,
        full_name: req.full_name.trim().to_string(),
        email: req.email.trim().to_string(),
        username: req.username.trim().to_string(),
        password_hash,
        phone: non_blank(req.phone),
        role,
    };

    let created = users_db::insert_user(&db.connection, &new_user)
        .await
        .map_err(ApiError::from)?;

    tracing::info!(user_id = %created.id, role = %created.role, "Created user");
    Ok(HttpResponse::Created().json(created))
}

pub async fn update_user(
    db: web::Data<Arc<Database>>,
    user: AuthenticatedUser,
    path: web::Path<String>,
    request: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse> {
    require_role(&user, &[UserRole::Admin]).map_err(ApiError::from)?;
    let user_id = path.into_inner();
    let req = request.into_inner();

    if req.is_empty() {
        return Err(ApiError::Validation("No fields to update".to_string()).into());
    }

    for (field, value) in [
        ("fullName", &req.full_name),
        ("email", &req.email),
        ("username", &req.username),
        ("password", &req.password),
    ] {
        if matches!(value, Some(v) if v.trim().is_empty()) {
            return Err(ApiError::Validation(format!("{} cannot be empty", field)).into());
        }
    }

    let password_hash = match req.password {
        Some(password) => Some(hash_off_thread(password).await?),
        None => None,
    };

    let changes = UserChanges {
        full_name: req.full_name.map(|v| v.trim().to_string()),
        email: req.email.map(|v| v.trim().to_string()),
        username: req.username.map(|v| v.trim().to_string()),
        password_hash,
        phone: req.phone.map(|v| v.trim().to_string()),
        role: req.role,
    };

    let updated = users_db::update_user(&db.connection, &user_id, &changes)
        .await
        .map_err(|e| ApiError::from_store(e, "User not found"))?;

    Ok(HttpResponse::Ok().json(updated))
}

pub async fn delete_user(
    db: web::Data<Arc<Database>>,
    user: AuthenticatedUser,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    require_role(&user, &[UserRole::Admin]).map_err(ApiError::from)?;
    let user_id = path.into_inner();

    users_db::delete_user(&db.connection, &user_id)
        .await
        .map_err(|e| ApiError::from_store(e, "User not found"))?;

    tracing::info!(user_id = %user_id, deleted_by = %user.id, "Deleted user");
    Ok(HttpResponse::NoContent().finish())
}
