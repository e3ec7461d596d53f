use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest, HttpResponse, Result};
use shared_types::LoginRequest;
use std::future::{ready, Ready};
use std::ops::Deref;
use std::sync::Arc;

use crate::database::Database;
use crate::handlers::error::ApiError;
use crate::helpers::session::{self, SessionKeys};
use crate::policy::Actor;

pub async fn login(
    db: web::Data<Arc<Database>>,
    keys: web::Data<SessionKeys>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    let req = request.into_inner();

    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation("Username and password are required".to_string()).into());
    }

    let response = session::authenticate(&db.connection, &keys, req.username.trim(), &req.password)
        .await
        .map_err(ApiError::from)?;

    Ok(HttpResponse::Ok().json(response))
}

/// Caller identity taken from the `Authorization: Bearer <token>` header
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Actor);

impl Deref for AuthenticatedUser {
    type Target = Actor;

    fn deref(&self) -> &Actor {
        &self.0
    }
}

impl AuthenticatedUser {
    fn from_headers(req: &HttpRequest) -> std::result::Result<Self, ApiError> {
        let keys = req
            .app_data::<web::Data<SessionKeys>>()
            .ok_or_else(|| ApiError::Internal("session keys are not registered".to_string()))?;

        let header = req
            .headers()
            .get(AUTHORIZATION)
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

        let invalid = || ApiError::Unauthorized("Invalid or expired token".to_string());
        let token = header
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(invalid)?;

        let actor = keys.verify(token)?;
        Ok(AuthenticatedUser(actor))
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = ApiError;
    type Future = Ready<std::result::Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Self::from_headers(req))
    }
}
