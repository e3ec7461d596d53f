use actix_web::{web, HttpResponse, Result};
use shared_types::HealthResponse;
use std::sync::Arc;

use crate::database::Database;

pub async fn health(db: web::Data<Arc<Database>>) -> Result<HttpResponse> {
    if db.is_healthy().await {
        Ok(HttpResponse::Ok().json(HealthResponse {
            status: "ok".to_string(),
            database: "connected".to_string(),
        }))
    } else {
        tracing::warn!("Health check could not reach the database");
        Ok(HttpResponse::ServiceUnavailable().json(HealthResponse {
            status: "error".to_string(),
            database: "unavailable".to_string(),
        }))
    }
}
