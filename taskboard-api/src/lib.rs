pub mod config;
pub mod database;
pub mod handlers;
pub mod helpers;
pub mod policy;

use actix_web::web;

pub use database::Database;

/// Register every API route.
///
/// The caller provides `web::Data` for `Arc<Database>`, `SessionKeys` and
/// `UploadStore`.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(handlers::error::json_error_handler))
        .route("/health", web::get().to(handlers::health::health))
        .route("/api/health", web::get().to(handlers::health::health))
        .route("/api/auth/login", web::post().to(handlers::auth::login))
        .route("/api/users", web::get().to(handlers::users::list_users))
        .route("/api/users", web::post().to(handlers::users::create_user))
        .route("/api/users/me", web::get().to(handlers::users::get_current_user))
        .route("/api/users/{id}", web::put().to(handlers::users::update_user))
        .route("/api/users/{id}", web::delete().to(handlers::users::delete_user))
        .route("/api/tasks", web::get().to(handlers::tasks::list_tasks))
        .route("/api/tasks", web::post().to(handlers::tasks::create_task))
        .route("/api/tasks/{id}", web::get().to(handlers::tasks::get_task))
        .route("/api/tasks/{id}", web::put().to(handlers::tasks::update_task))
        .route("/api/tasks/{id}", web::delete().to(handlers::tasks::delete_task))
        .route("/api/tasks/{id}/messages", web::post().to(handlers::tasks::add_chat_message))
        .route("/api/tasks/{id}/attachments", web::post().to(handlers::attachments::upload_attachment))
        .route(
            "/api/tasks/{id}/attachments/multiple",
            web::post().to(handlers::attachments::upload_attachments),
        );
}
