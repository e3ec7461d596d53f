pub mod attachments;
pub mod auth;
pub mod error;
pub mod health;
pub mod tasks;
pub mod users;
