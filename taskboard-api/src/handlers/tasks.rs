use actix_web::{web, HttpResponse, Result};
use shared_types::{
    CreateChatMessageRequest, CreateTaskRequest, NewAttachment, NewChatMessage, Task, TaskStatus,
    UpdateTaskRequest,
};
use std::sync::Arc;

use crate::database::tasks as tasks_db;
use crate::database::Database;
use crate::handlers::auth::AuthenticatedUser;
use crate::handlers::error::ApiError;
use crate::policy::{self, Actor, TaskChanges};

const TASK_NOT_FOUND: &str = "Task not found";

pub async fn list_tasks(
    db: web::Data<Arc<Database>>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    let scope = policy::task_scope(&user);

    let tasks = tasks_db::list_tasks(&db.connection, &scope)
        .await
        .map_err(ApiError::from)?;

    Ok(HttpResponse::Ok().json(tasks))
}

pub async fn get_task(
    db: web::Data<Arc<Database>>,
    user: AuthenticatedUser,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let task_id = path.into_inner();

    let task = tasks_db::find_task(&db.connection, &task_id)
        .await
        .map_err(ApiError::from)?;
    policy::authorize_task_view(&user, task.as_ref()).map_err(ApiError::from)?;
    let task = task.ok_or_else(|| ApiError::NotFound(TASK_NOT_FOUND.to_string()))?;

    Ok(HttpResponse::Ok().json(task))
}

pub async fn create_task(
    db: web::Data<Arc<Database>>,
    user: AuthenticatedUser,
    request: web::Json<CreateTaskRequest>,
) -> Result<HttpResponse> {
    let new_task =
        policy::authorize_task_creation(&user, request.into_inner()).map_err(ApiError::from)?;

    let task = tasks_db::insert_task(&db.connection, &new_task)
        .await
        .map_err(ApiError::from)?;

    tracing::info!(task_id = %task.id, created_by = %user.id, "Created task");
    Ok(HttpResponse::Created().json(task))
}

/// Load the task and decide which part of `request` the actor may write
pub(crate) async fn authorize_update(
    db: &Database,
    actor: &Actor,
    task_id: &str,
    request: UpdateTaskRequest,
) -> std::result::Result<TaskChanges, ApiError> {
    let existing = tasks_db::find_task(&db.connection, task_id).await?;
    let changes = policy::authorize_task_mutation(actor, existing.as_ref(), request)?;

    if let (Some(task), Some(next)) = (existing.as_ref(), changes.status) {
        log_off_flow_transition(task, next, actor);
    }

    Ok(changes)
}

/// Load the task and check the actor may attach uploads to it
pub(crate) async fn authorize_upload(
    db: &Database,
    actor: &Actor,
    task_id: &str,
    attachments: Vec<NewAttachment>,
) -> std::result::Result<TaskChanges, ApiError> {
    let existing = tasks_db::find_task(&db.connection, task_id).await?;
    Ok(policy::authorize_attachment_upload(
        actor,
        existing.as_ref(),
        attachments,
    )?)
}

pub(crate) async fn store_update(
    db: &Database,
    actor: &Actor,
    task_id: &str,
    changes: &TaskChanges,
) -> std::result::Result<tasks_db::UpdateOutcome, ApiError> {
    tasks_db::update_task(&db.connection, task_id, &actor.id, changes)
        .await
        .map_err(|e| ApiError::from_store(e, TASK_NOT_FOUND))
}

async fn apply_task_update(
    db: &Database,
    actor: &Actor,
    task_id: &str,
    request: UpdateTaskRequest,
) -> std::result::Result<tasks_db::UpdateOutcome, ApiError> {
    let changes = authorize_update(db, actor, task_id, request).await?;
    store_update(db, actor, task_id, &changes).await
}

fn log_off_flow_transition(task: &Task, next: TaskStatus, actor: &Actor) {
    if task.status.is_terminal() && next != task.status {
        tracing::info!(
            task_id = %task.id,
            from = %task.status,
            to = %next,
            actor = %actor.id,
            "Reviewed task reopened"
        );
    }
    if !task.status.follows_flow_to(next) {
        tracing::debug!(
            task_id = %task.id,
            from = %task.status,
            to = %next,
            actor = %actor.id,
            "Status change outside the review flow"
        );
    }
}

pub async fn update_task(
    db: web::Data<Arc<Database>>,
    user: AuthenticatedUser,
    path: web::Path<String>,
    request: web::Json<UpdateTaskRequest>,
) -> Result<HttpResponse> {
    let task_id = path.into_inner();

    let outcome = apply_task_update(&db, &user, &task_id, request.into_inner()).await?;

    Ok(HttpResponse::Ok().json(outcome.task))
}

pub async fn delete_task(
    db: web::Data<Arc<Database>>,
    user: AuthenticatedUser,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let task_id = path.into_inner();

    let existing = tasks_db::find_task(&db.connection, &task_id)
        .await
        .map_err(ApiError::from)?;
    policy::authorize_task_deletion(&user, existing.as_ref()).map_err(ApiError::from)?;

    tasks_db::delete_task(&db.connection, &task_id)
        .await
        .map_err(|e| ApiError::from_store(e, TASK_NOT_FOUND))?;

    tracing::info!(task_id = %task_id, deleted_by = %user.id, "Deleted task");
    Ok(HttpResponse::NoContent().finish())
}

pub async fn add_chat_message(
    db: web::Data<Arc<Database>>,
    user: AuthenticatedUser,
    path: web::Path<String>,
    request: web::Json<CreateChatMessageRequest>,
) -> Result<HttpResponse> {
    let task_id = path.into_inner();
    let update = UpdateTaskRequest {
        chat_messages: Some(Some(vec![NewChatMessage {
            text: request.into_inner().text,
        }])),
        ..Default::default()
    };

    let outcome = apply_task_update(&db, &user, &task_id, update).await?;
    let message = outcome
        .chat_messages
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Internal("chat message was not stored".to_string()))?;

    Ok(HttpResponse::Created().json(message))
}
