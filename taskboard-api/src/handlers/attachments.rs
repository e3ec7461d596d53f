use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Result};
use futures::StreamExt;
use std::sync::Arc;

use crate::database::Database;
use crate::handlers::auth::AuthenticatedUser;
use crate::handlers::error::ApiError;
use crate::handlers::tasks::{authorize_upload, store_update};
use crate::helpers::uploads::UploadStore;

struct UploadedFile {
    name: String,
    bytes: Vec<u8>,
}

/// Read every file part of a multipart body, enforcing the size limit per file
async fn read_files(
    mut payload: Multipart,
    max_file_size: usize,
) -> std::result::Result<Vec<UploadedFile>, ApiError> {
    let mut files = Vec::new();

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| ApiError::Validation(format!("Invalid upload: {}", e)))?;

        // Browsers send an empty filename for a file input left blank
        let file_name = match field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .filter(|name| !name.trim().is_empty())
            .map(str::to_string)
        {
            Some(name) => name,
            None => continue,
        };

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ApiError::Validation(format!("Invalid upload: {}", e)))?;
            if bytes.len() + chunk.len() > max_file_size {
                return Err(ApiError::Validation(format!(
                    "File exceeds the maximum size of {} bytes",
                    max_file_size
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        files.push(UploadedFile {
            name: file_name,
            bytes,
        });
    }

    Ok(files)
}

/// Authorize, write the files, then link them to the task in one update
async fn attach_files(
    db: &Database,
    uploads: &UploadStore,
    user: &AuthenticatedUser,
    task_id: &str,
    files: Vec<UploadedFile>,
) -> std::result::Result<Vec<shared_types::Attachment>, ApiError> {
    if files.is_empty() {
        return Err(ApiError::Validation("No file uploaded".to_string()));
    }

    let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
    let planned = uploads.plan(&names);

    let attachments = planned.iter().map(|p| p.attachment.clone()).collect();
    let changes = authorize_upload(db, user, task_id, attachments).await?;

    for (upload, file) in planned.iter().zip(&files) {
        uploads
            .write(upload, &file.bytes)
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to store upload: {}", e)))?;
    }

    let outcome = store_update(db, user, task_id, &changes).await?;
    tracing::info!(
        task_id,
        uploaded_by = %user.id,
        count = outcome.attachments.len(),
        "Attached files to task"
    );

    Ok(outcome.attachments)
}

pub async fn upload_attachment(
    db: web::Data<Arc<Database>>,
    uploads: web::Data<UploadStore>,
    user: AuthenticatedUser,
    path: web::Path<String>,
    payload: Multipart,
) -> Result<HttpResponse> {
    let task_id = path.into_inner();

    let mut files = read_files(payload, uploads.max_file_size()).await?;
    files.truncate(1);

    let attachment = attach_files(&db, &uploads, &user, &task_id, files)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Internal("attachment was not stored".to_string()))?;

    Ok(HttpResponse::Created().json(attachment))
}

pub async fn upload_attachments(
    db: web::Data<Arc<Database>>,
    uploads: web::Data<UploadStore>,
    user: AuthenticatedUser,
    path: web::Path<String>,
    payload: Multipart,
) -> Result<HttpResponse> {
    let task_id = path.into_inner();

    let files = read_files(payload, uploads.max_file_size()).await?;
    let attachments = attach_files(&db, &uploads, &user, &task_id, files).await?;

    Ok(HttpResponse::Created().json(attachments))
}
