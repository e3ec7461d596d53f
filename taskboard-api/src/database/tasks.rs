use rusqlite::{params, Connection, OptionalExtension, Row, ToSql, Transaction};
use shared_types::{Attachment, ChatMessage, Task};

use crate::database::{parse_enum, AsyncDbConnection, StoreError};
use crate::policy::{NewTask, TaskChanges, TaskScope};

const TASK_COLUMNS: &str =
    "t.id, t.title, t.description, t.priority, t.due_date, t.status, t.notes, t.created_at, t.updated_at";

/// Result of an approved update: the refreshed task plus the rows it appended
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub task: Task,
    pub chat_messages: Vec<ChatMessage>,
    pub attachments: Vec<Attachment>,
}

fn row_to_task(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        priority: parse_enum(row, 3)?,
        due_date: row.get(4)?,
        status: parse_enum(row, 5)?,
        notes: row.get(6)?,
        assignee_ids: Vec::new(),
        attachments: Vec::new(),
        chat_messages: Vec::new(),
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Fill in assignees, attachments and chat history
fn enrich(conn: &Connection, task: &mut Task) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM task_assignees WHERE task_id = ? ORDER BY rowid",
    )?;
    task.assignee_ids = stmt
        .query_map([&task.id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT id, name, url, uploader_id, created_at
         FROM attachments WHERE task_id = ? ORDER BY created_at, rowid",
    )?;
    task.attachments = stmt
        .query_map([&task.id], |row| {
            Ok(Attachment {
                id: row.get(0)?,
                name: row.get(1)?,
                url: row.get(2)?,
                uploader_id: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT id, user_id, text, timestamp
         FROM chat_messages WHERE task_id = ? ORDER BY timestamp, rowid",
    )?;
    task.chat_messages = stmt
        .query_map([&task.id], |row| {
            Ok(ChatMessage {
                id: row.get(0)?,
                user_id: row.get(1)?,
                text: row.get(2)?,
                timestamp: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(())
}

fn fetch_task(conn: &Connection, id: &str) -> Result<Option<Task>, StoreError> {
    let task = conn
        .query_row(
            &format!("SELECT {} FROM tasks t WHERE t.id = ?", TASK_COLUMNS),
            [id],
            row_to_task,
        )
        .optional()?;

    match task {
        Some(mut task) => {
            enrich(conn, &mut task)?;
            Ok(Some(task))
        }
        None => Ok(None),
    }
}

/// Replace the assignee set of a task, checking every id resolves to a user
fn replace_assignees(
    tx: &Transaction,
    task_id: &str,
    assignee_ids: &[String],
) -> Result<(), StoreError> {
    tx.execute("DELETE FROM task_assignees WHERE task_id = ?", [task_id])?;

    for user_id in assignee_ids {
        let exists = tx
            .query_row("SELECT 1 FROM users WHERE id = ?", [user_id], |_| Ok(()))
            .optional()?
            .is_some();
        if !exists {
            return Err(StoreError::UnknownUser(user_id.clone()));
        }

        tx.execute(
            "INSERT INTO task_assignees (task_id, user_id) VALUES (?, ?)",
            [task_id, user_id.as_str()],
        )?;
    }

    Ok(())
}

pub async fn list_tasks(
    conn: &AsyncDbConnection,
    scope: &TaskScope,
) -> Result<Vec<Task>, StoreError> {
    let conn = conn.lock().await?;

    let mut tasks = match scope {
        TaskScope::All => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM tasks t ORDER BY t.created_at DESC, t.rowid DESC",
                TASK_COLUMNS
            ))?;
            let tasks = stmt
                .query_map([], row_to_task)?
                .collect::<Result<Vec<_>, _>>()?;
            tasks
        }
        TaskScope::AssignedTo(user_id) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM tasks t
                 INNER JOIN task_assignees ta ON ta.task_id = t.id
                 WHERE ta.user_id = ?
                 ORDER BY t.created_at DESC, t.rowid DESC",
                TASK_COLUMNS
            ))?;
            let tasks = stmt
                .query_map([user_id], row_to_task)?
                .collect::<Result<Vec<_>, _>>()?;
            tasks
        }
    };

    for task in tasks.iter_mut() {
        enrich(&conn, task)?;
    }

    Ok(tasks)
}

pub async fn find_task(conn: &AsyncDbConnection, id: &str) -> Result<Option<Task>, StoreError> {
    let conn = conn.lock().await?;
    fetch_task(&conn, id)
}

pub async fn get_task(conn: &AsyncDbConnection, id: &str) -> Result<Task, StoreError> {
    find_task(conn, id).await?.ok_or(StoreError::NotFound)
}

pub async fn insert_task(conn: &AsyncDbConnection, task: &NewTask) -> Result<Task, StoreError> {
    let id = uuid::Uuid::new_v4().to_string();
    insert_task_with_id(conn, &id, task).await
}

/// Insert a task and its assignee links in one transaction
pub async fn insert_task_with_id(
    conn: &AsyncDbConnection,
    id: &str,
    task: &NewTask,
) -> Result<Task, StoreError> {
    let mut conn = conn.lock().await?;
    let now = chrono::Utc::now().timestamp_millis();

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO tasks
         (id, title, description, priority, due_date, status, notes, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            &task.title,
            &task.description,
            task.priority.as_str(),
            &task.due_date,
            task.status.as_str(),
            &task.notes,
            now,
            now,
        ],
    )?;
    replace_assignees(&tx, id, &task.assignee_ids)?;
    tx.commit()?;

    fetch_task(&conn, id)?.ok_or(StoreError::NotFound)
}

/// Apply an approved change set.
///
/// Row fields, the assignee set and appended chat/attachments are written in
/// a single transaction attributed to `actor_id`.
pub async fn update_task(
    conn: &AsyncDbConnection,
    id: &str,
    actor_id: &str,
    changes: &TaskChanges,
) -> Result<UpdateOutcome, StoreError> {
    let mut conn = conn.lock().await?;
    let now = chrono::Utc::now().timestamp_millis();
    let priority = changes.priority.map(|p| p.as_str());
    let status = changes.status.map(|s| s.as_str());

    let tx = conn.transaction()?;

    let mut updates = vec!["updated_at = ?"];
    let mut values: Vec<&dyn ToSql> = vec![&now];

    if let Some(title) = &changes.title {
        updates.push("title = ?");
        values.push(title);
    }
    if let Some(description) = &changes.description {
        updates.push("description = ?");
        values.push(description);
    }
    if let Some(priority) = &priority {
        updates.push("priority = ?");
        values.push(priority);
    }
    if let Some(due_date) = &changes.due_date {
        updates.push("due_date = ?");
        values.push(due_date);
    }
    if let Some(status) = &status {
        updates.push("status = ?");
        values.push(status);
    }
    if let Some(notes) = &changes.notes {
        updates.push("notes = ?");
        values.push(notes);
    }

    values.push(&id);

    let query = format!("UPDATE tasks SET {} WHERE id = ?", updates.join(", "));
    let rows_affected = tx.execute(&query, values.as_slice())?;
    if rows_affected == 0 {
        return Err(StoreError::NotFound);
    }

    if let Some(assignee_ids) = &changes.assignee_ids {
        replace_assignees(&tx, id, assignee_ids)?;
    }

    let mut chat_messages = Vec::with_capacity(changes.chat_messages.len());
    for text in &changes.chat_messages {
        let message = ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: actor_id.to_string(),
            text: text.clone(),
            timestamp: now,
        };
        tx.execute(
            "INSERT INTO chat_messages (id, task_id, user_id, text, timestamp)
             VALUES (?, ?, ?, ?, ?)",
            params![&message.id, id, &message.user_id, &message.text, message.timestamp],
        )?;
        chat_messages.push(message);
    }

    let mut attachments = Vec::with_capacity(changes.attachments.len());
    for new_attachment in &changes.attachments {
        let attachment = Attachment {
            id: uuid::Uuid::new_v4().to_string(),
            name: new_attachment.name.clone(),
            url: new_attachment.url.clone(),
            uploader_id: actor_id.to_string(),
            created_at: now,
        };
        tx.execute(
            "INSERT INTO attachments (id, task_id, name, url, uploader_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                &attachment.id,
                id,
                &attachment.name,
                &attachment.url,
                &attachment.uploader_id,
                attachment.created_at
            ],
        )?;
        attachments.push(attachment);
    }

    tx.commit()?;

    let task = fetch_task(&conn, id)?.ok_or(StoreError::NotFound)?;
    Ok(UpdateOutcome {
        task,
        chat_messages,
        attachments,
    })
}

/// Delete a task; assignee links, attachments and chat cascade with it
pub async fn delete_task(conn: &AsyncDbConnection, id: &str) -> Result<(), StoreError> {
    let conn = conn.lock().await?;
    let rows_affected = conn.execute("DELETE FROM tasks WHERE id = ?", [id])?;

    if rows_affected == 0 {
        return Err(StoreError::NotFound);
    }

    Ok(())
}
