//! Role-scoped authorization for task reads and writes.
//!
//! Every task mutation goes through one of the `authorize_*` functions below
//! before anything touches storage. They are pure: they look at the acting
//! user, the stored task (if any) and the typed request, and either return the
//! subset of changes that may be written or a rejection.
//!
//! | Field                                       | admin | staff (assignee)  | viewer |
//! |---------------------------------------------|-------|-------------------|--------|
//! | title, description, priority, dueDate, assigneeIds | write | -          | -      |
//! | notes                                       | write | write             | -      |
//! | status                                      | any   | only `done`       | -      |
//! | chatMessages (append)                       | write | if multi-assignee | -      |
//! | attachments (append, upload endpoints only) | write | write             | -      |

use chrono::{DateTime, NaiveDate};
use shared_types::{
    CreateTaskRequest, NewAttachment, NewChatMessage, Task, TaskPriority, TaskStatus,
    UpdateTaskRequest, UserRole,
};
use std::collections::HashSet;

/// Fields a staff member may send in a task update
pub const STAFF_WRITABLE_FIELDS: [&str; 4] = ["status", "notes", "chatMessages", "attachments"];

/// Identity of the user performing a request, as carried by the session token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: UserRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: UserRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("Task not found")]
    NotFound,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    InvalidArgument(String),
}

/// Which tasks a listing may return
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskScope {
    All,
    AssignedTo(String),
}

/// Approved task creation
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub due_date: String,
    pub status: TaskStatus,
    pub notes: Option<String>,
    pub assignee_ids: Vec<String>,
}

/// Approved subset of a task update
///
/// `None` fields are left untouched; `Some(None)` clears a nullable column.
/// `assignee_ids` replaces the whole set when present. Chat messages and
/// attachments are appended and attributed to the acting user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<String>,
    pub status: Option<TaskStatus>,
    pub notes: Option<Option<String>>,
    pub assignee_ids: Option<Vec<String>>,
    pub chat_messages: Vec<String>,
    pub attachments: Vec<NewAttachment>,
}

impl TaskChanges {
    /// True when a column of the `tasks` row itself changes
    pub fn touches_task_row(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.priority.is_some()
            || self.due_date.is_some()
            || self.status.is_some()
            || self.notes.is_some()
    }
}

pub fn require_role(actor: &Actor, allowed: &[UserRole]) -> Result<(), PolicyError> {
    if allowed.contains(&actor.role) {
        Ok(())
    } else {
        Err(PolicyError::Forbidden("Insufficient permissions".to_string()))
    }
}

/// Admins and viewers see every task; staff only the ones assigned to them.
pub fn task_scope(actor: &Actor) -> TaskScope {
    match actor.role {
        UserRole::Admin | UserRole::Viewer => TaskScope::All,
        UserRole::Staff => TaskScope::AssignedTo(actor.id.clone()),
    }
}

pub fn authorize_task_view(actor: &Actor, task: Option<&Task>) -> Result<(), PolicyError> {
    let task = task.ok_or(PolicyError::NotFound)?;
    match task_scope(actor) {
        TaskScope::All => Ok(()),
        TaskScope::AssignedTo(user_id) if task.is_assigned_to(&user_id) => Ok(()),
        TaskScope::AssignedTo(_) => Err(PolicyError::Forbidden(
            "You can only view tasks assigned to you".to_string(),
        )),
    }
}

pub fn authorize_task_creation(
    actor: &Actor,
    request: CreateTaskRequest,
) -> Result<NewTask, PolicyError> {
    if actor.role != UserRole::Admin {
        return Err(PolicyError::Forbidden(
            "Only admins can create tasks".to_string(),
        ));
    }

    let title = request.title.trim().to_string();
    let description = request.description.trim().to_string();

    let mut missing = Vec::new();
    if title.is_empty() {
        missing.push("title");
    }
    if description.is_empty() {
        missing.push("description");
    }
    if request.due_date.trim().is_empty() {
        missing.push("dueDate");
    }
    if !missing.is_empty() {
        return Err(PolicyError::InvalidArgument(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    Ok(NewTask {
        title,
        description: Some(description),
        priority: request.priority,
        due_date: normalize_due_date(&request.due_date)?,
        status: request.status,
        notes: request.notes,
        assignee_ids: normalize_assignee_ids(request.assignee_ids.unwrap_or_default())?,
    })
}

/// Decide which parts of `request` the actor may apply to `existing`.
///
/// The whole request is rejected when any part of it is not allowed; a
/// rejection never yields a partial change set.
pub fn authorize_task_mutation(
    actor: &Actor,
    existing: Option<&Task>,
    request: UpdateTaskRequest,
) -> Result<TaskChanges, PolicyError> {
    let task = existing.ok_or(PolicyError::NotFound)?;
    ensure_can_modify(actor, task)?;

    if actor.role == UserRole::Admin {
        authorize_admin_mutation(request)
    } else {
        authorize_staff_mutation(task, request)
    }
}

/// Attachments only come from the upload endpoints, never from a task update.
pub fn authorize_attachment_upload(
    actor: &Actor,
    existing: Option<&Task>,
    attachments: Vec<NewAttachment>,
) -> Result<TaskChanges, PolicyError> {
    let task = existing.ok_or(PolicyError::NotFound)?;
    ensure_can_modify(actor, task)?;

    if attachments.is_empty() {
        return Err(PolicyError::InvalidArgument("No file uploaded".to_string()));
    }
    if attachments
        .iter()
        .any(|a| a.name.trim().is_empty() || a.url.trim().is_empty())
    {
        return Err(PolicyError::InvalidArgument(
            "Attachments need a name and a url".to_string(),
        ));
    }

    Ok(TaskChanges {
        attachments,
        ..TaskChanges::default()
    })
}

pub fn authorize_task_deletion(actor: &Actor, existing: Option<&Task>) -> Result<(), PolicyError> {
    existing.ok_or(PolicyError::NotFound)?;
    if actor.role != UserRole::Admin {
        return Err(PolicyError::Forbidden(
            "Only admins can delete tasks".to_string(),
        ));
    }
    Ok(())
}

fn ensure_can_modify(actor: &Actor, task: &Task) -> Result<(), PolicyError> {
    match actor.role {
        UserRole::Viewer => Err(PolicyError::Forbidden(
            "Viewers cannot modify tasks".to_string(),
        )),
        UserRole::Staff if !task.is_assigned_to(&actor.id) => Err(PolicyError::Forbidden(
            "You can only modify tasks assigned to you".to_string(),
        )),
        _ => Ok(()),
    }
}

fn authorize_staff_mutation(
    task: &Task,
    request: UpdateTaskRequest,
) -> Result<TaskChanges, PolicyError> {
    let disallowed: Vec<&str> = request
        .present_fields()
        .into_iter()
        .filter(|field| !STAFF_WRITABLE_FIELDS.contains(field))
        .collect();
    if !disallowed.is_empty() {
        return Err(PolicyError::Forbidden(format!(
            "Staff can only update: {}. Cannot update: {}",
            STAFF_WRITABLE_FIELDS.join(", "),
            disallowed.join(", ")
        )));
    }

    let status = non_null("status", request.status)?;
    if let Some(status) = status {
        if status != TaskStatus::Done {
            return Err(PolicyError::Forbidden(
                "Staff can only change status to \"done\"".to_string(),
            ));
        }
    }

    let chat_messages = non_null("chatMessages", request.chat_messages)?;
    if chat_messages.is_some() && task.assignee_ids.len() < 2 {
        return Err(PolicyError::Forbidden(
            "Chat is only available on tasks shared by several assignees".to_string(),
        ));
    }

    Ok(TaskChanges {
        status,
        notes: request.notes,
        chat_messages: normalize_chat_messages(chat_messages)?,
        ..TaskChanges::default()
    })
}

fn authorize_admin_mutation(request: UpdateTaskRequest) -> Result<TaskChanges, PolicyError> {
    let title = match non_null("title", request.title)? {
        Some(title) if title.trim().is_empty() => {
            return Err(PolicyError::InvalidArgument(
                "Title cannot be empty".to_string(),
            ))
        }
        Some(title) => Some(title.trim().to_string()),
        None => None,
    };

    let due_date = non_null("dueDate", request.due_date)?
        .as_deref()
        .map(normalize_due_date)
        .transpose()?;

    let assignee_ids = non_null("assigneeIds", request.assignee_ids)?
        .map(normalize_assignee_ids)
        .transpose()?;

    Ok(TaskChanges {
        title,
        description: request.description,
        priority: non_null("priority", request.priority)?,
        due_date,
        status: non_null("status", request.status)?,
        notes: request.notes,
        assignee_ids,
        chat_messages: normalize_chat_messages(non_null(
            "chatMessages",
            request.chat_messages,
        )?)?,
        attachments: Vec::new(),
    })
}

/// Unwraps a field that may be absent but not `null`
fn non_null<T>(field: &str, value: Option<Option<T>>) -> Result<Option<T>, PolicyError> {
    match value {
        Some(None) => Err(PolicyError::InvalidArgument(format!(
            "{} cannot be null",
            field
        ))),
        Some(Some(value)) => Ok(Some(value)),
        None => Ok(None),
    }
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp and returns the calendar date
pub fn normalize_due_date(raw: &str) -> Result<String, PolicyError> {
    let raw = raw.trim();
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .ok_or_else(|| PolicyError::InvalidArgument("Invalid due date format".to_string()))?;

    Ok(date.format("%Y-%m-%d").to_string())
}

/// Trims ids and drops repeats, keeping the first occurrence
fn normalize_assignee_ids(ids: Vec<String>) -> Result<Vec<String>, PolicyError> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(ids.len());

    for id in ids {
        let id = id.trim().to_string();
        if id.is_empty() {
            return Err(PolicyError::InvalidArgument(
                "Assignee ids cannot be empty".to_string(),
            ));
        }
        if seen.insert(id.clone()) {
            normalized.push(id);
        }
    }

    Ok(normalized)
}

fn normalize_chat_messages(
    messages: Option<Vec<NewChatMessage>>,
) -> Result<Vec<String>, PolicyError> {
    messages
        .unwrap_or_default()
        .into_iter()
        .map(|message| {
            let text = message.text.trim();
            if text.is_empty() {
                Err(PolicyError::InvalidArgument(
                    "Message text is required".to_string(),
                ))
            } else {
                Ok(text.to_string())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_with_assignees(assignees: &[&str]) -> Task {
        Task {
            id: "t1".to_string(),
            title: "Design login page".to_string(),
            description: Some("Mockups for the login screen".to_string()),
            priority: TaskPriority::High,
            due_date: "2024-08-15".to_string(),
            status: TaskStatus::Doing,
            notes: None,
            assignee_ids: assignees.iter().map(|id| id.to_string()).collect(),
            attachments: vec![],
            chat_messages: vec![],
            created_at: 0,
            updated_at: 0,
        }
    }

    fn admin() -> Actor {
        Actor::new("u1", UserRole::Admin)
    }

    fn staff(id: &str) -> Actor {
        Actor::new(id, UserRole::Staff)
    }

    fn chat(text: &str) -> Option<Option<Vec<NewChatMessage>>> {
        Some(Some(vec![NewChatMessage {
            text: text.to_string(),
        }]))
    }

    fn attachment(name: &str) -> NewAttachment {
        NewAttachment {
            name: name.to_string(),
            url: format!("/uploads/1-{}", name),
        }
    }

    fn create_request() -> CreateTaskRequest {
        CreateTaskRequest {
            title: "Design login page".to_string(),
            description: "Final UI for the login screen".to_string(),
            priority: TaskPriority::High,
            due_date: "2024-08-15".to_string(),
            status: TaskStatus::Todo,
            notes: None,
            assignee_ids: Some(vec!["u2".to_string()]),
        }
    }

    #[test]
    fn test_unknown_task_is_not_found_before_role_checks() {
        let viewer = Actor::new("u4", UserRole::Viewer);
        let result = authorize_task_mutation(&viewer, None, UpdateTaskRequest::default());
        assert_eq!(result, Err(PolicyError::NotFound));

        let result = authorize_task_deletion(&staff("u2"), None);
        assert_eq!(result, Err(PolicyError::NotFound));
    }

    #[test]
    fn test_viewer_cannot_mutate() {
        let task = task_with_assignees(&["u2"]);
        let viewer = Actor::new("u4", UserRole::Viewer);
        let request = UpdateTaskRequest {
            notes: Some(Some("looks good".to_string())),
            ..Default::default()
        };

        let result = authorize_task_mutation(&viewer, Some(&task), request);
        assert!(matches!(result, Err(PolicyError::Forbidden(_))));
    }

    #[test]
    fn test_staff_must_be_assignee() {
        let task = task_with_assignees(&["u2"]);
        let request = UpdateTaskRequest {
            status: Some(Some(TaskStatus::Done)),
            ..Default::default()
        };

        let result = authorize_task_mutation(&staff("u3"), Some(&task), request);
        assert_eq!(
            result,
            Err(PolicyError::Forbidden(
                "You can only modify tasks assigned to you".to_string()
            ))
        );
    }

    #[test]
    fn test_staff_disallowed_fields_are_enumerated() {
        let task = task_with_assignees(&["u2"]);
        let request = UpdateTaskRequest {
            title: Some(Some("New title".to_string())),
            due_date: Some(Some("2024-09-01".to_string())),
            notes: Some(Some("fine".to_string())),
            ..Default::default()
        };

        let result = authorize_task_mutation(&staff("u2"), Some(&task), request);
        assert_eq!(
            result,
            Err(PolicyError::Forbidden(
                "Staff can only update: status, notes, chatMessages, attachments. Cannot update: title, dueDate"
                    .to_string()
            ))
        );
    }

    #[test]
    fn test_staff_status_only_to_done() {
        let task = task_with_assignees(&["u2"]);

        for status in TaskStatus::ALL {
            let request = UpdateTaskRequest {
                status: Some(Some(status)),
                ..Default::default()
            };
            let result = authorize_task_mutation(&staff("u2"), Some(&task), request);

            if status == TaskStatus::Done {
                assert_eq!(result.unwrap().status, Some(TaskStatus::Done));
            } else {
                assert!(
                    matches!(result, Err(PolicyError::Forbidden(_))),
                    "staff moved task to {}",
                    status
                );
            }
        }
    }

    #[test]
    fn test_staff_changes_carry_only_allowed_fields() {
        let task = task_with_assignees(&["u2"]);
        let request = UpdateTaskRequest {
            status: Some(Some(TaskStatus::Done)),
            notes: Some(Some("Shipped".to_string())),
            ..Default::default()
        };

        let changes = authorize_task_mutation(&staff("u2"), Some(&task), request).unwrap();
        assert_eq!(changes.status, Some(TaskStatus::Done));
        assert_eq!(changes.notes, Some(Some("Shipped".to_string())));
        assert!(changes.attachments.is_empty());
        assert!(changes.title.is_none());
        assert!(changes.assignee_ids.is_none());
    }

    #[test]
    fn test_staff_null_admin_field_is_still_rejected() {
        let task = task_with_assignees(&["u2"]);
        let request = UpdateTaskRequest {
            title: Some(None),
            status: Some(Some(TaskStatus::Done)),
            ..Default::default()
        };

        let result = authorize_task_mutation(&staff("u2"), Some(&task), request);
        assert_eq!(
            result,
            Err(PolicyError::Forbidden(
                "Staff can only update: status, notes, chatMessages, attachments. Cannot update: title"
                    .to_string()
            ))
        );
    }

    #[test]
    fn test_null_clears_nullable_fields_only() {
        let task = task_with_assignees(&["u2"]);

        let request = UpdateTaskRequest {
            description: Some(None),
            notes: Some(None),
            ..Default::default()
        };
        let changes = authorize_task_mutation(&admin(), Some(&task), request).unwrap();
        assert_eq!(changes.description, Some(None));
        assert_eq!(changes.notes, Some(None));
        assert!(changes.touches_task_row());

        let request = UpdateTaskRequest {
            due_date: Some(None),
            ..Default::default()
        };
        let result = authorize_task_mutation(&admin(), Some(&task), request);
        assert_eq!(
            result,
            Err(PolicyError::InvalidArgument(
                "dueDate cannot be null".to_string()
            ))
        );

        let request = UpdateTaskRequest {
            status: Some(None),
            ..Default::default()
        };
        let result = authorize_task_mutation(&staff("u2"), Some(&task), request);
        assert!(matches!(result, Err(PolicyError::InvalidArgument(_))));
    }

    #[test]
    fn test_attachment_upload_follows_assignment() {
        let task = task_with_assignees(&["u2"]);

        let changes =
            authorize_attachment_upload(&staff("u2"), Some(&task), vec![attachment("log.txt")])
                .unwrap();
        assert_eq!(changes.attachments, vec![attachment("log.txt")]);
        assert!(!changes.touches_task_row());

        let result =
            authorize_attachment_upload(&staff("u3"), Some(&task), vec![attachment("log.txt")]);
        assert!(matches!(result, Err(PolicyError::Forbidden(_))));

        let viewer = Actor::new("u4", UserRole::Viewer);
        let result = authorize_attachment_upload(&viewer, Some(&task), vec![attachment("log.txt")]);
        assert!(matches!(result, Err(PolicyError::Forbidden(_))));

        let result = authorize_attachment_upload(&admin(), None, vec![attachment("log.txt")]);
        assert_eq!(result, Err(PolicyError::NotFound));

        let result = authorize_attachment_upload(&admin(), Some(&task), vec![]);
        assert!(matches!(result, Err(PolicyError::InvalidArgument(_))));
    }

    #[test]
    fn test_staff_chat_requires_shared_task() {
        let solo = task_with_assignees(&["u2"]);
        let request = UpdateTaskRequest {
            chat_messages: chat("hello"),
            ..Default::default()
        };
        let result = authorize_task_mutation(&staff("u2"), Some(&solo), request.clone());
        assert!(matches!(result, Err(PolicyError::Forbidden(_))));

        let shared = task_with_assignees(&["u2", "u3"]);
        let changes = authorize_task_mutation(&staff("u2"), Some(&shared), request).unwrap();
        assert_eq!(changes.chat_messages, vec!["hello".to_string()]);
    }

    #[test]
    fn test_chat_text_is_trimmed_and_blank_rejected() {
        let task = task_with_assignees(&["u2", "u3"]);

        let request = UpdateTaskRequest {
            chat_messages: chat("  on it  "),
            ..Default::default()
        };
        let changes = authorize_task_mutation(&admin(), Some(&task), request).unwrap();
        assert_eq!(changes.chat_messages, vec!["on it".to_string()]);

        let request = UpdateTaskRequest {
            chat_messages: chat(" \n\t "),
            ..Default::default()
        };
        let result = authorize_task_mutation(&staff("u3"), Some(&task), request);
        assert_eq!(
            result,
            Err(PolicyError::InvalidArgument(
                "Message text is required".to_string()
            ))
        );
    }

    #[test]
    fn test_admin_may_set_any_status_and_fields() {
        let task = task_with_assignees(&["u2"]);
        let request = UpdateTaskRequest {
            title: Some(Some("  Review login page ".to_string())),
            status: Some(Some(TaskStatus::Rejected)),
            due_date: Some(Some("2024-08-20T10:00:00Z".to_string())),
            assignee_ids: Some(Some(vec![
                "u2".to_string(),
                "u3".to_string(),
                "u2".to_string(),
            ])),
            ..Default::default()
        };

        let changes = authorize_task_mutation(&admin(), Some(&task), request).unwrap();
        assert_eq!(changes.title.as_deref(), Some("Review login page"));
        assert_eq!(changes.status, Some(TaskStatus::Rejected));
        assert_eq!(changes.due_date.as_deref(), Some("2024-08-20"));
        assert_eq!(
            changes.assignee_ids,
            Some(vec!["u2".to_string(), "u3".to_string()])
        );
        assert!(changes.touches_task_row());
    }

    #[test]
    fn test_admin_invalid_due_date_rejected() {
        let task = task_with_assignees(&[]);
        let request = UpdateTaskRequest {
            due_date: Some(Some("next tuesday".to_string())),
            ..Default::default()
        };

        let result = authorize_task_mutation(&admin(), Some(&task), request);
        assert_eq!(
            result,
            Err(PolicyError::InvalidArgument(
                "Invalid due date format".to_string()
            ))
        );
    }

    #[test]
    fn test_only_admin_creates_tasks() {
        for role in [UserRole::Staff, UserRole::Viewer] {
            let actor = Actor::new("u2", role);
            let result = authorize_task_creation(&actor, create_request());
            assert!(matches!(result, Err(PolicyError::Forbidden(_))));
        }

        let new_task = authorize_task_creation(&admin(), create_request()).unwrap();
        assert_eq!(new_task.title, "Design login page");
        assert_eq!(new_task.status, TaskStatus::Todo);
        assert_eq!(new_task.assignee_ids, vec!["u2".to_string()]);
    }

    #[test]
    fn test_creation_requires_non_blank_fields() {
        let request = CreateTaskRequest {
            title: "   ".to_string(),
            description: String::new(),
            ..create_request()
        };

        let result = authorize_task_creation(&admin(), request);
        assert_eq!(
            result,
            Err(PolicyError::InvalidArgument(
                "Missing required fields: title, description".to_string()
            ))
        );
    }

    #[test]
    fn test_staff_only_sees_assigned_tasks() {
        let task = task_with_assignees(&["u2"]);

        assert_eq!(task_scope(&admin()), TaskScope::All);
        assert_eq!(
            task_scope(&staff("u3")),
            TaskScope::AssignedTo("u3".to_string())
        );
        assert!(authorize_task_view(&staff("u2"), Some(&task)).is_ok());
        assert!(authorize_task_view(&staff("u3"), Some(&task)).is_err());
        assert!(authorize_task_view(&Actor::new("u4", UserRole::Viewer), Some(&task)).is_ok());
    }

    #[test]
    fn test_require_role() {
        assert!(require_role(&admin(), &[UserRole::Admin]).is_ok());
        assert!(require_role(&staff("u2"), &[UserRole::Admin]).is_err());
    }
}
