use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::ParseEnumError;

/// Task status
///
/// The intended flow is `backlog -> todo -> doing -> done -> approved | rejected`,
/// with `returned` reopening a reviewed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Backlog,
    Todo,
    Doing,
    Done,
    Returned,
    Approved,
    Rejected,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 7] = [
        TaskStatus::Backlog,
        TaskStatus::Todo,
        TaskStatus::Doing,
        TaskStatus::Done,
        TaskStatus::Returned,
        TaskStatus::Approved,
        TaskStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Backlog => "backlog",
            TaskStatus::Todo => "todo",
            TaskStatus::Doing => "doing",
            TaskStatus::Done => "done",
            TaskStatus::Returned => "returned",
            TaskStatus::Approved => "approved",
            TaskStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Approved | TaskStatus::Rejected)
    }

    /// Whether `next` is a step along the intended review flow.
    ///
    /// Nothing rejects other transitions; this only tells the caller when a
    /// status change skips or reverses the flow.
    pub fn follows_flow_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        if *self == next {
            return true;
        }
        matches!(
            (*self, next),
            (Backlog, Todo)
                | (Todo, Doing)
                | (Doing, Done)
                | (Done, Approved)
                | (Done, Rejected)
                | (Done, Returned)
                | (Approved, Returned)
                | (Rejected, Returned)
                | (Returned, Todo)
                | (Returned, Doing)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("status", s))
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            other => Err(ParseEnumError::new("priority", other)),
        }
    }
}

/// File attached to a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub url: String,
    pub uploader_id: String,
    pub created_at: i64,
}

/// Message in a task's discussion thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub user_id: String,
    pub text: String,
    pub timestamp: i64,
}

/// Task with its assignees, attachments and chat history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    /// Calendar date, `YYYY-MM-DD`
    pub due_date: String,
    pub status: TaskStatus,
    pub notes: Option<String>,
    pub assignee_ids: Vec<String>,
    pub attachments: Vec<Attachment>,
    pub chat_messages: Vec<ChatMessage>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    pub fn is_assigned_to(&self, user_id: &str) -> bool {
        self.assignee_ids.iter().any(|id| id == user_id)
    }
}

/// Request to create a new task
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub priority: TaskPriority,
    #[serde(default)]
    pub due_date: String,
    pub status: TaskStatus,
    pub notes: Option<String>,
    pub assignee_ids: Option<Vec<String>>,
}

/// Chat message appended through a task update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(deny_unknown_fields)]
pub struct NewChatMessage {
    pub text: String,
}

/// Stored upload linked to a task by the attachment endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewAttachment {
    pub name: String,
    pub url: String,
}

/// Partial task update. Only the fields present in the body are applied.
///
/// Each field is `None` when absent and `Some(None)` when sent as `null`, so
/// a present field is never confused with a missing one.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateTaskRequest {
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub title: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub description: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    #[ts(type = "TaskPriority | null")]
    pub priority: Option<Option<TaskPriority>>,
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub due_date: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    #[ts(type = "TaskStatus | null")]
    pub status: Option<Option<TaskStatus>>,
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub notes: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    #[ts(type = "Array<string> | null")]
    pub assignee_ids: Option<Option<Vec<String>>>,
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    #[ts(type = "Array<NewChatMessage> | null")]
    pub chat_messages: Option<Option<Vec<NewChatMessage>>>,
}

impl UpdateTaskRequest {
    /// Wire names of the fields present in the request, including explicit
    /// nulls, in declaration order.
    pub fn present_fields(&self) -> Vec<&'static str> {
        [
            ("title", self.title.is_some()),
            ("description", self.description.is_some()),
            ("priority", self.priority.is_some()),
            ("dueDate", self.due_date.is_some()),
            ("status", self.status.is_some()),
            ("notes", self.notes.is_some()),
            ("assigneeIds", self.assignee_ids.is_some()),
            ("chatMessages", self.chat_messages.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect()
    }
}

/// Body of the chat message endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreateChatMessageRequest {
    #[serde(default)]
    pub text: String,
}
