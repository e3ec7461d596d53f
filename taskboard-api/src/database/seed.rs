use shared_types::{NewAttachment, TaskPriority, TaskStatus, UserRole};

use crate::database::{tasks, users, Database};
use crate::helpers::password::hash_password;
use crate::policy::{NewTask, TaskChanges};

pub const DEMO_PASSWORD: &str = "password123";

struct DemoUser {
    id: &'static str,
    full_name: &'static str,
    username: &'static str,
    phone: &'static str,
    role: UserRole,
}

struct DemoTask {
    id: &'static str,
    title: &'static str,
    description: &'static str,
    priority: TaskPriority,
    due_date: &'static str,
    status: TaskStatus,
    notes: Option<&'static str>,
    assignee_ids: &'static [&'static str],
}

const DEMO_USERS: [DemoUser; 4] = [
    DemoUser {
        id: "u1",
        full_name: "Arash Admin",
        username: "admin",
        phone: "09120000001",
        role: UserRole::Admin,
    },
    DemoUser {
        id: "u2",
        full_name: "Zahra Staff",
        username: "zahra",
        phone: "09120000002",
        role: UserRole::Staff,
    },
    DemoUser {
        id: "u3",
        full_name: "Babak Staff",
        username: "babak",
        phone: "09120000003",
        role: UserRole::Staff,
    },
    DemoUser {
        id: "u4",
        full_name: "Vida Viewer",
        username: "viewer",
        phone: "09120000004",
        role: UserRole::Viewer,
    },
];

const DEMO_TASKS: [DemoTask; 9] = [
    DemoTask {
        id: "t1",
        title: "Design login page",
        description: "Create the mockups and final UI for the user login page.",
        priority: TaskPriority::High,
        due_date: "2024-08-15",
        status: TaskStatus::Doing,
        notes: Some("First draft is ready in Figma."),
        assignee_ids: &["u2"],
    },
    DemoTask {
        id: "t2",
        title: "Prepare weekly report",
        description: "Collect last week's sales figures and team performance.",
        priority: TaskPriority::Medium,
        due_date: "2024-08-12",
        status: TaskStatus::Todo,
        notes: None,
        assignee_ids: &["u3"],
    },
    DemoTask {
        id: "t3",
        title: "Fix date display bug",
        description: "The birth date is shown incorrectly on the user profile.",
        priority: TaskPriority::High,
        due_date: "2024-08-11",
        status: TaskStatus::Done,
        notes: None,
        assignee_ids: &["u2"],
    },
    DemoTask {
        id: "t4",
        title: "Review and approve task #3",
        description: "The date display fix done by Zahra needs a final review.",
        priority: TaskPriority::Medium,
        due_date: "2024-08-12",
        status: TaskStatus::Done,
        notes: None,
        assignee_ids: &["u1"],
    },
    DemoTask {
        id: "t5",
        title: "Write API documentation",
        description: "Document the user and task endpoints in Postman.",
        priority: TaskPriority::Low,
        due_date: "2024-08-20",
        status: TaskStatus::Backlog,
        notes: None,
        assignee_ids: &["u3"],
    },
    DemoTask {
        id: "t6",
        title: "Answer support tickets",
        description: "Reply to every ticket left open from last week.",
        priority: TaskPriority::High,
        due_date: "2024-08-10",
        status: TaskStatus::Approved,
        notes: None,
        assignee_ids: &["u2"],
    },
    DemoTask {
        id: "t7",
        title: "Plan the next sprint",
        description: "Meet the product team to prioritise the upcoming sprint.",
        priority: TaskPriority::Medium,
        due_date: "2024-08-18",
        status: TaskStatus::Todo,
        notes: None,
        assignee_ids: &["u1"],
    },
    DemoTask {
        id: "t8",
        title: "Update project dependencies",
        description: "Upgrade the front end and back end packages.",
        priority: TaskPriority::Low,
        due_date: "2024-08-25",
        status: TaskStatus::Rejected,
        notes: None,
        assignee_ids: &["u3"],
    },
    DemoTask {
        id: "t9",
        title: "Shared task test",
        description: "This task is assigned jointly to Zahra and Babak.",
        priority: TaskPriority::Medium,
        due_date: "2024-08-22",
        status: TaskStatus::Returned,
        notes: None,
        assignee_ids: &["u2", "u3"],
    },
];

/// (task, author, text)
const DEMO_CHAT: [(&str, &str, &str); 2] = [
    ("t9", "u2", "Hi Babak, which part should we start with?"),
    ("t9", "u3", "Hi Zahra. I'll take the front end tests."),
];

/// Insert demo users, tasks, chat and an attachment into an empty database.
///
/// Returns false without touching anything when users already exist.
pub async fn seed_demo_data(db: &Database) -> anyhow::Result<bool> {
    let conn = &db.connection;

    if users::count_users(conn).await? > 0 {
        tracing::info!("Database already has users, skipping seed");
        return Ok(false);
    }

    let password_hash = hash_password(DEMO_PASSWORD)?;
    for demo in &DEMO_USERS {
        users::insert_user(
            conn,
            &users::NewUser {
                id: Some(demo.id.to_string()),
                full_name: demo.full_name.to_string(),
                email: format!("{}@example.com", demo.username),
                username: demo.username.to_string(),
                password_hash: password_hash.clone(),
                phone: Some(demo.phone.to_string()),
                role: demo.role,
            },
        )
        .await?;
    }

    for demo in &DEMO_TASKS {
        let new_task = NewTask {
            title: demo.title.to_string(),
            description: Some(demo.description.to_string()),
            priority: demo.priority,
            due_date: demo.due_date.to_string(),
            status: demo.status,
            notes: demo.notes.map(str::to_string),
            assignee_ids: demo.assignee_ids.iter().map(|id| id.to_string()).collect(),
        };
        tasks::insert_task_with_id(conn, demo.id, &new_task).await?;
    }

    for (task_id, author_id, text) in DEMO_CHAT {
        let changes = TaskChanges {
            chat_messages: vec![text.to_string()],
            ..Default::default()
        };
        tasks::update_task(conn, task_id, author_id, &changes).await?;
    }

    let attachment = TaskChanges {
        attachments: vec![NewAttachment {
            name: "log.txt".to_string(),
            url: "/uploads/sample-log.txt".to_string(),
        }],
        ..Default::default()
    };
    tasks::update_task(conn, "t6", "u2", &attachment).await?;

    tracing::info!(
        users = DEMO_USERS.len(),
        tasks = DEMO_TASKS.len(),
        "Seeded demo data; log in as admin, zahra, babak or viewer with password {}",
        DEMO_PASSWORD
    );

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::temp_database;
    use crate::policy::TaskScope;

    #[tokio::test]
    async fn test_seed_covers_every_status_once_only() {
        let (_dir, db) = temp_database();

        assert!(seed_demo_data(&db).await.unwrap());
        assert!(!seed_demo_data(&db).await.unwrap());

        assert_eq!(users::count_users(&db.connection).await.unwrap(), 4);

        let all = tasks::list_tasks(&db.connection, &TaskScope::All).await.unwrap();
        assert_eq!(all.len(), 9);
        for status in TaskStatus::ALL {
            assert!(all.iter().any(|t| t.status == status), "no {} task", status);
        }

        let shared = tasks::get_task(&db.connection, "t9").await.unwrap();
        assert_eq!(shared.assignee_ids, vec!["u2".to_string(), "u3".to_string()]);
        let authors: Vec<&str> = shared
            .chat_messages
            .iter()
            .map(|m| m.user_id.as_str())
            .collect();
        assert_eq!(authors, vec!["u2", "u3"]);
    }
}
