use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use shared_types::{User, UserRole};

use crate::database::{parse_enum, AsyncDbConnection, StoreError};

const USER_COLUMNS: &str =
    "id, full_name, email, username, phone, role, avatar_url, created_at, updated_at";

/// User row to insert; `password_hash` is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Generated when absent
    pub id: Option<String>,
    pub full_name: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub role: UserRole,
}

#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
}

pub fn default_avatar_url(user_id: &str) -> String {
    format!("https://i.pravatar.cc/150?u={}", user_id)
}

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        username: row.get(3)?,
        phone: row.get(4)?,
        role: parse_enum(row, 5)?,
        avatar_url: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn fetch_user(conn: &Connection, id: &str) -> Result<User, StoreError> {
    let user = conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
        [id],
        row_to_user,
    )?;
    Ok(user)
}

pub async fn list_users(conn: &AsyncDbConnection) -> Result<Vec<User>, StoreError> {
    let conn = conn.lock().await?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users ORDER BY created_at DESC, rowid DESC",
        USER_COLUMNS
    ))?;

    let users = stmt
        .query_map([], row_to_user)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(users)
}

pub async fn get_user(conn: &AsyncDbConnection, id: &str) -> Result<User, StoreError> {
    let conn = conn.lock().await?;
    fetch_user(&conn, id)
}

/// Looks a user up by username together with the stored password hash
pub async fn find_credentials(
    conn: &AsyncDbConnection,
    username: &str,
) -> Result<Option<(User, String)>, StoreError> {
    let conn = conn.lock().await?;

    let found = conn
        .query_row(
            &format!(
                "SELECT {}, password_hash FROM users WHERE username = ?",
                USER_COLUMNS
            ),
            [username],
            |row| Ok((row_to_user(row)?, row.get::<_, String>(9)?)),
        )
        .optional()?;

    Ok(found)
}

pub async fn count_users(conn: &AsyncDbConnection) -> Result<i64, StoreError> {
    let conn = conn.lock().await?;
    let count = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(count)
}

pub async fn insert_user(conn: &AsyncDbConnection, user: &NewUser) -> Result<User, StoreError> {
    let conn = conn.lock().await?;
    let now = chrono::Utc::now().timestamp_millis();
    let id = user
        .id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    conn.execute(
        "INSERT INTO users
         (id, full_name, email, username, password_hash, phone, role, avatar_url,
          created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            &id,
            &user.full_name,
            &user.email,
            &user.username,
            &user.password_hash,
            &user.phone,
            user.role.as_str(),
            default_avatar_url(&id),
            now,
            now,
        ],
    )?;

    fetch_user(&conn, &id)
}

pub async fn update_user(
    conn: &AsyncDbConnection,
    id: &str,
    changes: &UserChanges,
) -> Result<User, StoreError> {
    let conn = conn.lock().await?;
    let now = chrono::Utc::now().timestamp_millis();
    let role = changes.role.map(|role| role.as_str());

    let mut updates = vec!["updated_at = ?"];
    let mut values: Vec<&dyn ToSql> = vec![&now];

    if let Some(full_name) = &changes.full_name {
        updates.push("full_name = ?");
        values.push(full_name);
    }
    if let Some(email) = &changes.email {
        updates.push("email = ?");
        values.push(email);
    }
    if let Some(username) = &changes.username {
        updates.push("username = ?");
        values.push(username);
    }
    if let Some(password_hash) = &changes.password_hash {
        updates.push("password_hash = ?");
        values.push(password_hash);
    }
    if let Some(phone) = &changes.phone {
        updates.push("phone = ?");
        values.push(phone);
    }
    if let Some(role) = &role {
        updates.push("role = ?");
        values.push(role);
    }

    values.push(&id);

    let query = format!("UPDATE users SET {} WHERE id = ?", updates.join(", "));
    let rows_affected = conn.execute(&query, values.as_slice())?;

    if rows_affected == 0 {
        return Err(StoreError::NotFound);
    }

    fetch_user(&conn, id)
}

/// Deletes a user and unlinks it from every task it was assigned to.
///
/// Attachments and chat messages keep the deleted user's id.
pub async fn delete_user(conn: &AsyncDbConnection, id: &str) -> Result<(), StoreError> {
    let mut conn = conn.lock().await?;
    let tx = conn.transaction()?;

    let unlinked = tx.execute("DELETE FROM task_assignees WHERE user_id = ?", [id])?;
    let rows_affected = tx.execute("DELETE FROM users WHERE id = ?", [id])?;

    if rows_affected == 0 {
        return Err(StoreError::NotFound);
    }

    tx.commit()?;
    tracing::debug!(user_id = id, unlinked, "Deleted user");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::temp_database;

    fn new_user(username: &str, email: &str, role: UserRole) -> NewUser {
        NewUser {
            id: None,
            full_name: format!("{} tester", username),
            email: email.to_string(),
            username: username.to_string(),
            password_hash: "hash".to_string(),
            phone: None,
            role,
        }
    }

    #[tokio::test]
    async fn test_insert_and_fetch_user() {
        let (_dir, db) = temp_database();
        let conn = &db.connection;

        let created = insert_user(conn, &new_user("zahra", "zahra@example.com", UserRole::Staff))
            .await
            .unwrap();

        assert_eq!(created.role, UserRole::Staff);
        assert_eq!(created.avatar_url, default_avatar_url(&created.id));

        let fetched = get_user(conn, &created.id).await.unwrap();
        assert_eq!(fetched, created);

        let (user, hash) = find_credentials(conn, "zahra").await.unwrap().unwrap();
        assert_eq!(user.id, created.id);
        assert_eq!(hash, "hash");
        assert!(find_credentials(conn, "nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_and_username_conflict() {
        let (_dir, db) = temp_database();
        let conn = &db.connection;

        insert_user(conn, &new_user("zahra", "zahra@example.com", UserRole::Staff))
            .await
            .unwrap();

        let err = insert_user(conn, &new_user("other", "zahra@example.com", UserRole::Staff))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ref msg) if msg == "Email already exists"));

        let err = insert_user(conn, &new_user("zahra", "other@example.com", UserRole::Staff))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ref msg) if msg == "Username already exists"));
    }

    #[tokio::test]
    async fn test_update_user_applies_only_given_fields() {
        let (_dir, db) = temp_database();
        let conn = &db.connection;

        let created = insert_user(conn, &new_user("babak", "babak@example.com", UserRole::Staff))
            .await
            .unwrap();

        let changes = UserChanges {
            phone: Some("09120000003".to_string()),
            role: Some(UserRole::Viewer),
            ..Default::default()
        };
        let updated = update_user(conn, &created.id, &changes).await.unwrap();

        assert_eq!(updated.phone.as_deref(), Some("09120000003"));
        assert_eq!(updated.role, UserRole::Viewer);
        assert_eq!(updated.email, created.email);

        let err = update_user(conn, "missing", &changes).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_delete_user_twice_is_not_found() {
        let (_dir, db) = temp_database();
        let conn = &db.connection;

        let created = insert_user(conn, &new_user("babak", "babak@example.com", UserRole::Staff))
            .await
            .unwrap();

        delete_user(conn, &created.id).await.unwrap();
        let err = delete_user(conn, &created.id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
        assert_eq!(count_users(conn).await.unwrap(), 0);
    }
}
