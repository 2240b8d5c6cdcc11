use sqlx::SqliteConnection;

use crate::db_types::UserAccount;

/// Creates the user, or returns `None` if the login is already taken.
pub async fn insert_user(
    login: &str,
    password_hash: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<UserAccount>, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO users (login, password_hash) VALUES ($1, $2)
            ON CONFLICT (login) DO NOTHING
            RETURNING id, login, password_hash, created_at;
        "#,
    )
    .bind(login)
    .bind(password_hash)
    .fetch_optional(conn)
    .await
}

pub async fn fetch_user_by_login(login: &str, conn: &mut SqliteConnection) -> Result<Option<UserAccount>, sqlx::Error> {
    sqlx::query_as("SELECT id, login, password_hash, created_at FROM users WHERE login = $1")
        .bind(login)
        .fetch_optional(conn)
        .await
}

pub async fn fetch_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<UserAccount>, sqlx::Error> {
    sqlx::query_as("SELECT id, login, password_hash, created_at FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(conn)
        .await
}
