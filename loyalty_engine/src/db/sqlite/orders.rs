use sqlx::SqliteConnection;

use crate::db_types::{Order, OrderNumber};

/// Inserts the order unless one with the same number already exists. Returns the new row, or `None` if the number was
/// taken. The check and the insert are a single statement, so concurrent callers cannot both succeed.
pub async fn insert_if_absent(
    number: &OrderNumber,
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO orders (number, user_id) VALUES ($1, $2)
            ON CONFLICT (number) DO NOTHING
            RETURNING number, user_id, created_at;
        "#,
    )
    .bind(number)
    .bind(user_id)
    .fetch_optional(conn)
    .await
}

pub async fn fetch_order(number: &OrderNumber, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT number, user_id, created_at FROM orders WHERE number = $1")
        .bind(number)
        .fetch_optional(conn)
        .await
}

/// Resulting orders are ordered by `created_at` in ascending order
pub async fn fetch_orders_for_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT number, user_id, created_at FROM orders
            WHERE user_id = $1
            ORDER BY created_at ASC, rowid ASC;
        "#,
    )
    .bind(user_id)
    .fetch_all(conn)
    .await
}
