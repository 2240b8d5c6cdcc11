use loyalty_common::Points;
use sqlx::SqliteConnection;

use crate::db_types::{NewWithdrawal, Withdrawal};

pub async fn insert_withdrawal(
    withdrawal: NewWithdrawal,
    conn: &mut SqliteConnection,
) -> Result<Withdrawal, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO withdrawals (user_id, order_tag, amount) VALUES ($1, $2, $3)
            RETURNING id, user_id, order_tag, amount, created_at;
        "#,
    )
    .bind(withdrawal.user_id)
    .bind(withdrawal.order_tag)
    .bind(withdrawal.amount)
    .fetch_one(conn)
    .await
}

/// Resulting withdrawals are ordered by `created_at` in ascending order
pub async fn fetch_withdrawals_for_user(
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Withdrawal>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT id, user_id, order_tag, amount, created_at FROM withdrawals
            WHERE user_id = $1
            ORDER BY created_at ASC, id ASC;
        "#,
    )
    .bind(user_id)
    .fetch_all(conn)
    .await
}

pub async fn total_withdrawn(user_id: i64, conn: &mut SqliteConnection) -> Result<Points, sqlx::Error> {
    let total: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM withdrawals WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(conn)
        .await?;
    Ok(Points::from(total))
}
