mod balance;

use crate::{
    test_utils::{drop_database, prepare_test_env, random_db_path},
    SqliteDatabase,
    UserManagement,
};

pub const ORDER_A: &str = "79927398713";
pub const ORDER_B: &str = "12345678903";
pub const ORDER_C: &str = "4561261212345467";

pub async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await
}

pub async fn cleanup(db: SqliteDatabase) {
    let url = db.url().to_string();
    db.close().await;
    drop_database(&url).await;
}

pub async fn new_user(db: &SqliteDatabase, login: &str) -> i64 {
    db.insert_user(login, "not-a-real-hash").await.expect("Error creating user").expect("Login was taken").id
}
