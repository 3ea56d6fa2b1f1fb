use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

pub fn establish_test_connection() -> SqliteConnection {
    let mut conn =
        SqliteConnection::establish(":memory:").expect("Failed to open in-memory database");
    crate::db::run_migrations(&mut conn).expect("Failed to run migrations");
    conn
}
