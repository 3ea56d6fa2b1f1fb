use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

use crate::tables::{NewColumn, NewTag, NewTask, NewUser};

pub type Pool = diesel::r2d2::Pool<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// WAL keeps readers from blocking the single writer; busy_timeout absorbs
/// write contention between pooled connections.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionOptions;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(
            "PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000; PRAGMA foreign_keys = OFF;",
        )
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

pub fn build_pool(database_url: &str) -> Result<Pool, diesel::r2d2::PoolError> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    diesel::r2d2::Pool::builder()
        .connection_customizer(Box::new(ConnectionOptions))
        .build(manager)
}

pub fn run_migrations(
    conn: &mut SqliteConnection,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    conn.run_pending_migrations(MIGRATIONS)?;
    Ok(())
}

/// Populates an empty database with the starter board. A database that
/// already has columns is left untouched.
pub fn seed(conn: &mut SqliteConnection) -> QueryResult<()> {
    use crate::schema::{columns, tags, tasks, users};

    let existing: i64 = columns::table.count().get_result(conn)?;
    if existing > 0 {
        info!("database already seeded, skipping");
        return Ok(());
    }

    diesel::insert_into(columns::table)
        .values(&vec![
            NewColumn {
                id: "todo",
                title: "To Do",
                position: 0,
            },
            NewColumn {
                id: "in-progress",
                title: "In Progress",
                position: 1,
            },
            NewColumn {
                id: "review",
                title: "Review",
                position: 2,
            },
            NewColumn {
                id: "done",
                title: "Done",
                position: 3,
            },
        ])
        .execute(conn)?;

    diesel::insert_into(users::table)
        .values(&vec![
            NewUser {
                name: "John Doe",
                avatar: Some("JD"),
            },
            NewUser {
                name: "Jane Smith",
                avatar: Some("JS"),
            },
            NewUser {
                name: "Robert Johnson",
                avatar: Some("RJ"),
            },
            NewUser {
                name: "Emily Davis",
                avatar: Some("ED"),
            },
            NewUser {
                name: "Michael Wilson",
                avatar: Some("MW"),
            },
        ])
        .execute(conn)?;

    diesel::insert_into(tags::table)
        .values(&vec![
            NewTag { name: "bug" },
            NewTag { name: "feature" },
            NewTag { name: "enhancement" },
            NewTag { name: "documentation" },
            NewTag { name: "design" },
        ])
        .execute(conn)?;

    let now = chrono::Utc::now().naive_utc();
    diesel::insert_into(tasks::table)
        .values(&vec![
            NewTask {
                title: "Setup project structure",
                description: Some("Create the initial project structure and configuration files"),
                start_date: Some(now - chrono::Duration::days(5)),
                end_date: Some(now - chrono::Duration::days(2)),
                status: "done",
                priority: "high",
                time_spent: 7200.0,
                is_tracking: false,
                created_at: now,
                updated_at: now,
                assignee_id: Some(1),
            },
            NewTask {
                title: "Implement authentication",
                description: Some("Add user authentication and authorization"),
                start_date: Some(now - chrono::Duration::days(3)),
                end_date: Some(now + chrono::Duration::days(2)),
                status: "in-progress",
                priority: "high",
                time_spent: 0.0,
                is_tracking: false,
                created_at: now,
                updated_at: now,
                assignee_id: Some(2),
            },
            NewTask {
                title: "Design UI components",
                description: Some("Create reusable UI components for the application"),
                start_date: Some(now - chrono::Duration::days(2)),
                end_date: Some(now + chrono::Duration::days(3)),
                status: "todo",
                priority: "medium",
                time_spent: 0.0,
                is_tracking: false,
                created_at: now,
                updated_at: now,
                assignee_id: Some(3),
            },
        ])
        .execute(conn)?;

    info!("database seeded with starter board");
    Ok(())
}
