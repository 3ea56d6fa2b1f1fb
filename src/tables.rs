use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::columns)]
pub struct Column {
    pub id: String,
    pub title: String,
    pub position: i32,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::columns)]
pub struct NewColumn<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub position: i32,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::tasks)]
pub struct Task {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<chrono::NaiveDateTime>,
    pub end_date: Option<chrono::NaiveDateTime>,
    pub status: String,
    pub priority: String,
    pub time_spent: f64,
    pub is_tracking: bool,
    pub tracking_start_time: Option<chrono::NaiveDateTime>,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
    pub assignee_id: Option<i32>,
}

impl Task {
    /// Ids of the tasks sitting in the given column, derived from the
    /// status reference rather than stored on the column row.
    pub fn ids_for_column(
        conn: &mut SqliteConnection,
        column_id: &str,
    ) -> QueryResult<Vec<i32>> {
        use crate::schema::tasks::dsl::*;

        tasks
            .filter(status.eq(column_id))
            .select(id)
            .order(id.asc())
            .load::<i32>(conn)
    }
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::tasks)]
pub struct NewTask<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub start_date: Option<chrono::NaiveDateTime>,
    pub end_date: Option<chrono::NaiveDateTime>,
    pub status: &'a str,
    pub priority: &'a str,
    pub time_spent: f64,
    pub is_tracking: bool,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
    pub assignee_id: Option<i32>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::users)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub avatar: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub avatar: Option<&'a str>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::comments)]
pub struct Comment {
    pub id: i32,
    pub text: String,
    pub timestamp: chrono::NaiveDateTime,
    pub task_id: i32,
    pub author_id: i32,
}

impl Comment {
    pub fn for_task(conn: &mut SqliteConnection, task: i32) -> QueryResult<Vec<Comment>> {
        use crate::schema::comments::dsl::*;

        comments
            .filter(task_id.eq(task))
            .order(id.asc())
            .load::<Comment>(conn)
    }
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::comments)]
pub struct NewComment<'a> {
    pub text: &'a str,
    pub timestamp: chrono::NaiveDateTime,
    pub task_id: i32,
    pub author_id: i32,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::tags)]
pub struct Tag {
    pub id: i32,
    pub name: String,
}

impl Tag {
    /// Tags attached to a task, resolved through the association table.
    pub fn for_task(conn: &mut SqliteConnection, task: i32) -> QueryResult<Vec<Tag>> {
        use crate::schema::{tags, task_tags};

        task_tags::table
            .inner_join(tags::table)
            .filter(task_tags::task_id.eq(task))
            .select(Tag::as_select())
            .order(tags::id.asc())
            .load::<Tag>(conn)
    }
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::tags)]
pub struct NewTag<'a> {
    pub name: &'a str,
}

#[derive(Debug, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::task_tags)]
pub struct TaskTag {
    pub task_id: i32,
    pub tag_id: i32,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::task_tags)]
pub struct NewTaskTag {
    pub task_id: i32,
    pub tag_id: i32,
}
