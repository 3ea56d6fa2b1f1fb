use super::comments::CommentResponse;
use super::tags::TagResponse;
use super::{double_option, AppState};
use crate::tables::{Comment, NewTask, NewTaskTag, Tag, Task};
use crate::TASKS_API;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel::sqlite::SqliteConnection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),

    #[error("Task not found")]
    NotFound,

    #[error("Tag not found")]
    TagNotFound,

    #[error("Internal server error")]
    InternalServerError,
}

impl IntoResponse for TaskError {
    fn into_response(self) -> Response {
        let status_code = match self {
            TaskError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TaskError::NotFound => StatusCode::NOT_FOUND,
            TaskError::TagNotFound => StatusCode::NOT_FOUND,
            TaskError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status_code, self.to_string()).into_response()
    }
}

#[derive(Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub status: String,
    #[serde(default = "default_priority")]
    pub priority: String,
    pub assignee_id: Option<i32>,
}

fn default_priority() -> String {
    "medium".to_string()
}

/// Patch for a task. Plain `Option` fields are skipped when absent;
/// nullable columns use the double-`Option` encoding so an explicit
/// `null` clears the stored value instead of being ignored.
#[derive(Deserialize, AsChangeset)]
#[diesel(table_name = crate::schema::tasks)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub start_date: Option<Option<NaiveDateTime>>,
    #[serde(default, deserialize_with = "double_option")]
    pub end_date: Option<Option<NaiveDateTime>>,
    pub status: Option<String>,
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub assignee_id: Option<Option<i32>>,
    pub time_spent: Option<f64>,
    pub is_tracking: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub tracking_start_time: Option<Option<NaiveDateTime>>,
}

#[derive(Deserialize)]
pub struct TimeTrackingRequest {
    pub is_tracking: bool,
    pub tracking_start_time: Option<NaiveDateTime>,
}

#[derive(Deserialize)]
pub struct ListTasksParams {
    pub status: Option<String>,
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Serialize)]
pub struct TaskResponse {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub status: String,
    pub priority: String,
    pub assignee_id: Option<i32>,
    pub time_spent: f64,
    pub is_tracking: bool,
    pub tracking_start_time: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub comments: Vec<CommentResponse>,
    pub tags: Vec<TagResponse>,
}

impl TaskResponse {
    fn from_parts(task: Task, comments: Vec<CommentResponse>, tags: Vec<TagResponse>) -> Self {
        Self {
            id: task.id,
            title: task.title,
            description: task.description,
            start_date: task.start_date,
            end_date: task.end_date,
            status: task.status,
            priority: task.priority,
            assignee_id: task.assignee_id,
            time_spent: task.time_spent,
            is_tracking: task.is_tracking,
            tracking_start_time: task.tracking_start_time,
            created_at: task.created_at,
            updated_at: task.updated_at,
            comments,
            tags,
        }
    }
}

/// Comments and tags are resolved per response with explicit queries, not
/// stored on the task row.
fn task_response(conn: &mut SqliteConnection, task: Task) -> QueryResult<TaskResponse> {
    let comments = Comment::for_task(conn, task.id)?
        .into_iter()
        .map(Into::into)
        .collect();
    let tags = Tag::for_task(conn, task.id)?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(TaskResponse::from_parts(task, comments, tags))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route(
            format!("/{TASKS_API}").as_str(),
            get(list_tasks).post(create_task),
        )
        .route(
            format!("/{TASKS_API}/:id").as_str(),
            get(get_task).put(update_task).delete(delete_task),
        )
        .route(
            format!("/{TASKS_API}/:id/time-tracking").as_str(),
            put(update_task_time_tracking),
        )
        .route(
            format!("/{TASKS_API}/:id/tags/:tag_id").as_str(),
            post(add_tag_to_task).delete(remove_tag_from_task),
        )
}

async fn list_tasks(
    State(state): State<AppState>,
    Query(params): Query<ListTasksParams>,
) -> Result<Json<Vec<TaskResponse>>, TaskError> {
    use crate::schema::{comments, tags, task_tags, tasks};

    let mut conn = state
        .pool
        .get()
        .map_err(|_| TaskError::InternalServerError)?;

    let mut query = tasks::table.into_boxed();
    // An empty ?status= means unfiltered, same as leaving it off.
    if let Some(column_id) = params.status.as_deref().filter(|s| !s.is_empty()) {
        query = query.filter(tasks::status.eq(column_id.to_string()));
    }

    let results = query
        .offset(params.skip)
        .limit(params.limit)
        .load::<Task>(&mut conn)
        .map_err(TaskError::DatabaseError)?;

    let ids: Vec<i32> = results.iter().map(|task| task.id).collect();

    // Batch the related rows: one query for all comments, one join for all
    // tags, grouped by task id.
    let comment_rows = comments::table
        .filter(comments::task_id.eq_any(ids.clone()))
        .order(comments::id.asc())
        .load::<Comment>(&mut conn)
        .map_err(TaskError::DatabaseError)?;

    let mut comments_by_task: HashMap<i32, Vec<CommentResponse>> = HashMap::new();
    for comment in comment_rows {
        comments_by_task
            .entry(comment.task_id)
            .or_default()
            .push(comment.into());
    }

    let tag_rows = task_tags::table
        .inner_join(tags::table)
        .filter(task_tags::task_id.eq_any(ids))
        .order(tags::id.asc())
        .select((task_tags::task_id, tags::id, tags::name))
        .load::<(i32, i32, String)>(&mut conn)
        .map_err(TaskError::DatabaseError)?;

    let mut tags_by_task: HashMap<i32, Vec<TagResponse>> = HashMap::new();
    for (task_id, tag_id, tag_name) in tag_rows {
        tags_by_task.entry(task_id).or_default().push(TagResponse {
            id: tag_id,
            name: tag_name,
        });
    }

    Ok(Json(
        results
            .into_iter()
            .map(|task| {
                let comments = comments_by_task.remove(&task.id).unwrap_or_default();
                let tags = tags_by_task.remove(&task.id).unwrap_or_default();
                TaskResponse::from_parts(task, comments, tags)
            })
            .collect(),
    ))
}

async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<i32>,
) -> Result<Json<TaskResponse>, TaskError> {
    use crate::schema::tasks::dsl::*;

    let mut conn = state
        .pool
        .get()
        .map_err(|_| TaskError::InternalServerError)?;

    let task = tasks
        .find(task_id)
        .first::<Task>(&mut conn)
        .map_err(|err| match err {
            DieselError::NotFound => TaskError::NotFound,
            _ => TaskError::DatabaseError(err),
        })?;

    let response = task_response(&mut conn, task).map_err(TaskError::DatabaseError)?;
    Ok(Json(response))
}

async fn create_task(
    State(state): State<AppState>,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), TaskError> {
    use crate::schema::tasks;

    let now = chrono::Utc::now().naive_utc();
    let new_task = NewTask {
        title: &payload.title,
        description: payload.description.as_deref(),
        start_date: payload.start_date,
        end_date: payload.end_date,
        status: &payload.status,
        priority: &payload.priority,
        time_spent: 0.0,
        is_tracking: false,
        created_at: now,
        updated_at: now,
        assignee_id: payload.assignee_id,
    };

    let mut conn = state
        .pool
        .get()
        .map_err(|_| TaskError::InternalServerError)?;

    let task = diesel::insert_into(tasks::table)
        .values(&new_task)
        .returning(Task::as_returning())
        .get_result::<Task>(&mut conn)
        .map_err(TaskError::DatabaseError)?;

    let response = task_response(&mut conn, task).map_err(TaskError::DatabaseError)?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn update_task(
    State(state): State<AppState>,
    Path(task_id): Path<i32>,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<Json<TaskResponse>, TaskError> {
    use crate::schema::tasks::dsl::*;

    let mut conn = state
        .pool
        .get()
        .map_err(|_| TaskError::InternalServerError)?;

    // updated_at rides along with every patch, so even an empty payload
    // still produces a valid (timestamp-only) update.
    let task = diesel::update(tasks.find(task_id))
        .set((&payload, updated_at.eq(chrono::Utc::now().naive_utc())))
        .returning(Task::as_returning())
        .get_result::<Task>(&mut conn)
        .map_err(|err| match err {
            DieselError::NotFound => TaskError::NotFound,
            _ => TaskError::DatabaseError(err),
        })?;

    let response = task_response(&mut conn, task).map_err(TaskError::DatabaseError)?;
    Ok(Json(response))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<i32>,
) -> Result<StatusCode, TaskError> {
    use crate::schema::{comments, task_tags, tasks};

    let mut conn = state
        .pool
        .get()
        .map_err(|_| TaskError::InternalServerError)?;

    // Comments and tag associations go with the task; tags and users stay.
    let deleted = conn
        .transaction::<usize, DieselError, _>(|conn| {
            diesel::delete(comments::table.filter(comments::task_id.eq(task_id))).execute(conn)?;
            diesel::delete(task_tags::table.filter(task_tags::task_id.eq(task_id)))
                .execute(conn)?;
            diesel::delete(tasks::table.find(task_id)).execute(conn)
        })
        .map_err(TaskError::DatabaseError)?;

    if deleted > 0 {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(TaskError::NotFound)
    }
}

async fn update_task_time_tracking(
    State(state): State<AppState>,
    Path(task_id): Path<i32>,
    Json(payload): Json<TimeTrackingRequest>,
) -> Result<Json<TaskResponse>, TaskError> {
    use crate::schema::tasks::dsl::*;

    let mut conn = state
        .pool
        .get()
        .map_err(|_| TaskError::InternalServerError)?;

    let task = tasks
        .find(task_id)
        .first::<Task>(&mut conn)
        .map_err(|err| match err {
            DieselError::NotFound => TaskError::NotFound,
            _ => TaskError::DatabaseError(err),
        })?;

    let now = chrono::Utc::now().naive_utc();

    // Stopping an active clock folds the elapsed seconds into time_spent.
    // A missing start time means there is nothing to accumulate.
    let mut spent = task.time_spent;
    if task.is_tracking && !payload.is_tracking {
        if let Some(started) = task.tracking_start_time {
            spent += (now - started).num_milliseconds() as f64 / 1000.0;
        }
    }

    let updated = diesel::update(tasks.find(task_id))
        .set((
            time_spent.eq(spent),
            is_tracking.eq(payload.is_tracking),
            tracking_start_time.eq(payload.tracking_start_time),
            updated_at.eq(now),
        ))
        .returning(Task::as_returning())
        .get_result::<Task>(&mut conn)
        .map_err(TaskError::DatabaseError)?;

    let response = task_response(&mut conn, updated).map_err(TaskError::DatabaseError)?;
    Ok(Json(response))
}

async fn add_tag_to_task(
    State(state): State<AppState>,
    Path((task_id, tag_id)): Path<(i32, i32)>,
) -> Result<Json<TaskResponse>, TaskError> {
    use crate::schema::{tags, task_tags, tasks};

    let mut conn = state
        .pool
        .get()
        .map_err(|_| TaskError::InternalServerError)?;

    tasks::table
        .find(task_id)
        .select(tasks::id)
        .first::<i32>(&mut conn)
        .map_err(|err| match err {
            DieselError::NotFound => TaskError::NotFound,
            _ => TaskError::DatabaseError(err),
        })?;

    tags::table
        .find(tag_id)
        .select(tags::id)
        .first::<i32>(&mut conn)
        .map_err(|err| match err {
            DieselError::NotFound => TaskError::TagNotFound,
            _ => TaskError::DatabaseError(err),
        })?;

    // The composite key makes the association a set; re-adding is a no-op
    // but the task is still considered touched.
    diesel::insert_into(task_tags::table)
        .values(&NewTaskTag { task_id, tag_id })
        .on_conflict_do_nothing()
        .execute(&mut conn)
        .map_err(TaskError::DatabaseError)?;

    let task = diesel::update(tasks::table.find(task_id))
        .set(tasks::updated_at.eq(chrono::Utc::now().naive_utc()))
        .returning(Task::as_returning())
        .get_result::<Task>(&mut conn)
        .map_err(TaskError::DatabaseError)?;

    let response = task_response(&mut conn, task).map_err(TaskError::DatabaseError)?;
    Ok(Json(response))
}

async fn remove_tag_from_task(
    State(state): State<AppState>,
    Path((task_id, tag_id)): Path<(i32, i32)>,
) -> Result<Json<TaskResponse>, TaskError> {
    use crate::schema::{tags, task_tags, tasks};

    let mut conn = state
        .pool
        .get()
        .map_err(|_| TaskError::InternalServerError)?;

    tasks::table
        .find(task_id)
        .select(tasks::id)
        .first::<i32>(&mut conn)
        .map_err(|err| match err {
            DieselError::NotFound => TaskError::NotFound,
            _ => TaskError::DatabaseError(err),
        })?;

    tags::table
        .find(tag_id)
        .select(tags::id)
        .first::<i32>(&mut conn)
        .map_err(|err| match err {
            DieselError::NotFound => TaskError::TagNotFound,
            _ => TaskError::DatabaseError(err),
        })?;

    let removed = diesel::delete(
        task_tags::table
            .filter(task_tags::task_id.eq(task_id))
            .filter(task_tags::tag_id.eq(tag_id)),
    )
    .execute(&mut conn)
    .map_err(TaskError::DatabaseError)?;

    // Removing a tag that was never attached leaves the task untouched,
    // including updated_at; only a real removal stamps it.
    let task = if removed > 0 {
        diesel::update(tasks::table.find(task_id))
            .set(tasks::updated_at.eq(chrono::Utc::now().naive_utc()))
            .returning(Task::as_returning())
            .get_result::<Task>(&mut conn)
            .map_err(TaskError::DatabaseError)?
    } else {
        tasks::table
            .find(task_id)
            .first::<Task>(&mut conn)
            .map_err(TaskError::DatabaseError)?
    };

    let response = task_response(&mut conn, task).map_err(TaskError::DatabaseError)?;
    Ok(Json(response))
}
