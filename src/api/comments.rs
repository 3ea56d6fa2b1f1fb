use super::AppState;
use crate::tables::{Comment, NewComment};
use crate::COMMENTS_API;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommentError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),

    #[error("Comment not found")]
    NotFound,

    #[error("Internal server error")]
    InternalServerError,
}

impl IntoResponse for CommentError {
    fn into_response(self) -> Response {
        let status_code = match self {
            CommentError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CommentError::NotFound => StatusCode::NOT_FOUND,
            CommentError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status_code, self.to_string()).into_response()
    }
}

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub text: String,
    pub task_id: i32,
    pub author_id: i32,
}

#[derive(Deserialize, AsChangeset)]
#[diesel(table_name = crate::schema::comments)]
pub struct UpdateCommentRequest {
    pub text: Option<String>,
}

#[derive(Deserialize)]
pub struct ListCommentsParams {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Serialize, Deserialize)]
pub struct CommentResponse {
    pub id: i32,
    pub text: String,
    pub task_id: i32,
    pub author_id: i32,
    pub timestamp: chrono::NaiveDateTime,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            text: comment.text,
            task_id: comment.task_id,
            author_id: comment.author_id,
            timestamp: comment.timestamp,
        }
    }
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route(
            format!("/{COMMENTS_API}/task/:task_id").as_str(),
            get(list_comments_by_task),
        )
        .route(format!("/{COMMENTS_API}").as_str(), post(create_comment))
        .route(
            format!("/{COMMENTS_API}/:id").as_str(),
            put(update_comment).delete(delete_comment),
        )
}

async fn list_comments_by_task(
    State(state): State<AppState>,
    Path(comment_task_id): Path<i32>,
    Query(params): Query<ListCommentsParams>,
) -> Result<Json<Vec<CommentResponse>>, CommentError> {
    use crate::schema::comments::dsl::*;

    let mut conn = state
        .pool
        .get()
        .map_err(|_| CommentError::InternalServerError)?;

    // An unknown task id simply yields an empty list.
    let results = comments
        .filter(task_id.eq(comment_task_id))
        .offset(params.skip)
        .limit(params.limit)
        .load::<Comment>(&mut conn)
        .map_err(CommentError::DatabaseError)?;

    Ok(Json(results.into_iter().map(Into::into).collect()))
}

async fn create_comment(
    State(state): State<AppState>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), CommentError> {
    use crate::schema::comments;

    let new_comment = NewComment {
        text: &payload.text,
        timestamp: chrono::Utc::now().naive_utc(),
        task_id: payload.task_id,
        author_id: payload.author_id,
    };

    let mut conn = state
        .pool
        .get()
        .map_err(|_| CommentError::InternalServerError)?;

    let comment = diesel::insert_into(comments::table)
        .values(&new_comment)
        .returning(Comment::as_returning())
        .get_result::<Comment>(&mut conn)
        .map_err(CommentError::DatabaseError)?;

    Ok((StatusCode::CREATED, Json(comment.into())))
}

async fn update_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<i32>,
    Json(payload): Json<UpdateCommentRequest>,
) -> Result<Json<CommentResponse>, CommentError> {
    use crate::schema::comments::dsl::*;

    let mut conn = state
        .pool
        .get()
        .map_err(|_| CommentError::InternalServerError)?;

    // Only the text is editable; the creation timestamp never changes.
    let result = diesel::update(comments.find(comment_id))
        .set(&payload)
        .returning(Comment::as_returning())
        .get_result::<Comment>(&mut conn);

    let comment = match result {
        Ok(comment) => comment,
        Err(DieselError::QueryBuilderError(_)) => comments
            .find(comment_id)
            .first::<Comment>(&mut conn)
            .map_err(|err| match err {
                DieselError::NotFound => CommentError::NotFound,
                _ => CommentError::DatabaseError(err),
            })?,
        Err(DieselError::NotFound) => return Err(CommentError::NotFound),
        Err(err) => return Err(CommentError::DatabaseError(err)),
    };

    Ok(Json(comment.into()))
}

async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<i32>,
) -> Result<StatusCode, CommentError> {
    use crate::schema::comments::dsl::*;

    let mut conn = state
        .pool
        .get()
        .map_err(|_| CommentError::InternalServerError)?;

    let result = diesel::delete(comments.find(comment_id))
        .execute(&mut conn)
        .map_err(CommentError::DatabaseError)?;

    if result > 0 {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(CommentError::NotFound)
    }
}
