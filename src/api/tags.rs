use super::AppState;
use crate::tables::{NewTag, Tag};
use crate::TAGS_API;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TagError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),

    #[error("Tag not found")]
    NotFound,

    #[error("Internal server error")]
    InternalServerError,
}

impl IntoResponse for TagError {
    fn into_response(self) -> Response {
        let status_code = match self {
            TagError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TagError::NotFound => StatusCode::NOT_FOUND,
            TagError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status_code, self.to_string()).into_response()
    }
}

#[derive(Deserialize)]
pub struct CreateTagRequest {
    pub name: String,
}

#[derive(Deserialize, AsChangeset)]
#[diesel(table_name = crate::schema::tags)]
pub struct UpdateTagRequest {
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct ListTagsParams {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Serialize, Deserialize)]
pub struct TagResponse {
    pub id: i32,
    pub name: String,
}

impl From<Tag> for TagResponse {
    fn from(tag: Tag) -> Self {
        Self {
            id: tag.id,
            name: tag.name,
        }
    }
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route(
            format!("/{TAGS_API}").as_str(),
            get(list_tags).post(create_tag),
        )
        .route(
            format!("/{TAGS_API}/:id").as_str(),
            get(get_tag).put(update_tag).delete(delete_tag),
        )
}

async fn list_tags(
    State(state): State<AppState>,
    Query(params): Query<ListTagsParams>,
) -> Result<Json<Vec<TagResponse>>, TagError> {
    use crate::schema::tags::dsl::*;

    let mut conn = state.pool.get().map_err(|_| TagError::InternalServerError)?;

    let results = tags
        .offset(params.skip)
        .limit(params.limit)
        .load::<Tag>(&mut conn)
        .map_err(TagError::DatabaseError)?;

    Ok(Json(results.into_iter().map(Into::into).collect()))
}

async fn get_tag(
    State(state): State<AppState>,
    Path(tag_id): Path<i32>,
) -> Result<Json<TagResponse>, TagError> {
    use crate::schema::tags::dsl::*;

    let mut conn = state.pool.get().map_err(|_| TagError::InternalServerError)?;

    let tag = tags
        .find(tag_id)
        .first::<Tag>(&mut conn)
        .map_err(|err| match err {
            DieselError::NotFound => TagError::NotFound,
            _ => TagError::DatabaseError(err),
        })?;

    Ok(Json(tag.into()))
}

async fn create_tag(
    State(state): State<AppState>,
    Json(payload): Json<CreateTagRequest>,
) -> Result<(StatusCode, Json<TagResponse>), TagError> {
    use crate::schema::tags::dsl::*;

    let mut conn = state.pool.get().map_err(|_| TagError::InternalServerError)?;

    // Creation is idempotent by name: an exact match hands back the
    // existing row instead of violating the unique constraint.
    let existing = tags
        .filter(name.eq(&payload.name))
        .first::<Tag>(&mut conn)
        .optional()
        .map_err(TagError::DatabaseError)?;

    if let Some(tag) = existing {
        return Ok((StatusCode::CREATED, Json(tag.into())));
    }

    let tag = diesel::insert_into(tags)
        .values(&NewTag {
            name: &payload.name,
        })
        .returning(Tag::as_returning())
        .get_result::<Tag>(&mut conn)
        .map_err(TagError::DatabaseError)?;

    Ok((StatusCode::CREATED, Json(tag.into())))
}

async fn update_tag(
    State(state): State<AppState>,
    Path(tag_id): Path<i32>,
    Json(payload): Json<UpdateTagRequest>,
) -> Result<Json<TagResponse>, TagError> {
    use crate::schema::tags::dsl::*;

    let mut conn = state.pool.get().map_err(|_| TagError::InternalServerError)?;

    let result = diesel::update(tags.find(tag_id))
        .set(&payload)
        .returning(Tag::as_returning())
        .get_result::<Tag>(&mut conn);

    let tag = match result {
        Ok(tag) => tag,
        Err(DieselError::QueryBuilderError(_)) => tags
            .find(tag_id)
            .first::<Tag>(&mut conn)
            .map_err(|err| match err {
                DieselError::NotFound => TagError::NotFound,
                _ => TagError::DatabaseError(err),
            })?,
        Err(DieselError::NotFound) => return Err(TagError::NotFound),
        Err(err) => return Err(TagError::DatabaseError(err)),
    };

    Ok(Json(tag.into()))
}

async fn delete_tag(
    State(state): State<AppState>,
    Path(tag_id): Path<i32>,
) -> Result<StatusCode, TagError> {
    use crate::schema::{tags, task_tags};

    let mut conn = state.pool.get().map_err(|_| TagError::InternalServerError)?;

    // Association rows go with the tag; the tasks themselves are untouched.
    let result = conn
        .transaction::<usize, DieselError, _>(|conn| {
            diesel::delete(task_tags::table.filter(task_tags::tag_id.eq(tag_id)))
                .execute(conn)?;
            diesel::delete(tags::table.find(tag_id)).execute(conn)
        })
        .map_err(TagError::DatabaseError)?;

    if result > 0 {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(TagError::NotFound)
    }
}
