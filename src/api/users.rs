use super::{double_option, AppState};
use crate::tables::{NewUser, User};
use crate::USERS_API;
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
pub enum UserError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),

    #[error("User not found")]
    NotFound,

    #[error("Internal server error")]
    InternalServerError,
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        let status_code = match self {
            UserError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            UserError::NotFound => StatusCode::NOT_FOUND,
            UserError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status_code, self.to_string()).into_response()
    }
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub avatar: Option<String>,
}

#[derive(Deserialize, AsChangeset)]
#[diesel(table_name = crate::schema::users)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub avatar: Option<Option<String>>,
}

#[derive(Deserialize)]
pub struct ListUsersParams {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i32,
    pub name: String,
    pub avatar: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            avatar: user.avatar,
        }
    }
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route(
            format!("/{USERS_API}").as_str(),
            get(list_users).post(create_user),
        )
        .route(
            format!("/{USERS_API}/:id").as_str(),
            get(get_user).put(update_user).delete(delete_user),
        )
}

async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<ListUsersParams>,
) -> Result<Json<Vec<UserResponse>>, UserError> {
    use crate::schema::users::dsl::*;

    let mut conn = state
        .pool
        .get()
        .map_err(|_| UserError::InternalServerError)?;

    let results = users
        .offset(params.skip)
        .limit(params.limit)
        .load::<User>(&mut conn)
        .map_err(UserError::DatabaseError)?;

    Ok(Json(results.into_iter().map(Into::into).collect()))
}

async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<Json<UserResponse>, UserError> {
    use crate::schema::users::dsl::*;

    let mut conn = state
        .pool
        .get()
        .map_err(|_| UserError::InternalServerError)?;

    let user = users
        .find(user_id)
        .first::<User>(&mut conn)
        .map_err(|err| match err {
            DieselError::NotFound => UserError::NotFound,
            _ => UserError::DatabaseError(err),
        })?;

    Ok(Json(user.into()))
}

async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), UserError> {
    use crate::schema::users;

    let new_user = NewUser {
        name: &payload.name,
        avatar: payload.avatar.as_deref(),
    };

    let mut conn = state
        .pool
        .get()
        .map_err(|_| UserError::InternalServerError)?;

    let user = diesel::insert_into(users::table)
        .values(&new_user)
        .returning(User::as_returning())
        .get_result::<User>(&mut conn)
        .map_err(UserError::DatabaseError)?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, UserError> {
    use crate::schema::users::dsl::*;

    let mut conn = state
        .pool
        .get()
        .map_err(|_| UserError::InternalServerError)?;

    let result = diesel::update(users.find(user_id))
        .set(&payload)
        .returning(User::as_returning())
        .get_result::<User>(&mut conn);

    let user = match result {
        Ok(user) => user,
        // Empty patch: nothing to write, return the current row.
        Err(DieselError::QueryBuilderError(_)) => users
            .find(user_id)
            .first::<User>(&mut conn)
            .map_err(|err| match err {
                DieselError::NotFound => UserError::NotFound,
                _ => UserError::DatabaseError(err),
            })?,
        Err(DieselError::NotFound) => return Err(UserError::NotFound),
        Err(err) => return Err(UserError::DatabaseError(err)),
    };

    Ok(Json(user.into()))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<StatusCode, UserError> {
    use crate::schema::users::dsl::*;

    let mut conn = state
        .pool
        .get()
        .map_err(|_| UserError::InternalServerError)?;

    // Tasks and comments referencing the user keep their author/assignee
    // ids; user deletion does not cascade.
    let result = diesel::delete(users.find(user_id))
        .execute(&mut conn)
        .map_err(UserError::DatabaseError)?;

    if result > 0 {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(UserError::NotFound)
    }
}
