use super::AppState;
use crate::tables::{Column, NewColumn, Task};
use crate::COLUMNS_API;
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
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ColumnError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),

    #[error("Column not found")]
    NotFound,

    #[error("Column with this ID already exists")]
    Conflict,

    #[error("Internal server error")]
    InternalServerError,
}

impl IntoResponse for ColumnError {
    fn into_response(self) -> Response {
        let status_code = match self {
            ColumnError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ColumnError::NotFound => StatusCode::NOT_FOUND,
            ColumnError::Conflict => StatusCode::BAD_REQUEST,
            ColumnError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status_code, self.to_string()).into_response()
    }
}

#[derive(Deserialize)]
pub struct CreateColumnRequest {
    pub id: String,
    pub title: String,
    pub position: Option<i32>,
}

#[derive(Deserialize, AsChangeset)]
#[diesel(table_name = crate::schema::columns)]
pub struct UpdateColumnRequest {
    pub title: Option<String>,
    pub position: Option<i32>,
}

#[derive(Deserialize)]
pub struct ListColumnsParams {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Serialize, Deserialize)]
pub struct ColumnResponse {
    pub id: String,
    pub title: String,
    pub position: i32,
    pub task_ids: Vec<i32>,
}

impl ColumnResponse {
    fn from_parts(column: Column, task_ids: Vec<i32>) -> Self {
        Self {
            id: column.id,
            title: column.title,
            position: column.position,
            task_ids,
        }
    }
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route(
            format!("/{COLUMNS_API}").as_str(),
            get(list_columns).post(create_column),
        )
        .route(
            format!("/{COLUMNS_API}/:id").as_str(),
            get(get_column).put(update_column).delete(delete_column),
        )
}

async fn list_columns(
    State(state): State<AppState>,
    Query(params): Query<ListColumnsParams>,
) -> Result<Json<Vec<ColumnResponse>>, ColumnError> {
    use crate::schema::columns::dsl::*;
    use crate::schema::tasks;

    let mut conn = state
        .pool
        .get()
        .map_err(|_| ColumnError::InternalServerError)?;

    let results = columns
        .order(position.asc())
        .offset(params.skip)
        .limit(params.limit)
        .load::<Column>(&mut conn)
        .map_err(ColumnError::DatabaseError)?;

    // One pass over the tasks table instead of a query per column.
    let pairs = tasks::table
        .select((tasks::status, tasks::id))
        .order(tasks::id.asc())
        .load::<(String, i32)>(&mut conn)
        .map_err(ColumnError::DatabaseError)?;

    let mut ids_by_column: HashMap<String, Vec<i32>> = HashMap::new();
    for (column_id, task_id) in pairs {
        ids_by_column.entry(column_id).or_default().push(task_id);
    }

    Ok(Json(
        results
            .into_iter()
            .map(|column| {
                let task_ids = ids_by_column.remove(&column.id).unwrap_or_default();
                ColumnResponse::from_parts(column, task_ids)
            })
            .collect(),
    ))
}

async fn get_column(
    State(state): State<AppState>,
    Path(column_id): Path<String>,
) -> Result<Json<ColumnResponse>, ColumnError> {
    use crate::schema::columns::dsl::*;

    let mut conn = state
        .pool
        .get()
        .map_err(|_| ColumnError::InternalServerError)?;

    let column = columns
        .find(&column_id)
        .first::<Column>(&mut conn)
        .map_err(|err| match err {
            DieselError::NotFound => ColumnError::NotFound,
            _ => ColumnError::DatabaseError(err),
        })?;

    let task_ids =
        Task::ids_for_column(&mut conn, &column_id).map_err(ColumnError::DatabaseError)?;

    Ok(Json(ColumnResponse::from_parts(column, task_ids)))
}

async fn create_column(
    State(state): State<AppState>,
    Json(payload): Json<CreateColumnRequest>,
) -> Result<(StatusCode, Json<ColumnResponse>), ColumnError> {
    use crate::schema::columns::dsl::*;

    let mut conn = state
        .pool
        .get()
        .map_err(|_| ColumnError::InternalServerError)?;

    let existing = columns
        .find(&payload.id)
        .first::<Column>(&mut conn)
        .optional()
        .map_err(ColumnError::DatabaseError)?;

    if existing.is_some() {
        return Err(ColumnError::Conflict);
    }

    let new_column = NewColumn {
        id: &payload.id,
        title: &payload.title,
        position: payload.position.unwrap_or(0),
    };

    let column = diesel::insert_into(columns)
        .values(&new_column)
        .returning(Column::as_returning())
        .get_result::<Column>(&mut conn)
        .map_err(ColumnError::DatabaseError)?;

    Ok((
        StatusCode::CREATED,
        Json(ColumnResponse::from_parts(column, Vec::new())),
    ))
}

async fn update_column(
    State(state): State<AppState>,
    Path(column_id): Path<String>,
    Json(payload): Json<UpdateColumnRequest>,
) -> Result<Json<ColumnResponse>, ColumnError> {
    use crate::schema::columns::dsl::*;

    let mut conn = state
        .pool
        .get()
        .map_err(|_| ColumnError::InternalServerError)?;

    let result = diesel::update(columns.find(&column_id))
        .set(&payload)
        .returning(Column::as_returning())
        .get_result::<Column>(&mut conn);

    let column = match result {
        Ok(column) => column,
        // An empty patch has nothing to write; hand back the current row.
        Err(DieselError::QueryBuilderError(_)) => columns
            .find(&column_id)
            .first::<Column>(&mut conn)
            .map_err(|err| match err {
                DieselError::NotFound => ColumnError::NotFound,
                _ => ColumnError::DatabaseError(err),
            })?,
        Err(DieselError::NotFound) => return Err(ColumnError::NotFound),
        Err(err) => return Err(ColumnError::DatabaseError(err)),
    };

    let task_ids =
        Task::ids_for_column(&mut conn, &column_id).map_err(ColumnError::DatabaseError)?;

    Ok(Json(ColumnResponse::from_parts(column, task_ids)))
}

async fn delete_column(
    State(state): State<AppState>,
    Path(column_id): Path<String>,
) -> Result<StatusCode, ColumnError> {
    use crate::schema::columns::dsl::*;

    let mut conn = state
        .pool
        .get()
        .map_err(|_| ColumnError::InternalServerError)?;

    // Tasks keep their status reference; column deletion does not cascade.
    let result = diesel::delete(columns.find(&column_id))
        .execute(&mut conn)
        .map_err(ColumnError::DatabaseError)?;

    if result > 0 {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ColumnError::NotFound)
    }
}
