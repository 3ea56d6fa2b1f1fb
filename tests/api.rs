use axum::http::StatusCode;
use axum_test::TestServer;
use kanban_rest_api::{api, db};
use serde_json::{json, Value};
use tempfile::TempDir;

fn setup() -> (TestServer, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let database_url = dir.path().join("kanban.db");
    let pool = db::build_pool(database_url.to_str().expect("utf-8 path"))
        .expect("Failed to create pool");

    let mut conn = pool.get().expect("Failed to get connection");
    db::run_migrations(&mut conn).expect("Failed to run migrations");
    drop(conn);

    let server = TestServer::new(api::create_router(pool)).expect("Failed to build test server");
    (server, dir)
}

async fn create_column(server: &TestServer, id: &str, title: &str, position: i32) {
    let response = server
        .post("/api/columns")
        .json(&json!({ "id": id, "title": title, "position": position }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
}

async fn create_task(server: &TestServer, title: &str, status: &str) -> i64 {
    let response = server
        .post("/api/tasks")
        .json(&json!({ "title": title, "status": status }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json::<Value>()["id"].as_i64().expect("task id")
}

#[tokio::test]
async fn test_root_and_health() {
    let (server, _db) = setup();

    let root = server.get("/").await;
    assert_eq!(root.status_code(), StatusCode::OK);
    assert_eq!(root.json::<Value>()["message"], "Welcome to Kanban API");

    let health = server.get("/api/health").await;
    assert_eq!(health.status_code(), StatusCode::OK);
    assert_eq!(health.json::<Value>()["status"], "healthy");
}

#[tokio::test]
async fn test_board_scenario() {
    let (server, _db) = setup();

    create_column(&server, "todo", "To Do", 0).await;

    // Duplicate column id is a conflict.
    let duplicate = server
        .post("/api/columns")
        .json(&json!({ "id": "todo", "title": "Again", "position": 1 }))
        .await;
    assert_eq!(duplicate.status_code(), StatusCode::BAD_REQUEST);

    let task_id = create_task(&server, "X", "todo").await;

    let filtered = server
        .get("/api/tasks")
        .add_query_param("status", "todo")
        .await;
    assert_eq!(filtered.status_code(), StatusCode::OK);
    let tasks = filtered.json::<Value>();
    let tasks = tasks.as_array().expect("task list");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"].as_i64(), Some(task_id));
    assert_eq!(tasks[0]["title"], "X");

    let empty = server
        .get("/api/tasks")
        .add_query_param("status", "done")
        .await;
    assert!(empty.json::<Value>().as_array().expect("task list").is_empty());

    // The column view derives the task ids from the status reference.
    let column = server.get("/api/columns/todo").await;
    assert_eq!(column.status_code(), StatusCode::OK);
    let task_ids: Vec<i64> = column.json::<Value>()["task_ids"]
        .as_array()
        .expect("task ids")
        .iter()
        .map(|v| v.as_i64().expect("id"))
        .collect();
    assert_eq!(task_ids, vec![task_id]);
}

#[tokio::test]
async fn test_partial_update_distinguishes_absent_from_null() {
    let (server, _db) = setup();

    create_column(&server, "todo", "To Do", 0).await;

    let response = server
        .post("/api/tasks")
        .json(&json!({
            "title": "Original",
            "description": "keep me around",
            "status": "todo",
            "priority": "high"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let task_id = response.json::<Value>()["id"].as_i64().expect("task id");

    // Omitted fields stay untouched.
    let renamed = server
        .put(&format!("/api/tasks/{task_id}"))
        .json(&json!({ "title": "Renamed" }))
        .await;
    assert_eq!(renamed.status_code(), StatusCode::OK);
    let body = renamed.json::<Value>();
    assert_eq!(body["title"], "Renamed");
    assert_eq!(body["description"], "keep me around");
    assert_eq!(body["priority"], "high");

    // An explicit null clears the field.
    let cleared = server
        .put(&format!("/api/tasks/{task_id}"))
        .json(&json!({ "description": null }))
        .await;
    assert_eq!(cleared.status_code(), StatusCode::OK);
    let body = cleared.json::<Value>();
    assert!(body["description"].is_null());
    assert_eq!(body["title"], "Renamed");

    // An empty patch returns the task unchanged.
    let untouched = server
        .put(&format!("/api/tasks/{task_id}"))
        .json(&json!({}))
        .await;
    assert_eq!(untouched.status_code(), StatusCode::OK);
    assert_eq!(untouched.json::<Value>()["title"], "Renamed");
}

#[tokio::test]
async fn test_time_tracking_accumulates_over_http() {
    let (server, _db) = setup();

    create_column(&server, "todo", "To Do", 0).await;
    let task_id = create_task(&server, "Track me", "todo").await;

    let started_at = chrono::Utc::now().naive_utc() - chrono::Duration::seconds(300);
    let started = server
        .put(&format!("/api/tasks/{task_id}/time-tracking"))
        .json(&json!({ "is_tracking": true, "tracking_start_time": started_at }))
        .await;
    assert_eq!(started.status_code(), StatusCode::OK);
    assert_eq!(started.json::<Value>()["is_tracking"], true);

    let stopped = server
        .put(&format!("/api/tasks/{task_id}/time-tracking"))
        .json(&json!({ "is_tracking": false }))
        .await;
    assert_eq!(stopped.status_code(), StatusCode::OK);
    let body = stopped.json::<Value>();
    let spent = body["time_spent"].as_f64().expect("time spent");
    assert!(
        (299.0..=305.0).contains(&spent),
        "expected ~300 seconds, got {spent}"
    );
    assert_eq!(body["is_tracking"], false);
    assert!(body["tracking_start_time"].is_null());

    let missing = server
        .put("/api/tasks/9999/time-tracking")
        .json(&json!({ "is_tracking": true }))
        .await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tag_create_is_idempotent_by_name() {
    let (server, _db) = setup();

    let first = server.post("/api/tags").json(&json!({ "name": "bug" })).await;
    assert_eq!(first.status_code(), StatusCode::CREATED);
    let first_id = first.json::<Value>()["id"].as_i64().expect("tag id");

    let second = server.post("/api/tags").json(&json!({ "name": "bug" })).await;
    assert_eq!(second.status_code(), StatusCode::CREATED);
    assert_eq!(second.json::<Value>()["id"].as_i64(), Some(first_id));

    let all = server.get("/api/tags").await;
    assert_eq!(all.json::<Value>().as_array().expect("tag list").len(), 1);
}

#[tokio::test]
async fn test_tag_attach_detach_lifecycle() {
    let (server, _db) = setup();

    create_column(&server, "todo", "To Do", 0).await;
    let task_id = create_task(&server, "Tagged", "todo").await;

    let tag = server.post("/api/tags").json(&json!({ "name": "bug" })).await;
    let tag_id = tag.json::<Value>()["id"].as_i64().expect("tag id");

    // Adding twice yields exactly one association.
    for _ in 0..2 {
        let added = server
            .post(&format!("/api/tasks/{task_id}/tags/{tag_id}"))
            .await;
        assert_eq!(added.status_code(), StatusCode::OK);
        let tags = added.json::<Value>()["tags"]
            .as_array()
            .expect("tag list")
            .len();
        assert_eq!(tags, 1);
    }

    // Unknown tag or task is a 404.
    let bad_tag = server
        .post(&format!("/api/tasks/{task_id}/tags/9999"))
        .await;
    assert_eq!(bad_tag.status_code(), StatusCode::NOT_FOUND);
    let bad_task = server.post(&format!("/api/tasks/9999/tags/{tag_id}")).await;
    assert_eq!(bad_task.status_code(), StatusCode::NOT_FOUND);

    let removed = server
        .delete(&format!("/api/tasks/{task_id}/tags/{tag_id}"))
        .await;
    assert_eq!(removed.status_code(), StatusCode::OK);
    assert!(removed.json::<Value>()["tags"]
        .as_array()
        .expect("tag list")
        .is_empty());

    // Removing again is a silent no-op.
    let removed_again = server
        .delete(&format!("/api/tasks/{task_id}/tags/{tag_id}"))
        .await;
    assert_eq!(removed_again.status_code(), StatusCode::OK);
    assert!(removed_again.json::<Value>()["tags"]
        .as_array()
        .expect("tag list")
        .is_empty());

    // The tag itself survives detachment.
    let still_there = server.get(&format!("/api/tags/{tag_id}")).await;
    assert_eq!(still_there.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_deleting_task_removes_comments_and_associations_only() {
    let (server, _db) = setup();

    create_column(&server, "todo", "To Do", 0).await;
    let task_id = create_task(&server, "Doomed", "todo").await;

    let user = server
        .post("/api/users")
        .json(&json!({ "name": "Jane Smith", "avatar": "JS" }))
        .await;
    let user_id = user.json::<Value>()["id"].as_i64().expect("user id");

    let comment = server
        .post("/api/comments")
        .json(&json!({ "text": "first!", "task_id": task_id, "author_id": user_id }))
        .await;
    assert_eq!(comment.status_code(), StatusCode::CREATED);
    assert!(comment.json::<Value>()["timestamp"].is_string());

    let tag = server.post("/api/tags").json(&json!({ "name": "bug" })).await;
    let tag_id = tag.json::<Value>()["id"].as_i64().expect("tag id");
    server
        .post(&format!("/api/tasks/{task_id}/tags/{tag_id}"))
        .await;

    let deleted = server.delete(&format!("/api/tasks/{task_id}")).await;
    assert_eq!(deleted.status_code(), StatusCode::NO_CONTENT);

    let gone = server.get(&format!("/api/tasks/{task_id}")).await;
    assert_eq!(gone.status_code(), StatusCode::NOT_FOUND);

    let comments = server.get(&format!("/api/comments/task/{task_id}")).await;
    assert!(comments
        .json::<Value>()
        .as_array()
        .expect("comment list")
        .is_empty());

    // The tag and the user outlive the task.
    let tag_alive = server.get(&format!("/api/tags/{tag_id}")).await;
    assert_eq!(tag_alive.status_code(), StatusCode::OK);
    let user_alive = server.get(&format!("/api/users/{user_id}")).await;
    assert_eq!(user_alive.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_deleting_column_leaves_tasks_behind() {
    let (server, _db) = setup();

    create_column(&server, "todo", "To Do", 0).await;
    let task_id = create_task(&server, "Orphan", "todo").await;

    let deleted = server.delete("/api/columns/todo").await;
    assert_eq!(deleted.status_code(), StatusCode::NO_CONTENT);

    // The task keeps its dangling status reference.
    let survivor = server.get(&format!("/api/tasks/{task_id}")).await;
    assert_eq!(survivor.status_code(), StatusCode::OK);
    assert_eq!(survivor.json::<Value>()["status"], "todo");
}

#[tokio::test]
async fn test_columns_are_listed_by_position() {
    let (server, _db) = setup();

    create_column(&server, "done", "Done", 3).await;
    create_column(&server, "todo", "To Do", 0).await;
    create_column(&server, "in-progress", "In Progress", 1).await;

    let listed = server.get("/api/columns").await;
    assert_eq!(listed.status_code(), StatusCode::OK);
    let ids: Vec<String> = listed
        .json::<Value>()
        .as_array()
        .expect("column list")
        .iter()
        .map(|c| c["id"].as_str().expect("column id").to_string())
        .collect();
    assert_eq!(ids, vec!["todo", "in-progress", "done"]);
}

#[tokio::test]
async fn test_comment_flow() {
    let (server, _db) = setup();

    create_column(&server, "todo", "To Do", 0).await;
    let task_id = create_task(&server, "Discussed", "todo").await;

    let user = server
        .post("/api/users")
        .json(&json!({ "name": "John Doe" }))
        .await;
    let user_id = user.json::<Value>()["id"].as_i64().expect("user id");

    let created = server
        .post("/api/comments")
        .json(&json!({ "text": "looks good", "task_id": task_id, "author_id": user_id }))
        .await;
    assert_eq!(created.status_code(), StatusCode::CREATED);
    let comment_id = created.json::<Value>()["id"].as_i64().expect("comment id");

    let listed = server.get(&format!("/api/comments/task/{task_id}")).await;
    assert_eq!(
        listed.json::<Value>().as_array().expect("comment list").len(),
        1
    );

    let updated = server
        .put(&format!("/api/comments/{comment_id}"))
        .json(&json!({ "text": "looks great" }))
        .await;
    assert_eq!(updated.status_code(), StatusCode::OK);
    assert_eq!(updated.json::<Value>()["text"], "looks great");

    let deleted = server.delete(&format!("/api/comments/{comment_id}")).await;
    assert_eq!(deleted.status_code(), StatusCode::NO_CONTENT);

    let empty = server.get(&format!("/api/comments/task/{task_id}")).await;
    assert!(empty
        .json::<Value>()
        .as_array()
        .expect("comment list")
        .is_empty());
}

#[tokio::test]
async fn test_task_response_embeds_comments_and_tags() {
    let (server, _db) = setup();

    create_column(&server, "todo", "To Do", 0).await;
    let task_id = create_task(&server, "Full view", "todo").await;

    let user = server
        .post("/api/users")
        .json(&json!({ "name": "Jane Smith" }))
        .await;
    let user_id = user.json::<Value>()["id"].as_i64().expect("user id");

    server
        .post("/api/comments")
        .json(&json!({ "text": "note", "task_id": task_id, "author_id": user_id }))
        .await;

    let tag = server
        .post("/api/tags")
        .json(&json!({ "name": "feature" }))
        .await;
    let tag_id = tag.json::<Value>()["id"].as_i64().expect("tag id");
    server
        .post(&format!("/api/tasks/{task_id}/tags/{tag_id}"))
        .await;

    let fetched = server.get(&format!("/api/tasks/{task_id}")).await;
    let body = fetched.json::<Value>();
    let comments = body["comments"].as_array().expect("comment list");
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0]["text"], "note");
    let tags = body["tags"].as_array().expect("tag list");
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0]["name"], "feature");

    // The list endpoint carries the same nested shape.
    let listed = server.get("/api/tasks").await;
    let listed = listed.json::<Value>();
    let listed = listed.as_array().expect("task list");
    assert_eq!(listed[0]["comments"].as_array().expect("comments").len(), 1);
    assert_eq!(listed[0]["tags"].as_array().expect("tags").len(), 1);
}

#[tokio::test]
async fn test_missing_ids_yield_not_found() {
    let (server, _db) = setup();

    assert_eq!(
        server.get("/api/columns/nope").await.status_code(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        server.get("/api/tasks/9999").await.status_code(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        server.get("/api/users/9999").await.status_code(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        server.get("/api/tags/9999").await.status_code(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        server.delete("/api/tasks/9999").await.status_code(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        server
            .put("/api/users/9999")
            .json(&json!({ "name": "ghost" }))
            .await
            .status_code(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        server.delete("/api/comments/9999").await.status_code(),
        StatusCode::NOT_FOUND
    );
}
