pub mod api;
pub mod db;
pub mod schema;
pub mod tables;

#[cfg(test)]
pub mod test_utils;

pub const COLUMNS_API: &str = "api/columns";
pub const TASKS_API: &str = "api/tasks";
pub const USERS_API: &str = "api/users";
pub const COMMENTS_API: &str = "api/comments";
pub const TAGS_API: &str = "api/tags";
