// Re-export the Database struct and other public items
mod article;
pub mod core;
mod event;
mod schema;
mod source;

// Re-export Database and essential traits
pub use self::core::Database;
pub use self::core::DbLockErrorExt;
pub use sqlx::Row;
