pub mod clustering;
pub mod config;
pub mod db;
pub mod logging;
pub mod scoring;
pub mod similarity;

pub const TARGET_ORACLE: &str = "similarity_request";
pub const TARGET_DB: &str = "db_query";
pub const TARGET_CLUSTERING: &str = "clustering";
