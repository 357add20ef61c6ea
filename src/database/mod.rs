pub mod database_access;
pub mod entities;
pub mod high_scores_db;
