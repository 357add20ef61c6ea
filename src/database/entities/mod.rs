pub mod high_score;

pub use high_score::Entity as HighScore;
