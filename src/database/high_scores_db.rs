use chrono::Utc;
use sea_orm::*;
use tracing::debug;

use crate::database::entities::{high_score, HighScore};

pub use high_score::Model as HighScoreModel;

/// Append-only score table. The top-N bound is applied when reading, never by deleting rows.
#[derive(Debug, Clone)]
pub struct ScoreStore {
    db: DatabaseConnection,
}

impl ScoreStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn insert(&self, initials: &str, score: i64) -> Result<HighScoreModel, DbErr> {
        let new_score = high_score::ActiveModel {
            id: NotSet,
            initials: Set(initials.to_string()),
            score: Set(score),
            timestamp: Set(Utc::now()),
        };

        let model = new_score.insert(&self.db).await?;
        debug!(id = model.id, initials = %model.initials, score = model.score, "Inserted high score");
        Ok(model)
    }

    /// Highest scores first; equal scores keep insertion order.
    pub async fn top_n(&self, n: usize) -> Result<Vec<HighScoreModel>, DbErr> {
        HighScore::find()
            .order_by_desc(high_score::Column::Score)
            .order_by_asc(high_score::Column::Id)
            .limit(n as u64)
            .all(&self.db)
            .await
    }

    pub async fn count(&self) -> Result<u64, DbErr> {
        HighScore::find().count(&self.db).await
    }
}
