mod submission;

use chrono::{DateTime, Utc};
use sea_orm::DbErr;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;

use crate::config::LeaderboardConfig;
use crate::database::high_scores_db::{HighScoreModel, ScoreStore};

pub use submission::{InvalidInput, ScoreSubmission, SubmissionError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreEntry {
    pub id: i64,
    pub initials: String,
    pub score: i64,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl From<HighScoreModel> for ScoreEntry {
    fn from(model: HighScoreModel) -> Self {
        Self {
            id: model.id,
            initials: model.initials,
            score: model.score,
            created_at: model.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    /// The stored entry when the score made the board.
    pub admitted: Option<ScoreEntry>,
    pub leaderboard: Vec<ScoreEntry>,
}

/// Top-N view over the score store.
///
/// Submissions are serialized through `write_lock`, so the read-decide-insert sequence of one
/// submission never interleaves with another. Plain reads skip the lock.
#[derive(Debug)]
pub struct Leaderboard {
    store: ScoreStore,
    rules: LeaderboardConfig,
    write_lock: Mutex<()>,
}

impl Leaderboard {
    pub fn new(store: ScoreStore, rules: LeaderboardConfig) -> Self {
        Self {
            store,
            rules,
            write_lock: Mutex::new(()),
        }
    }

    pub fn size(&self) -> usize {
        self.rules.size
    }

    pub async fn top(&self) -> Result<Vec<ScoreEntry>, DbErr> {
        let rows = self.store.top_n(self.rules.size).await?;
        Ok(rows.into_iter().map(ScoreEntry::from).collect())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn submit(
        &self,
        submission: &ScoreSubmission,
    ) -> Result<SubmissionResult, SubmissionError> {
        let candidate = submission::validate(submission, &self.rules)?;

        let _guard = self.write_lock.lock().await;

        let current = self.top().await?;
        let current_scores: Vec<i64> = current.iter().map(|e| e.score).collect();
        if !submission::qualifies(&current_scores, candidate.score, self.rules.size) {
            info!(
                initials = %candidate.initials,
                score = candidate.score,
                lowest = ?current_scores.last(),
                "Score did not make the leaderboard"
            );
            return Ok(SubmissionResult {
                admitted: None,
                leaderboard: current,
            });
        }

        let entry = ScoreEntry::from(
            self.store
                .insert(&candidate.initials, candidate.score)
                .await?,
        );
        info!(
            id = entry.id,
            initials = %entry.initials,
            score = entry.score,
            "Score admitted to the leaderboard"
        );

        let leaderboard = self.top().await?;
        Ok(SubmissionResult {
            admitted: Some(entry),
            leaderboard,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;
    use crate::database::database_access::testing::temp_database;

    async fn leaderboard(rules: LeaderboardConfig) -> (TempDir, ScoreStore, Leaderboard) {
        let (dir, db) = temp_database().await;
        let store = ScoreStore::new(db);
        let board = Leaderboard::new(store.clone(), rules);
        (dir, store, board)
    }

    fn submission(initials: &str, score: i64) -> ScoreSubmission {
        ScoreSubmission {
            initials: Some(initials.to_string()),
            score: Some(score),
        }
    }

    async fn fill_tens(store: &ScoreStore) {
        for n in 1..=10 {
            store.insert("TEN", n * 10).await.unwrap();
        }
    }

    fn scores(entries: &[ScoreEntry]) -> Vec<i64> {
        entries.iter().map(|e| e.score).collect()
    }

    #[tokio::test]
    async fn first_submission_on_empty_board() {
        let (_dir, store, board) = leaderboard(Default::default()).await;

        let result = board.submit(&submission("AAA", 100)).await.unwrap();

        assert_eq!(result.leaderboard.len(), 1);
        assert_eq!(result.leaderboard[0].initials, "AAA");
        assert_eq!(result.leaderboard[0].score, 100);
        assert_eq!(result.admitted.map(|e| e.id), Some(result.leaderboard[0].id));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn any_score_is_admitted_while_board_has_room() {
        let (_dir, store, board) = leaderboard(Default::default()).await;

        for (i, score) in [5, 1, 3, -2].into_iter().enumerate() {
            let result = board.submit(&submission("LOW", score)).await.unwrap();
            assert!(result.admitted.is_some());
            assert_eq!(store.count().await.unwrap(), i as u64 + 1);
        }
    }

    #[tokio::test]
    async fn score_below_last_place_is_rejected_without_insert() {
        let (_dir, store, board) = leaderboard(Default::default()).await;
        fill_tens(&store).await;
        let before = board.top().await.unwrap();

        let result = board.submit(&submission("BAD", 5)).await.unwrap();

        assert!(result.admitted.is_none());
        assert_eq!(result.leaderboard, before);
        assert_eq!(store.count().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn tie_with_last_place_is_rejected() {
        let (_dir, store, board) = leaderboard(Default::default()).await;
        fill_tens(&store).await;

        let result = board.submit(&submission("TIE", 10)).await.unwrap();

        assert!(result.admitted.is_none());
        assert_eq!(store.count().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn score_above_last_place_pushes_it_off() {
        let (_dir, store, board) = leaderboard(Default::default()).await;
        fill_tens(&store).await;

        let result = board.submit(&submission("NEW", 15)).await.unwrap();

        assert_eq!(
            scores(&result.leaderboard),
            [100, 90, 80, 70, 60, 50, 40, 30, 20, 15]
        );
        assert_eq!(result.leaderboard[9].initials, "NEW");
        assert_eq!(store.count().await.unwrap(), 11);
    }

    #[tokio::test]
    async fn validation_failure_inserts_nothing() {
        let (_dir, store, board) = leaderboard(Default::default()).await;

        let missing_score = ScoreSubmission {
            initials: Some("AAA".into()),
            score: None,
        };
        let err = board.submit(&missing_score).await.unwrap_err();
        assert!(matches!(
            err,
            SubmissionError::InvalidInput(InvalidInput::MissingScore)
        ));

        let err = board.submit(&submission("", 50)).await.unwrap_err();
        assert!(matches!(
            err,
            SubmissionError::InvalidInput(InvalidInput::MissingInitials)
        ));

        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn legacy_mode_rejects_zero_score() {
        let rules = LeaderboardConfig {
            reject_zero_score: true,
            ..Default::default()
        };
        let (_dir, store, board) = leaderboard(rules).await;

        let err = board.submit(&submission("ZER", 0)).await.unwrap_err();
        assert!(matches!(
            err,
            SubmissionError::InvalidInput(InvalidInput::MissingScore)
        ));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn zero_score_is_stored_by_default() {
        let (_dir, store, board) = leaderboard(Default::default()).await;

        let result = board.submit(&submission("ZER", 0)).await.unwrap();

        assert_eq!(scores(&result.leaderboard), [0]);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn board_size_follows_config() {
        let rules = LeaderboardConfig {
            size: 3,
            ..Default::default()
        };
        let (_dir, store, board) = leaderboard(rules).await;
        for score in [40, 30, 20, 10] {
            store.insert("CFG", score).await.unwrap();
        }

        assert_eq!(scores(&board.top().await.unwrap()), [40, 30, 20]);

        let rejected = board.submit(&submission("CFG", 20)).await.unwrap();
        assert!(rejected.admitted.is_none());

        let admitted = board.submit(&submission("CFG", 25)).await.unwrap();
        assert_eq!(scores(&admitted.leaderboard), [40, 30, 25]);
    }

    #[tokio::test]
    async fn responses_stay_bounded_and_sorted() {
        let (_dir, _store, board) = leaderboard(Default::default()).await;

        for score in [7, 300, 12, 12, 999, 1, 56, 56, 43, 88, 2, 500, 64] {
            let result = board.submit(&submission("PRP", score)).await.unwrap();
            let got = scores(&result.leaderboard);
            assert!(got.len() <= 10);
            assert!(got.windows(2).all(|w| w[0] >= w[1]), "unsorted: {got:?}");
        }
    }

    #[tokio::test]
    async fn reads_are_idempotent() {
        let (_dir, store, board) = leaderboard(Default::default()).await;
        fill_tens(&store).await;

        let first = board.top().await.unwrap();
        let second = board.top().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submissions_are_serialized() {
        let (_dir, store, board) = leaderboard(Default::default()).await;
        fill_tens(&store).await;
        let board = Arc::new(board);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let board = Arc::clone(&board);
                tokio::spawn(async move { board.submit(&submission("RAC", 11 + i)).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Each admitted score becomes the new last place, so a later admission has to beat
        // every earlier one. Two decisions made against the same stale board would break this.
        let mut racers: Vec<HighScoreModel> = store
            .top_n(100)
            .await
            .unwrap()
            .into_iter()
            .filter(|m| m.initials == "RAC")
            .collect();
        racers.sort_by_key(|m| m.id);
        assert!(!racers.is_empty());
        assert!(racers.windows(2).all(|w| w[0].score < w[1].score));

        let final_scores = scores(&board.top().await.unwrap());
        assert_eq!(final_scores.len(), 10);
        assert_eq!(store.count().await.unwrap(), 10 + racers.len() as u64);
    }
}
