use sea_orm::DbErr;
use serde::Deserialize;

use crate::config::LeaderboardConfig;

/// Raw submission body. Both fields are optional so a missing field is a validation error
/// rather than a deserialization error.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ScoreSubmission {
    pub initials: Option<String>,
    pub score: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub initials: String,
    pub score: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidInput {
    #[error("initials are missing")]
    MissingInitials,
    #[error("initials are longer than {max} characters")]
    InitialsTooLong { max: usize },
    #[error("score is missing")]
    MissingScore,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInput),
    #[error("leaderboard storage failed: {0}")]
    Storage(#[from] DbErr),
}

pub(crate) fn validate(
    submission: &ScoreSubmission,
    rules: &LeaderboardConfig,
) -> Result<Candidate, InvalidInput> {
    let initials = match submission.initials.as_deref() {
        Some(initials) if !initials.is_empty() => initials,
        _ => return Err(InvalidInput::MissingInitials),
    };
    if initials.chars().count() > rules.max_initials_len {
        return Err(InvalidInput::InitialsTooLong {
            max: rules.max_initials_len,
        });
    }

    let score = match submission.score {
        Some(0) if rules.reject_zero_score => return Err(InvalidInput::MissingScore),
        Some(score) => score,
        None => return Err(InvalidInput::MissingScore),
    };

    Ok(Candidate {
        initials: initials.to_string(),
        score,
    })
}

/// Admission rule: room left on the board, or strictly better than the current last place.
/// `current` must be the board in descending score order.
pub(crate) fn qualifies(current: &[i64], score: i64, capacity: usize) -> bool {
    if current.len() < capacity {
        return true;
    }
    current.last().is_some_and(|&lowest| score > lowest)
}
