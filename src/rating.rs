use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Learner's self-assessed recall quality for a single review.
///
/// Variants are declared in severity order, so `Again < Hard < Good < Easy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Again,
    Hard,
    Good,
    Easy,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Again => "again",
            Rating::Hard => "hard",
            Rating::Good => "good",
            Rating::Easy => "easy",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Rating::Again => "Again",
            Rating::Hard => "Hard",
            Rating::Good => "Good",
            Rating::Easy => "Easy",
        }
    }

    /// Keyboard digit bound to this rating (1-4).
    pub fn digit(&self) -> u8 {
        match self {
            Rating::Again => 1,
            Rating::Hard => 2,
            Rating::Good => 3,
            Rating::Easy => 4,
        }
    }

    /// Anything but `Again` keeps the streak alive.
    pub fn is_success(&self) -> bool {
        !matches!(self, Rating::Again)
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid rating '{token}': expected 1-4 or again/hard/good/easy")]
pub struct InvalidRatingError {
    pub token: String,
}

/// Maps a raw input token to a [`Rating`].
///
/// Accepts exactly the digits `1`..`4` and the labels `again`, `hard`,
/// `good`, `easy` in any letter case. Surrounding whitespace is not
/// stripped; callers reading lines should trim first.
pub fn parse_rating(token: &str) -> Result<Rating, InvalidRatingError> {
    let rating = match token {
        "1" => Some(Rating::Again),
        "2" => Some(Rating::Hard),
        "3" => Some(Rating::Good),
        "4" => Some(Rating::Easy),
        _ => Rating::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(token)),
    };

    rating.ok_or_else(|| InvalidRatingError {
        token: token.to_string(),
    })
}

impl FromStr for Rating {
    type Err = InvalidRatingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_rating(s)
    }
}
