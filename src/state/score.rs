//! # Score record: the shared state rendered by every overlay.
//!
//! A [`ScoreState`] is a flat, ordered map of named text fields. Updates are
//! partial: [`ScoreState::merge`] overlays only the fields present in the
//! update, so operators can push `{"team1Score": "250/4"}` alone.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const TEAM1: &str = "team1";
pub const TEAM1_SCORE: &str = "team1Score";
pub const TEAM1_OVERS: &str = "team1Overs";
pub const TEAM1_COLOR: &str = "team1Color";
pub const TEAM2: &str = "team2";
pub const TEAM2_SCORE: &str = "team2Score";
pub const TEAM2_OVERS: &str = "team2Overs";
pub const TEAM2_COLOR: &str = "team2Color";
pub const STATUS: &str = "status";
pub const CURRENT_BATSMAN: &str = "currentBatsman";
pub const CURRENT_BOWLER: &str = "currentBowler";
pub const LAST_BALL: &str = "lastBall";
pub const CURRENT_RATE: &str = "currentRate";
pub const REQUIRED_RATE: &str = "requiredRate";
pub const VENUE: &str = "venue";
pub const MATCH_TYPE: &str = "matchType";
pub const LAST_UPDATED: &str = "lastUpdated";

/// Flat snapshot of the shared score record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreState(BTreeMap<String, String>);

impl ScoreState {
    /// An empty record (useful for partial updates).
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Returns the field or `fallback` when absent.
    pub fn get_or<'a>(&'a self, field: &str, fallback: &'a str) -> &'a str {
        self.get(field).unwrap_or(fallback)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field.into(), value.into());
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// Overlays every field of `update` onto `self`.
    pub fn merge(&mut self, update: &ScoreState) {
        for (k, v) in &update.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// One-line summary: `"India 245/4 (38.2) | Australia 198/7 (35.0) | India batting"`.
    pub fn score_line(&self) -> String {
        format!(
            "{} {} ({}) | {} {} ({}) | {}",
            self.get_or(TEAM1, ""),
            self.get_or(TEAM1_SCORE, ""),
            self.get_or(TEAM1_OVERS, ""),
            self.get_or(TEAM2, ""),
            self.get_or(TEAM2_SCORE, ""),
            self.get_or(TEAM2_OVERS, ""),
            self.get_or(STATUS, ""),
        )
    }
}

impl Default for ScoreState {
    /// Demo match used until an operator pushes real data.
    fn default() -> Self {
        [
            (TEAM1, "India"),
            (TEAM1_SCORE, "245/4"),
            (TEAM1_OVERS, "38.2"),
            (TEAM1_COLOR, "#FF6B35"),
            (TEAM2, "Australia"),
            (TEAM2_SCORE, "198/7"),
            (TEAM2_OVERS, "35.0"),
            (TEAM2_COLOR, "#FFD700"),
            (STATUS, "India batting"),
            (CURRENT_BATSMAN, "Virat Kohli"),
            (CURRENT_BOWLER, "Pat Cummins"),
            (LAST_BALL, "4 (boundary)"),
            (CURRENT_RATE, "6.42"),
            (REQUIRED_RATE, "8.15"),
            (VENUE, "Melbourne Cricket Ground"),
            (MATCH_TYPE, "ODI World Cup"),
        ]
        .into_iter()
        .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ScoreState {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overlays_only_present_fields() {
        let mut state = ScoreState::default();
        let update = ScoreState::empty().with(TEAM1_SCORE, "250/4");
        state.merge(&update);

        assert_eq!(state.get(TEAM1_SCORE), Some("250/4"));
        assert_eq!(state.get(TEAM2_SCORE), Some("198/7"));
    }

    #[test]
    fn score_line_matches_display_format() {
        assert_eq!(
            ScoreState::default().score_line(),
            "India 245/4 (38.2) | Australia 198/7 (35.0) | India batting"
        );
    }

    #[test]
    fn serializes_as_flat_object() {
        let state = ScoreState::empty().with(STATUS, "rain delay");
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"status":"rain delay"}"#);

        let back: ScoreState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
