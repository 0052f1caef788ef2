//! Mock-interview round log.

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::config::GameConfig;
use crate::domain::{LearnerId, MockMode, MockRound};
use crate::error::{EngineError, EngineResult};
use crate::store::Tables;

pub const RECENT_ROUNDS: usize = 20;

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockRoundInput {
  /// Defaults to the configured mock timer length.
  #[serde(default)]
  pub duration_min: Option<u32>,
  pub mode: MockMode,
  pub score: f32,
  #[serde(default)]
  pub notes: Option<String>,
}

pub fn record(
  tables: &mut Tables,
  cfg: &GameConfig,
  learner: LearnerId,
  today: NaiveDate,
  input: MockRoundInput,
) -> EngineResult<MockRound> {
  if !input.score.is_finite() || !(0.0..=10.0).contains(&input.score) {
    return Err(EngineError::BadRequest(format!("score {} outside 0-10", input.score)));
  }
  let duration_min = input.duration_min.unwrap_or(cfg.mock_timer_minutes);
  if duration_min == 0 {
    return Err(EngineError::BadRequest("duration must be at least one minute".into()));
  }
  let round = MockRound {
    id: Uuid::new_v4(),
    learner,
    date: today,
    duration_min,
    mode: input.mode,
    score: input.score,
    notes: input.notes.filter(|n| !n.trim().is_empty()),
    created_at: Utc::now(),
  };
  tables.mock_rounds.push(round.clone());
  info!(target: "kata_backend", %learner, round_id = %round.id, score = round.score, "Mock round recorded");
  Ok(round)
}

/// The learner's most recent rounds, newest first.
pub fn recent(tables: &Tables, learner: LearnerId) -> Vec<MockRound> {
  tables
    .mock_rounds
    .iter()
    .rev()
    .filter(|r| r.learner == learner)
    .take(RECENT_ROUNDS)
    .cloned()
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn input(score: f32) -> MockRoundInput {
    MockRoundInput { duration_min: None, mode: MockMode::Timed, score, notes: Some("  ".into()) }
  }

  #[test]
  fn rounds_are_validated_and_listed_newest_first() {
    let mut t = Tables::default();
    let cfg = GameConfig::default();
    let today: NaiveDate = "2024-04-01".parse().unwrap();
    assert!(record(&mut t, &cfg, 1, today, input(10.5)).is_err());
    for i in 0..25 {
      record(&mut t, &cfg, 1, today, input(i as f32 / 5.0)).unwrap();
    }
    record(&mut t, &cfg, 2, today, input(1.0)).unwrap();

    let rounds = recent(&t, 1);
    assert_eq!(rounds.len(), RECENT_ROUNDS);
    assert_eq!(rounds[0].score, 24.0 / 5.0);
    assert!(rounds.iter().all(|r| r.learner == 1 && r.notes.is_none() && r.duration_min == 20));
  }
}
