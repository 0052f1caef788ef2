//! Sparring: single questions answered by the learner and graded by an external
//! evaluator. The core only picks questions, records attempts and keeps the
//! point tally; grading arrives here already normalised.

use chrono::{NaiveDate, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::config::SparringRules;
use crate::domain::{Evaluation, LearnerId, SparringAttempt, SparringProgress, SparringQuestion};
use crate::error::{EngineError, EngineResult};
use crate::store::Tables;

const CORE_CATEGORY: &str = "Core";

pub fn unlocked_rank_index(total_points: u64, rules: &SparringRules) -> u32 {
  let step = rules.points_per_rank.max(1);
  let earned = 1 + total_points / step;
  earned.min(rules.max_rank_index as u64) as u32
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SparringProgressView {
  pub total_points: u64,
  pub mark_points: u64,
  pub unlocked_rank_index: u32,
  pub last_question_id: Option<u32>,
}

pub fn progress_view(progress: Option<&SparringProgress>, rules: &SparringRules) -> SparringProgressView {
  let p = progress.cloned().unwrap_or_default();
  SparringProgressView {
    total_points: p.total_points,
    mark_points: p.mark_points,
    unlocked_rank_index: unlocked_rank_index(p.total_points, rules),
    last_question_id: p.last_question_id,
  }
}

/// Narrowest non-empty pool, each tier skipping the last served question:
/// rank+cycle, cycle, core category, anything, then the whole bank.
pub fn candidate_pool<'a>(
  bank: &'a [SparringQuestion],
  rank_index: u32,
  cycle_code: u32,
  last: Option<u32>,
) -> Vec<&'a SparringQuestion> {
  let fresh = |q: &&SparringQuestion| Some(q.id) != last;
  let tiers: [&dyn Fn(&SparringQuestion) -> bool; 4] = [
    &|q: &SparringQuestion| q.min_rank_index <= rank_index && q.cycle_code == cycle_code,
    &|q: &SparringQuestion| q.cycle_code == cycle_code,
    &|q: &SparringQuestion| q.category == CORE_CATEGORY,
    &|_: &SparringQuestion| true,
  ];
  for tier in tiers {
    let pool: Vec<_> = bank.iter().filter(fresh).filter(|q| tier(*q)).collect();
    if !pool.is_empty() {
      return pool;
    }
  }
  bank.iter().collect()
}

pub fn next_question<R: Rng>(
  tables: &mut Tables,
  catalog: &Catalog,
  rules: &SparringRules,
  learner: LearnerId,
  rank_index: u32,
  cycle_code: u32,
  rng: &mut R,
) -> EngineResult<SparringQuestion> {
  let progress = tables.sparring_mut(learner);
  let unlocked = unlocked_rank_index(progress.total_points, rules);
  if rank_index > unlocked {
    return Err(EngineError::RankLocked { requested: rank_index, unlocked });
  }
  let pool = candidate_pool(catalog.sparring_questions(), rank_index, cycle_code, progress.last_question_id);
  let chosen = pool
    .choose(rng)
    .map(|q| (*q).clone())
    .ok_or_else(|| EngineError::not_found("sparring question", format!("cycle {}", cycle_code)))?;
  progress.last_question_id = Some(chosen.id);
  debug!(target: "sparring", %learner, rank_index, cycle_code, question_id = chosen.id, pool = pool.len(), "Question served");
  Ok(chosen)
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptInput {
  pub date: NaiveDate,
  pub rank_index: u32,
  pub question: String,
  pub user_answer: String,
  pub evaluation: Evaluation,
  #[serde(default)]
  pub points_awarded: u32,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptOutcome {
  pub attempt_id: Uuid,
  pub passed: bool,
  pub points_applied: u32,
  pub progress: SparringProgressView,
}

/// Check the evaluator's score and apply the pass rule, ignoring whatever
/// `passed` flag came with it.
pub fn normalize_evaluation(mut evaluation: Evaluation, rules: &SparringRules) -> EngineResult<Evaluation> {
  if !evaluation.score.is_finite() || !(0.0..=10.0).contains(&evaluation.score) {
    return Err(EngineError::BadRequest(format!("score {} outside 0-10", evaluation.score)));
  }
  evaluation.passed = evaluation.score >= rules.pass_score;
  Ok(evaluation)
}

pub fn record_attempt(
  tables: &mut Tables,
  rules: &SparringRules,
  learner: LearnerId,
  input: AttemptInput,
) -> EngineResult<AttemptOutcome> {
  let chars = input.user_answer.chars().count();
  if chars < rules.min_answer_chars {
    return Err(EngineError::ValidationFailed(format!(
      "Answer too short (at least {} characters, currently {})",
      rules.min_answer_chars, chars
    )));
  }
  let evaluation = normalize_evaluation(input.evaluation, rules)?;
  let passed = evaluation.passed;
  let points_applied = if passed { input.points_awarded } else { 0 };

  let attempt = SparringAttempt {
    id: Uuid::new_v4(),
    learner,
    date: input.date,
    rank_index: input.rank_index,
    question: input.question,
    user_answer: input.user_answer,
    evaluation,
    passed,
    points_awarded: points_applied,
    created_at: Utc::now(),
  };
  let attempt_id = attempt.id;
  tables.sparring_attempts.push(attempt);

  let progress = tables.sparring_mut(learner);
  if points_applied > 0 {
    progress.total_points += points_applied as u64;
    progress.mark_points += points_applied as u64;
  }
  let view = progress_view(Some(&*progress), rules);
  info!(target: "sparring", %learner, %attempt_id, passed, points_applied, total_points = view.total_points, "Attempt recorded");
  Ok(AttemptOutcome { attempt_id, passed, points_applied, progress: view })
}
