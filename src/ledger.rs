//! Progression ledger: rank, streak bonus and XP awards, plus the one stateful
//! operation that books a finished task against the learner's totals.
//!
//! Bonuses are computed in basis points so awards are exact integer math:
//! `award = floor(base * (10_000 + bonus_bp) / 10_000)`.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::config::GameConfig;
use crate::domain::{LearnerId, TaskId, TaskStatus, XpLogEntry};
use crate::error::{EngineError, EngineResult};
use crate::store::Tables;
use crate::util::days_between;

/// Index into `cfg.ranks`, clamped to the last rank.
pub fn rank_index(total_xp: u64, cfg: &GameConfig) -> usize {
  let step = cfg.rank_xp_step.max(1);
  let raw = (total_xp / step) as usize;
  raw.min(cfg.ranks.len().saturating_sub(1))
}

pub fn rank_from_xp(total_xp: u64, cfg: &GameConfig) -> &str {
  cfg.ranks.get(rank_index(total_xp, cfg)).map(String::as_str).unwrap_or("")
}

/// The rank after the current one, or `None` at the final rank.
pub fn next_rank(total_xp: u64, cfg: &GameConfig) -> Option<&str> {
  cfg.ranks.get(rank_index(total_xp, cfg) + 1).map(String::as_str)
}

/// XP still needed to reach the next rank boundary. Zero or negative means
/// there is no next rank.
pub fn xp_for_next_rank(total_xp: u64, cfg: &GameConfig) -> i64 {
  let boundary = (rank_index(total_xp, cfg) as u64 + 1) * cfg.rank_xp_step;
  boundary as i64 - total_xp as i64
}

/// Bonus in basis points: one increment per three streak days, capped.
pub fn streak_bonus_bp(streak: u32, cfg: &GameConfig) -> u64 {
  ((streak / 3) as u64 * cfg.bonus_step_bp()).min(cfg.max_bonus_bp())
}

/// Bonus as a fraction (0.05 = 5%).
pub fn streak_bonus(streak: u32, cfg: &GameConfig) -> f64 {
  streak_bonus_bp(streak, cfg) as f64 / 10_000.0
}

/// Saturates at `u32::MAX`.
pub fn award_xp(base_xp: u32, streak: u32, cfg: &GameConfig) -> u32 {
  let bp = 10_000 + streak_bonus_bp(streak, cfg);
  u32::try_from(base_xp as u64 * bp / 10_000).unwrap_or(u32::MAX)
}

/// Streak after a plan completes on `today`. Day differences are on calendar
/// dates only.
pub fn next_streak(streak: u32, last_completed: Option<NaiveDate>, today: NaiveDate) -> u32 {
  match last_completed {
    None => 1,
    Some(last) => match days_between(last, today) {
      0 => streak,
      1 => streak + 1,
      _ => 1,
    },
  }
}

/// Outcome of booking one finished task.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
  pub awarded_xp: u32,
  pub base_xp: u32,
  pub bonus: u32,
  pub new_total_xp: u64,
  pub new_rank: String,
  pub new_streak: u32,
  /// True only on the call that completed the plan.
  pub day_complete: bool,
  pub plan_completed_xp: u32,
  pub plan_target_xp: u32,
}

/// Mark the task DONE and book its XP: log entry, progress totals, plan
/// running total and (when the plan just completed) the streak. Must run
/// inside a store transaction.
pub fn complete_task(
  tables: &mut Tables,
  cfg: &GameConfig,
  learner: LearnerId,
  task_id: TaskId,
  first_cycle_code: u32,
  today: NaiveDate,
) -> EngineResult<Completion> {
  let task = tables.task_mut(learner, task_id)?;
  if task.status == TaskStatus::Done {
    return Err(EngineError::AlreadyCompleted(format!("task {} is already done", task_id)));
  }
  task.status = TaskStatus::Done;
  task.completed_at = Some(Utc::now());
  let base_xp = task.xp;
  let plan_id = task.plan_id;
  let title = task.title.clone();

  let streak = tables.progress_mut(learner, first_cycle_code).streak;
  let awarded = award_xp(base_xp, streak, cfg);

  tables.xp_log.push(XpLogEntry {
    id: Uuid::new_v4(),
    learner,
    date: today,
    amount: awarded,
    reason: format!("Completed: {}", title),
    task_id,
    created_at: Utc::now(),
  });

  let plan = tables.plan_mut(plan_id)?;
  plan.completed_xp = plan.completed_xp.saturating_add(awarded);
  let became_complete = !plan.is_completed && plan.completed_xp >= plan.target_xp;
  if became_complete {
    plan.is_completed = true;
  }
  let (plan_completed_xp, plan_target_xp) = (plan.completed_xp, plan.target_xp);

  let progress = tables.progress_mut(learner, first_cycle_code);
  progress.total_xp = progress.total_xp.saturating_add(awarded as u64);
  if became_complete {
    progress.streak = next_streak(progress.streak, progress.last_completed_date, today);
    progress.last_completed_date = Some(today);
  }

  let completion = Completion {
    awarded_xp: awarded,
    base_xp,
    bonus: awarded.saturating_sub(base_xp),
    new_total_xp: progress.total_xp,
    new_rank: rank_from_xp(progress.total_xp, cfg).to_string(),
    new_streak: progress.streak,
    day_complete: became_complete,
    plan_completed_xp,
    plan_target_xp,
  };
  info!(
    target: "ledger",
    %learner, %task_id, base_xp, awarded_xp = awarded, total_xp = completion.new_total_xp,
    rank = %completion.new_rank, streak = completion.new_streak, day_complete = became_complete,
    "XP awarded"
  );
  Ok(completion)
}
