//! Cycle gate: completion thresholds that unlock the next curriculum cycle.

use serde::Serialize;
use tracing::info;

use crate::catalog::Catalog;
use crate::config::GameConfig;
use crate::domain::{CurriculumCycle, LearnerId, TaskStatus, TaskType};
use crate::error::{EngineError, EngineResult};
use crate::store::Tables;

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GateReport {
  pub cycle_code: u32,
  pub can_advance: bool,
  pub reasons: Vec<String>,
  pub completed_plans: usize,
  pub completed_interviews: usize,
}

/// Count completed plans and DONE interview tasks in `cycle_code` against the
/// configured minimums. Each shortfall contributes one reason.
pub fn evaluate(counts: (usize, usize), cycle_code: u32, cfg: &GameConfig) -> GateReport {
  let (completed_plans, completed_interviews) = counts;
  let req = &cfg.cycle_advancement;
  let mut reasons = Vec::new();
  if completed_plans < req.min_daily_plans {
    reasons.push(format!(
      "Need {} completed daily plans (have {})",
      req.min_daily_plans, completed_plans
    ));
  }
  if completed_interviews < req.min_interviews {
    reasons.push(format!(
      "Need {} completed interview tasks (have {})",
      req.min_interviews, completed_interviews
    ));
  }
  GateReport {
    cycle_code,
    can_advance: reasons.is_empty(),
    reasons,
    completed_plans,
    completed_interviews,
  }
}

fn counts(tables: &Tables, learner: LearnerId, cycle_code: u32) -> (usize, usize) {
  let plans = tables
    .plans_of(learner)
    .filter(|p| p.cycle_code == cycle_code && p.is_completed)
    .count();
  let interviews = tables
    .plans_of(learner)
    .filter(|p| p.cycle_code == cycle_code)
    .flat_map(|p| tables.tasks_of(p))
    .filter(|t| t.task_type == TaskType::Interview && t.status == TaskStatus::Done)
    .count();
  (plans, interviews)
}

pub fn can_advance(tables: &Tables, cfg: &GameConfig, learner: LearnerId, cycle_code: u32) -> GateReport {
  evaluate(counts(tables, learner, cycle_code), cycle_code, cfg)
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceOutcome {
  pub previous_cycle_code: u32,
  pub new_cycle_code: u32,
}

/// Re-run the gate and move the learner to the next cycle. XP, rank and
/// streak are untouched.
pub fn advance_cycle(
  tables: &mut Tables,
  catalog: &Catalog,
  cfg: &GameConfig,
  learner: LearnerId,
) -> EngineResult<AdvanceOutcome> {
  let current = tables.progress_mut(learner, catalog.first_cycle_code()).current_cycle_code;
  let report = can_advance(tables, cfg, learner, current);
  if !report.can_advance {
    return Err(EngineError::GateNotSatisfied(report.reasons));
  }
  let next = current + 1;
  if next > catalog.max_cycle_code() {
    return Err(EngineError::FinalCycle(current));
  }
  tables.progress_mut(learner, catalog.first_cycle_code()).current_cycle_code = next;
  let title = catalog.cycle(next).map(|c| c.title.as_str()).unwrap_or_default();
  info!(target: "gate", %learner, from = current, to = next, %title, "Cycle advanced");
  Ok(AdvanceOutcome { previous_cycle_code: current, new_cycle_code: next })
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
  Done,
  Current,
  Locked,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleView {
  #[serde(flatten)]
  pub cycle: CurriculumCycle,
  pub status: CycleStatus,
  /// Present only for the current cycle.
  pub gate: Option<GateReport>,
}

pub fn list_cycles(tables: &Tables, catalog: &Catalog, cfg: &GameConfig, learner: LearnerId) -> Vec<CycleView> {
  let current = tables
    .progress(learner)
    .map(|p| p.current_cycle_code)
    .unwrap_or_else(|| catalog.first_cycle_code());
  catalog
    .cycles()
    .iter()
    .map(|cycle| {
      let status = match cycle.code.cmp(&current) {
        std::cmp::Ordering::Less => CycleStatus::Done,
        std::cmp::Ordering::Equal => CycleStatus::Current,
        std::cmp::Ordering::Greater => CycleStatus::Locked,
      };
      let gate = (status == CycleStatus::Current).then(|| can_advance(tables, cfg, learner, current));
      CycleView { cycle: cycle.clone(), status, gate }
    })
    .collect()
}
