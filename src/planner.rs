//! Daily plan generation.
//!
//! Selection is a pure function of (date, cycle): each slot hashes its own key
//! (`<date>-<SLOT>[-<cycle>]`) and reduces it modulo the slot's pool size. The
//! streak never influences the plan; bonuses apply only when XP is awarded.

use chrono::{NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::config::GameConfig;
use crate::domain::{DailyPlan, DailyTask, LearnerId, PlanId, TaskStatus, TaskTemplate, TaskType};
use crate::error::EngineResult;
use crate::store::Tables;
use crate::util::slot_index;

/// Pick the day's templates, in slot order: knowledge, primary drill,
/// secondary drill, two interviews, then an optional interview top-up.
/// Empty pools contribute nothing.
pub fn select_templates<'a>(
  catalog: &'a Catalog,
  date: NaiveDate,
  cycle_code: u32,
  cfg: &GameConfig,
) -> Vec<&'a TaskTemplate> {
  let mut picked: Vec<&TaskTemplate> = Vec::new();

  let knowledge = catalog.pool(TaskType::Knowledge, Some(cycle_code));
  if !knowledge.is_empty() {
    picked.push(knowledge[slot_index(&format!("{}-KNOWLEDGE-{}", date, cycle_code), knowledge.len())]);
  }

  for (task_type, slot) in [(TaskType::DrillPrimary, "DRILL_PRIMARY"), (TaskType::DrillSecondary, "DRILL_SECONDARY")] {
    let pool = catalog.pool(task_type, None);
    if !pool.is_empty() {
      picked.push(pool[slot_index(&format!("{}-{}", date, slot), pool.len())]);
    }
  }

  let interviews = catalog.pool(TaskType::Interview, Some(cycle_code));
  if !interviews.is_empty() {
    let n = interviews.len();
    let first = slot_index(&format!("{}-INTERVIEW-1-{}", date, cycle_code), n);
    let mut second = slot_index(&format!("{}-INTERVIEW-2-{}", date, cycle_code), n);
    if second == first && n > 1 {
      second = (second + 1) % n;
    }
    picked.push(interviews[first]);
    if second != first {
      picked.push(interviews[second]);
    }

    // Best-effort top-up toward the default target.
    if base_xp(&picked) < cfg.default_target_xp {
      if let Some(extra) = interviews.iter().find(|t| !picked.iter().any(|p| p.id == t.id)) {
        picked.push(*extra);
      }
    }
  }

  picked
}

pub fn base_xp(templates: &[&TaskTemplate]) -> u32 {
  templates.iter().map(|t| t.xp).sum()
}

/// Fixed at creation; never includes a streak bonus.
pub fn target_xp(templates: &[&TaskTemplate], cfg: &GameConfig) -> u32 {
  base_xp(templates).max(cfg.default_target_xp)
}

/// Return the plan for `date`, building it when absent. With `force`, an
/// existing plan and everything hanging off it is discarded first.
pub fn generate_plan(
  tables: &mut Tables,
  catalog: &Catalog,
  cfg: &GameConfig,
  learner: LearnerId,
  date: NaiveDate,
  cycle_code: u32,
  force: bool,
) -> EngineResult<PlanId> {
  if let Some(existing) = tables.plan_for_date(learner, date).map(|p| p.id) {
    if !force {
      debug!(target: "plan", %learner, %date, plan_id = %existing, "Plan already exists");
      return Ok(existing);
    }
    tables.remove_plan(existing);
    info!(target: "plan", %learner, %date, plan_id = %existing, "Existing plan discarded (forced)");
  }

  let selected = select_templates(catalog, date, cycle_code, cfg);
  let plan_id = Uuid::new_v4();
  let tasks: Vec<DailyTask> = selected
    .iter()
    .map(|t| DailyTask {
      id: Uuid::new_v4(),
      plan_id,
      learner,
      template_id: t.id.clone(),
      task_type: t.task_type,
      title: t.title.clone(),
      prompt: t.prompt.clone(),
      xp: t.xp,
      status: TaskStatus::Todo,
      completed_at: None,
    })
    .collect();

  let plan = DailyPlan {
    id: plan_id,
    learner,
    date,
    cycle_code,
    target_xp: target_xp(&selected, cfg),
    completed_xp: 0,
    is_completed: false,
    task_ids: tasks.iter().map(|t| t.id).collect(),
    created_at: Utc::now(),
  };
  info!(
    target: "plan",
    %learner, %date, cycle_code, %plan_id, tasks = tasks.len(), target_xp = plan.target_xp,
    "Plan generated"
  );
  tables.insert_plan(plan, tasks)?;
  Ok(plan_id)
}
