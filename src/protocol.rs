//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::domain::{DailyPlan, DailyTask, Progress, TaskId};
use crate::ledger::{next_rank, rank_from_xp, rank_index, streak_bonus, xp_for_next_rank};
use crate::steps::Answer;
use crate::store::Tables;

/// A plan with its tasks in plan order.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanView {
    #[serde(flatten)]
    pub plan: DailyPlan,
    pub tasks: Vec<DailyTask>,
    /// `completedXp` as a percentage of `targetXp`, capped at 100.
    pub progress_pct: u32,
}

/// Convert a stored plan (internal) to the public view.
pub fn to_plan_view(tables: &Tables, plan: &DailyPlan) -> PlanView {
    let tasks = tables.tasks_of(plan).into_iter().cloned().collect();
    let pct = if plan.target_xp == 0 {
        100
    } else {
        (plan.completed_xp as u64 * 100 / plan.target_xp as u64).min(100) as u32
    };
    PlanView { plan: plan.clone(), tasks, progress_pct: pct }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
    pub total_xp: u64,
    pub rank: String,
    pub rank_index: usize,
    pub next_rank: Option<String>,
    /// Absent at the final rank.
    pub xp_for_next_rank: Option<u64>,
    pub current_cycle_code: u32,
    pub streak: u32,
    pub streak_bonus: f64,
    pub last_completed_date: Option<NaiveDate>,
}

/// Rank fields are derived from `total_xp` here, never read from storage.
pub fn to_progress_view(progress: &Progress, cfg: &GameConfig) -> ProgressView {
    let next = next_rank(progress.total_xp, cfg).map(str::to_string);
    let remaining = xp_for_next_rank(progress.total_xp, cfg);
    ProgressView {
        total_xp: progress.total_xp,
        rank: rank_from_xp(progress.total_xp, cfg).to_string(),
        rank_index: rank_index(progress.total_xp, cfg),
        xp_for_next_rank: if next.is_some() && remaining > 0 { Some(remaining as u64) } else { None },
        next_rank: next,
        current_cycle_code: progress.current_cycle_code,
        streak: progress.streak,
        streak_bonus: streak_bonus(progress.streak, cfg),
        last_completed_date: progress.last_completed_date,
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Default, Deserialize)]
pub struct GenerateIn {
    #[serde(default)]
    pub force: bool,
    /// Defaults to today.
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TodayOut {
    pub plan: Option<PlanView>,
}

#[derive(Debug, Deserialize)]
pub struct StartSessionIn {
    #[serde(rename = "dailyTaskId")]
    pub daily_task_id: TaskId,
}

#[derive(Debug, Deserialize)]
pub struct AnswerIn {
    pub answer: Answer,
}

#[derive(Debug, Deserialize)]
pub struct SparringQuestionIn {
    #[serde(rename = "rankIndex")]
    pub rank_index: u32,
    #[serde(rename = "cycleCode")]
    pub cycle_code: u32,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
