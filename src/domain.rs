//! Domain models: curriculum catalog entries, daily plans and tasks, step sessions,
//! learner progress, and the practice logs (XP, sparring, mock rounds).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type LearnerId = u32;
pub type TemplateId = String;
pub type PlanId = Uuid;
pub type TaskId = Uuid;
pub type SessionId = Uuid;

/// The only learner the HTTP surface knows about until authentication exists.
pub const DEFAULT_LEARNER: LearnerId = 1;

/// A stage of the curriculum. Codes ascend and are unique.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurriculumCycle {
  pub code: u32,
  pub title: String,
  #[serde(default)]
  pub topics: Vec<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
  Knowledge,
  #[serde(alias = "DRILL_JS")]
  DrillPrimary,
  #[serde(alias = "DRILL_TS")]
  DrillSecondary,
  Interview,
}

impl TaskType {
  pub fn as_str(&self) -> &'static str {
    match self {
      TaskType::Knowledge => "KNOWLEDGE",
      TaskType::DrillPrimary => "DRILL_PRIMARY",
      TaskType::DrillSecondary => "DRILL_SECONDARY",
      TaskType::Interview => "INTERVIEW",
    }
  }
}

/// One unit of interaction inside a task. Each non-theory variant carries
/// exactly what its pass predicate needs (see `steps::validate_answer`).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
  Theory {
    title: String,
    #[serde(default)]
    content: String,
  },
  QuizSingle {
    title: String,
    question: String,
    options: Vec<String>,
    #[serde(rename = "correctAnswer", alias = "correct_answer")]
    correct_answer: usize,
  },
  TextAnswer {
    title: String,
    question: String,
    #[serde(default, rename = "minChars", alias = "min_chars")]
    min_chars: Option<usize>,
    #[serde(default)]
    keywords: Vec<String>,
  },
  CodeAnswer {
    title: String,
    prompt: String,
    #[serde(default, rename = "requiredTokens", alias = "required_tokens")]
    required_tokens: Vec<String>,
  },
}

impl Step {
  pub fn is_theory(&self) -> bool {
    matches!(self, Step::Theory { .. })
  }

  pub fn title(&self) -> &str {
    match self {
      Step::Theory { title, .. }
      | Step::QuizSingle { title, .. }
      | Step::TextAnswer { title, .. }
      | Step::CodeAnswer { title, .. } => title,
    }
  }
}

/// Reusable definition of a practice task. `cycle_code = None` means the
/// template may be used in any cycle.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TaskTemplate {
  pub id: TemplateId,
  #[serde(rename = "type")]
  pub task_type: TaskType,
  #[serde(default, rename = "cycleCode", alias = "cycle_code")]
  pub cycle_code: Option<u32>,
  pub title: String,
  pub prompt: String,
  pub xp: u32,
  #[serde(default)]
  pub steps: Vec<Step>,
}

impl TaskTemplate {
  pub fn usable_in(&self, cycle_code: u32) -> bool {
    self.cycle_code.map_or(true, |c| c == cycle_code)
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
  Todo,
  InProgress,
  Done,
}

/// One calendar day's plan. `completed_xp` only grows and `is_completed` is a
/// one-way latch; both are written exclusively by the ledger.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPlan {
  pub id: PlanId,
  pub learner: LearnerId,
  pub date: NaiveDate,
  pub cycle_code: u32,
  pub target_xp: u32,
  pub completed_xp: u32,
  pub is_completed: bool,
  pub task_ids: Vec<TaskId>,
  pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTask {
  pub id: TaskId,
  pub plan_id: PlanId,
  pub learner: LearnerId,
  pub template_id: TemplateId,
  #[serde(rename = "type")]
  pub task_type: TaskType,
  pub title: String,
  pub prompt: String,
  /// Copied from the template when the plan is built.
  pub xp: u32,
  pub status: TaskStatus,
  pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
  Active,
  Completed,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskStepState {
  pub step_index: usize,
  pub user_answer_text: Option<String>,
  pub user_selected_option: Option<i64>,
  pub is_passed: bool,
}

/// Walk through one task's steps. `step_states[i]` belongs to step `i`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSession {
  pub id: SessionId,
  pub learner: LearnerId,
  pub daily_task_id: TaskId,
  pub current_step_index: usize,
  pub status: SessionStatus,
  pub step_states: Vec<TaskStepState>,
  pub created_at: DateTime<Utc>,
}

/// Per-learner cumulative state. Rank is not stored; it is derived from
/// `total_xp` on every read.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
  pub learner: LearnerId,
  pub total_xp: u64,
  pub current_cycle_code: u32,
  pub streak: u32,
  pub last_completed_date: Option<NaiveDate>,
}

impl Progress {
  pub fn new(learner: LearnerId, first_cycle_code: u32) -> Self {
    Self {
      learner,
      total_xp: 0,
      current_cycle_code: first_cycle_code,
      streak: 0,
      last_completed_date: None,
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XpLogEntry {
  pub id: Uuid,
  pub learner: LearnerId,
  pub date: NaiveDate,
  pub amount: u32,
  pub reason: String,
  pub task_id: TaskId,
  pub created_at: DateTime<Utc>,
}

// -------- Sparring --------

/// Question from the sparring bank.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SparringQuestion {
  pub id: u32,
  #[serde(alias = "cycle_code")]
  pub cycle_code: u32,
  pub category: String,
  #[serde(default = "default_min_rank_index", alias = "min_rank_index")]
  pub min_rank_index: u32,
  pub question: String,
  #[serde(default, alias = "key_points")]
  pub key_points: Vec<String>,
}

fn default_min_rank_index() -> u32 {
  1
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparringProgress {
  pub learner: LearnerId,
  pub total_points: u64,
  pub mark_points: u64,
  pub last_question_id: Option<u32>,
}

/// Normalised output of the answer-evaluation collaborator. The core treats it
/// as opaque apart from `score`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
  pub score: f32,
  #[serde(default)]
  pub passed: bool,
  #[serde(default)]
  pub strengths: Vec<String>,
  #[serde(default)]
  pub mistakes: Vec<String>,
  #[serde(default)]
  pub missing: Vec<String>,
  #[serde(default)]
  pub better_answer: String,
  #[serde(default)]
  pub follow_up_question: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparringAttempt {
  pub id: Uuid,
  pub learner: LearnerId,
  pub date: NaiveDate,
  pub rank_index: u32,
  pub question: String,
  pub user_answer: String,
  pub evaluation: Evaluation,
  pub passed: bool,
  pub points_awarded: u32,
  pub created_at: DateTime<Utc>,
}

// -------- Mock interview rounds --------

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MockMode {
  Timed,
  Untimed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockRound {
  pub id: Uuid,
  pub learner: LearnerId,
  pub date: NaiveDate,
  pub duration_min: u32,
  pub mode: MockMode,
  pub score: f32,
  pub notes: Option<String>,
  pub created_at: DateTime<Utc>,
}
