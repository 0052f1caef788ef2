//! Step-session state machine for one daily task.
//!
//! `ACTIVE` walks steps `0..N-1`; `finish` moves to the terminal `COMPLETED`
//! and books XP through the ledger; `abandon` deletes the session and puts the
//! task back to TODO. Theory steps never block: they are created passed, and
//! re-asserted as passed on resume and on finish.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::config::GameConfig;
use crate::domain::{
  DailyTask, LearnerId, SessionId, SessionStatus, Step, TaskId, TaskSession, TaskStatus, TaskStepState,
};
use crate::error::{EngineError, EngineResult};
use crate::ledger::{self, Completion};
use crate::steps::{steps_for, validate_answer, Answer};
use crate::store::Tables;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
  pub session_id: SessionId,
  pub daily_task_id: TaskId,
  pub status: SessionStatus,
  pub current_step_index: usize,
  pub total_steps: usize,
  pub current_step: Step,
  pub step_state: TaskStepState,
  pub passed_steps: usize,
  pub started_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerAccepted {
  pub step_index: usize,
  pub step_state: TaskStepState,
  /// False on the last step: the caller should finish instead of advancing.
  pub has_next: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishOutcome {
  pub session_id: SessionId,
  pub daily_task_id: TaskId,
  #[serde(flatten)]
  pub completion: Completion,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AbandonOutcome {
  pub session_id: SessionId,
  pub daily_task_id: Option<TaskId>,
  pub already_gone: bool,
}

fn resolve_steps(catalog: &Catalog, cfg: &GameConfig, task: &DailyTask) -> EngineResult<Vec<Step>> {
  let template = catalog.template(&task.template_id).ok_or_else(|| EngineError::TemplateMissing {
    template_id: task.template_id.clone(),
    task_id: task.id.to_string(),
  })?;
  Ok(steps_for(template, cfg))
}

/// Make sure there is one state per step and every theory step is passed.
/// Returns how many states changed.
fn pass_theory_steps(session: &mut TaskSession, steps: &[Step]) -> usize {
  while session.step_states.len() < steps.len() {
    let step_index = session.step_states.len();
    session.step_states.push(TaskStepState { step_index, ..Default::default() });
  }
  let mut changed = 0;
  for (state, step) in session.step_states.iter_mut().zip(steps) {
    if step.is_theory() && !state.is_passed {
      state.is_passed = true;
      changed += 1;
    }
  }
  changed
}

fn view(session: &TaskSession, steps: &[Step]) -> EngineResult<SessionView> {
  let idx = session.current_step_index;
  let current_step = steps.get(idx).cloned().ok_or_else(|| {
    EngineError::InvalidState(format!("step index {} outside {} steps", idx, steps.len()))
  })?;
  let step_state = session
    .step_states
    .get(idx)
    .cloned()
    .unwrap_or(TaskStepState { step_index: idx, ..Default::default() });
  Ok(SessionView {
    session_id: session.id,
    daily_task_id: session.daily_task_id,
    status: session.status,
    current_step_index: idx,
    total_steps: steps.len(),
    current_step,
    step_state,
    passed_steps: session.step_states.iter().filter(|s| s.is_passed).count(),
    started_at: session.created_at,
  })
}

fn ensure_active(session: &TaskSession) -> EngineResult<()> {
  match session.status {
    SessionStatus::Active => Ok(()),
    SessionStatus::Completed => Err(EngineError::InvalidState(format!("session {} is not active", session.id))),
  }
}

/// Open (or resume) the session for a daily task.
pub fn start(
  tables: &mut Tables,
  catalog: &Catalog,
  cfg: &GameConfig,
  learner: LearnerId,
  task_id: TaskId,
) -> EngineResult<SessionView> {
  let task = tables.task(learner, task_id)?.clone();
  if task.status == TaskStatus::Done {
    return Err(EngineError::AlreadyCompleted(format!("task {} is already done", task_id)));
  }
  let steps = resolve_steps(catalog, cfg, &task)?;

  if let Some(existing) = tables.session_for_task(task_id).map(|s| s.id) {
    let session = tables.session_mut(learner, existing)?;
    if session.status == SessionStatus::Completed {
      return Err(EngineError::AlreadyCompleted(format!("session {} is completed", existing)));
    }
    let idx = session.current_step_index;
    if steps.get(idx).map_or(false, Step::is_theory) {
      if let Some(state) = session.step_states.get_mut(idx) {
        if !state.is_passed {
          state.is_passed = true;
          debug!(target: "session", session_id = %existing, step = idx, "Theory step auto-passed on resume");
        }
      }
    }
    info!(target: "session", %learner, %task_id, session_id = %existing, step = idx, "Session resumed");
    return view(session, &steps);
  }

  let session = TaskSession {
    id: Uuid::new_v4(),
    learner,
    daily_task_id: task_id,
    current_step_index: 0,
    status: SessionStatus::Active,
    step_states: steps
      .iter()
      .enumerate()
      .map(|(step_index, step)| TaskStepState { step_index, is_passed: step.is_theory(), ..Default::default() })
      .collect(),
    created_at: Utc::now(),
  };
  let out = view(&session, &steps)?;
  tables.insert_session(session)?;
  tables.task_mut(learner, task_id)?.status = TaskStatus::InProgress;
  info!(target: "session", %learner, %task_id, session_id = %out.session_id, steps = steps.len(), "Session started");
  Ok(out)
}

/// Read a session without touching it.
pub fn get(
  tables: &Tables,
  catalog: &Catalog,
  cfg: &GameConfig,
  learner: LearnerId,
  session_id: SessionId,
) -> EngineResult<SessionView> {
  let session = tables.session(learner, session_id)?;
  let task = tables.task(learner, session.daily_task_id)?;
  let steps = resolve_steps(catalog, cfg, task)?;
  view(session, &steps)
}

/// Validate an answer for the current step. A rejected answer changes nothing
/// and may be resubmitted any number of times.
pub fn submit_answer(
  tables: &mut Tables,
  catalog: &Catalog,
  cfg: &GameConfig,
  learner: LearnerId,
  session_id: SessionId,
  answer: Answer,
) -> EngineResult<AnswerAccepted> {
  let session = tables.session(learner, session_id)?;
  ensure_active(session)?;
  let task = tables.task(learner, session.daily_task_id)?;
  let steps = resolve_steps(catalog, cfg, task)?;
  let idx = session.current_step_index;
  let step = steps
    .get(idx)
    .ok_or_else(|| EngineError::InvalidState(format!("step index {} outside {} steps", idx, steps.len())))?;

  if let Err(reason) = validate_answer(step, &answer, cfg) {
    debug!(target: "session", %session_id, step = idx, title = step.title(), %reason, "Answer rejected");
    return Err(EngineError::ValidationFailed(reason));
  }

  let session = tables.session_mut(learner, session_id)?;
  pass_theory_steps(session, &steps);
  let state = &mut session.step_states[idx];
  match answer {
    Answer::Text(text) => {
      state.user_answer_text = Some(text);
      state.user_selected_option = None;
    }
    Answer::Option(choice) => {
      state.user_answer_text = None;
      state.user_selected_option = Some(choice);
    }
  }
  state.is_passed = true;
  info!(target: "session", %session_id, step = idx, "Answer accepted");
  Ok(AnswerAccepted { step_index: idx, step_state: state.clone(), has_next: idx + 1 < steps.len() })
}

/// Move to the next step once the current one is passed.
pub fn advance(
  tables: &mut Tables,
  catalog: &Catalog,
  cfg: &GameConfig,
  learner: LearnerId,
  session_id: SessionId,
) -> EngineResult<SessionView> {
  let session = tables.session(learner, session_id)?;
  ensure_active(session)?;
  let task = tables.task(learner, session.daily_task_id)?;
  let steps = resolve_steps(catalog, cfg, task)?;

  let session = tables.session_mut(learner, session_id)?;
  pass_theory_steps(session, &steps);
  let idx = session.current_step_index;
  if !session.step_states.get(idx).map_or(false, |s| s.is_passed) {
    return Err(EngineError::InvalidState(format!("step {} is not passed yet", idx)));
  }
  if idx + 1 >= steps.len() {
    return Err(EngineError::OutOfRange(idx));
  }
  session.current_step_index = idx + 1;
  info!(target: "session", %session_id, step = idx + 1, total = steps.len(), "Advanced");
  view(session, &steps)
}

/// Complete the session and book the task's XP in the same transaction.
pub fn finish(
  tables: &mut Tables,
  catalog: &Catalog,
  cfg: &GameConfig,
  learner: LearnerId,
  session_id: SessionId,
  first_cycle_code: u32,
  today: NaiveDate,
) -> EngineResult<FinishOutcome> {
  let session = tables.session(learner, session_id)?;
  if session.status == SessionStatus::Completed {
    return Err(EngineError::AlreadyCompleted(format!("session {} is completed", session_id)));
  }
  let task_id = session.daily_task_id;
  let task = tables.task(learner, task_id)?;
  let steps = resolve_steps(catalog, cfg, task)?;

  let session = tables.session_mut(learner, session_id)?;
  let fixed = pass_theory_steps(session, &steps);
  if fixed > 0 {
    debug!(target: "session", %session_id, fixed, "Theory steps auto-passed on finish");
  }
  let pending: Vec<usize> = session
    .step_states
    .iter()
    .zip(&steps)
    .filter(|(state, step)| !step.is_theory() && !state.is_passed)
    .map(|(state, _)| state.step_index)
    .collect();
  if !pending.is_empty() {
    return Err(EngineError::IncompleteSteps { pending });
  }
  session.status = SessionStatus::Completed;

  let completion = ledger::complete_task(tables, cfg, learner, task_id, first_cycle_code, today)?;
  info!(target: "session", %session_id, %task_id, awarded_xp = completion.awarded_xp, "Session finished");
  Ok(FinishOutcome { session_id, daily_task_id: task_id, completion })
}

/// Drop the session and return its task to TODO. A missing session counts as
/// already abandoned.
pub fn abandon(tables: &mut Tables, learner: LearnerId, session_id: SessionId) -> EngineResult<AbandonOutcome> {
  let session = match tables.session(learner, session_id) {
    Ok(s) => s,
    Err(_) => {
      debug!(target: "session", %session_id, "Abandon on missing session");
      return Ok(AbandonOutcome { session_id, daily_task_id: None, already_gone: true });
    }
  };
  if session.status == SessionStatus::Completed {
    return Err(EngineError::AlreadyCompleted(format!("session {} is completed", session_id)));
  }
  let task_id = session.daily_task_id;
  tables.remove_session(session_id);
  if let Ok(task) = tables.task_mut(learner, task_id) {
    task.status = TaskStatus::Todo;
  }
  info!(target: "session", %learner, %session_id, %task_id, "Session abandoned");
  Ok(AbandonOutcome { session_id, daily_task_id: Some(task_id), already_gone: false })
}
