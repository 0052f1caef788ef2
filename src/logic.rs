//! Core behaviors behind the HTTP handlers: one async fn per engine operation.
//!
//! Every mutating operation runs inside a single `Store::transact` call, so it
//! either applies completely or not at all, and operations never interleave.
//! Read-only operations use `Store::read`.

use chrono::NaiveDate;
use tracing::{debug, info, instrument};

use crate::domain::{LearnerId, MockRound, Progress, SessionId, SparringQuestion, TaskId, XpLogEntry};
use crate::error::{EngineError, EngineResult};
use crate::gate::{self, AdvanceOutcome, CycleView, GateReport};
use crate::mock::{self, MockRoundInput};
use crate::planner;
use crate::protocol::{to_plan_view, to_progress_view, PlanView, ProgressView};
use crate::session::{self, AbandonOutcome, AnswerAccepted, FinishOutcome, SessionView};
use crate::sparring::{self, AttemptInput, AttemptOutcome, SparringProgressView};
use crate::state::AppState;
use crate::steps::Answer;
use crate::util::trunc_for_log;

// -------- plans --------

/// Return the plan for `date` in the learner's current cycle, creating it if needed.
#[instrument(level = "info", skip(state), fields(%learner, %date))]
pub async fn generate_plan(state: &AppState, learner: LearnerId, date: NaiveDate, force: bool) -> EngineResult<PlanView> {
  let first = state.first_cycle_code();
  state
    .store
    .transact(|t| {
      let progress = t.progress_mut(learner, first);
      let (cycle_code, streak) = (progress.current_cycle_code, progress.streak);
      debug!(target: "plan", %learner, cycle_code, streak, "Generating plan");
      let plan_id = planner::generate_plan(t, &state.catalog, &state.game, learner, date, cycle_code, force)?;
      let plan = t.plan(plan_id)?;
      Ok(to_plan_view(t, plan))
    })
    .await
}

#[instrument(level = "debug", skip(state), fields(%learner, %date))]
pub async fn get_plan(state: &AppState, learner: LearnerId, date: NaiveDate) -> Option<PlanView> {
  state
    .store
    .read(|t| t.plan_for_date(learner, date).map(|p| to_plan_view(t, p)))
    .await
}

// -------- sessions --------

#[instrument(level = "info", skip(state), fields(%learner, %task_id))]
pub async fn start_session(state: &AppState, learner: LearnerId, task_id: TaskId) -> EngineResult<SessionView> {
  state
    .store
    .transact(|t| session::start(t, &state.catalog, &state.game, learner, task_id))
    .await
}

#[instrument(level = "debug", skip(state), fields(%learner, %session_id))]
pub async fn get_session(state: &AppState, learner: LearnerId, session_id: SessionId) -> EngineResult<SessionView> {
  state
    .store
    .read(|t| session::get(t, &state.catalog, &state.game, learner, session_id))
    .await
}

#[instrument(level = "info", skip(state, answer), fields(%learner, %session_id))]
pub async fn submit_answer(
  state: &AppState,
  learner: LearnerId,
  session_id: SessionId,
  answer: Answer,
) -> EngineResult<AnswerAccepted> {
  if let Answer::Text(text) = &answer {
    debug!(target: "session", %session_id, answer = %trunc_for_log(text, 80), "Answer received");
  }
  state
    .store
    .transact(|t| session::submit_answer(t, &state.catalog, &state.game, learner, session_id, answer))
    .await
}

#[instrument(level = "info", skip(state), fields(%learner, %session_id))]
pub async fn advance_step(state: &AppState, learner: LearnerId, session_id: SessionId) -> EngineResult<SessionView> {
  state
    .store
    .transact(|t| session::advance(t, &state.catalog, &state.game, learner, session_id))
    .await
}

/// Finish the session and book XP. `today` is the learner's calendar day and
/// drives the streak.
#[instrument(level = "info", skip(state), fields(%learner, %session_id, %today))]
pub async fn finish_session(
  state: &AppState,
  learner: LearnerId,
  session_id: SessionId,
  today: NaiveDate,
) -> EngineResult<FinishOutcome> {
  let first = state.first_cycle_code();
  let out = state
    .store
    .transact(|t| session::finish(t, &state.catalog, &state.game, learner, session_id, first, today))
    .await?;
  info!(
    target: "ledger",
    %learner,
    awarded_xp = out.completion.awarded_xp,
    total_xp = out.completion.new_total_xp,
    rank = %out.completion.new_rank,
    streak = out.completion.new_streak,
    day_complete = out.completion.day_complete,
    "XP booked"
  );
  Ok(out)
}

#[instrument(level = "info", skip(state), fields(%learner, %session_id))]
pub async fn abandon_session(state: &AppState, learner: LearnerId, session_id: SessionId) -> EngineResult<AbandonOutcome> {
  state.store.transact(|t| session::abandon(t, learner, session_id)).await
}

// -------- progression --------

#[instrument(level = "debug", skip(state), fields(%learner))]
pub async fn get_progress(state: &AppState, learner: LearnerId) -> ProgressView {
  let first = state.first_cycle_code();
  state
    .store
    .read(|t| match t.progress(learner) {
      Some(p) => to_progress_view(p, &state.game),
      None => to_progress_view(&Progress::new(learner, first), &state.game),
    })
    .await
}

/// The learner's XP log, newest first.
#[instrument(level = "debug", skip(state), fields(%learner))]
pub async fn list_xp_log(state: &AppState, learner: LearnerId) -> Vec<XpLogEntry> {
  state
    .store
    .read(|t| t.xp_log.iter().rev().filter(|e| e.learner == learner).cloned().collect())
    .await
}

// -------- cycles --------

#[instrument(level = "info", skip(state), fields(%learner))]
pub async fn can_advance_cycle(state: &AppState, learner: LearnerId) -> GateReport {
  let first = state.first_cycle_code();
  let report = state
    .store
    .read(|t| {
      let cycle = t.progress(learner).map(|p| p.current_cycle_code).unwrap_or(first);
      gate::can_advance(t, &state.game, learner, cycle)
    })
    .await;
  debug!(target: "gate", %learner, cycle_code = report.cycle_code, can_advance = report.can_advance, reasons = report.reasons.len(), "Gate evaluated");
  report
}

#[instrument(level = "info", skip(state), fields(%learner))]
pub async fn advance_cycle(state: &AppState, learner: LearnerId) -> EngineResult<AdvanceOutcome> {
  state
    .store
    .transact(|t| gate::advance_cycle(t, &state.catalog, &state.game, learner))
    .await
}

#[instrument(level = "debug", skip(state), fields(%learner))]
pub async fn list_cycles(state: &AppState, learner: LearnerId) -> Vec<CycleView> {
  state
    .store
    .read(|t| gate::list_cycles(t, &state.catalog, &state.game, learner))
    .await
}

// -------- sparring --------

#[instrument(level = "debug", skip(state), fields(%learner))]
pub async fn sparring_progress(state: &AppState, learner: LearnerId) -> SparringProgressView {
  state
    .store
    .read(|t| sparring::progress_view(t.sparring(learner), &state.game.sparring))
    .await
}

#[instrument(level = "info", skip(state), fields(%learner))]
pub async fn next_sparring_question(
  state: &AppState,
  learner: LearnerId,
  rank_index: u32,
  cycle_code: u32,
) -> EngineResult<SparringQuestion> {
  if rank_index == 0 {
    return Err(EngineError::BadRequest("rank index starts at 1".into()));
  }
  state
    .store
    .transact(|t| {
      let mut rng = rand::thread_rng();
      sparring::next_question(t, &state.catalog, &state.game.sparring, learner, rank_index, cycle_code, &mut rng)
    })
    .await
}

#[instrument(level = "info", skip(state, input), fields(%learner, rank_index = input.rank_index, answer_len = input.user_answer.len()))]
pub async fn record_sparring_attempt(
  state: &AppState,
  learner: LearnerId,
  input: AttemptInput,
) -> EngineResult<AttemptOutcome> {
  state
    .store
    .transact(|t| sparring::record_attempt(t, &state.game.sparring, learner, input))
    .await
}

// -------- mock rounds --------

#[instrument(level = "info", skip(state, input), fields(%learner, %today))]
pub async fn record_mock_round(
  state: &AppState,
  learner: LearnerId,
  today: NaiveDate,
  input: MockRoundInput,
) -> EngineResult<MockRound> {
  state.store.transact(|t| mock::record(t, &state.game, learner, today, input)).await
}

#[instrument(level = "debug", skip(state), fields(%learner))]
pub async fn list_mock_rounds(state: &AppState, learner: LearnerId) -> Vec<MockRound> {
  state.store.read(|t| mock::recent(t, learner)).await
}
