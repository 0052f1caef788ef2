//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; errors map to status codes via `EngineError`.
//!
//! The adapter serves a single learner and uses the server's local calendar day.

use std::sync::Arc;

use axum::{
  extract::{Path, State},
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::domain::{MockRound, SessionId, SparringQuestion, XpLogEntry, DEFAULT_LEARNER};
use crate::error::{EngineError, EngineResult};
use crate::gate::{AdvanceOutcome, CycleView, GateReport};
use crate::logic;
use crate::mock::MockRoundInput;
use crate::protocol::*;
use crate::session::{AbandonOutcome, AnswerAccepted, FinishOutcome, SessionView};
use crate::sparring::{AttemptInput, AttemptOutcome, SparringProgressView};
use crate::state::AppState;
use crate::util::{parse_date, today};

type ApiResult<T> = EngineResult<Json<T>>;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { ok: true })
}

// -------- plans --------

#[instrument(level = "info", skip(state))]
pub async fn http_get_today(State(state): State<Arc<AppState>>) -> Json<TodayOut> {
  let plan = logic::get_plan(&state, DEFAULT_LEARNER, today()).await;
  Json(TodayOut { plan })
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_generate(
  State(state): State<Arc<AppState>>,
  body: Option<Json<GenerateIn>>,
) -> ApiResult<PlanView> {
  let body = body.map(|Json(b)| b).unwrap_or_default();
  let date = match body.date.as_deref() {
    Some(s) => parse_date(s)?,
    None => today(),
  };
  let plan = logic::generate_plan(&state, DEFAULT_LEARNER, date, body.force).await?;
  info!(target: "plan", %date, plan_id = %plan.plan.id, tasks = plan.tasks.len(), force = body.force, "HTTP plan served");
  Ok(Json(plan))
}

#[instrument(level = "info", skip(state), fields(%date))]
pub async fn http_get_plan(State(state): State<Arc<AppState>>, Path(date): Path<String>) -> ApiResult<PlanView> {
  let day = parse_date(&date)?;
  logic::get_plan(&state, DEFAULT_LEARNER, day)
    .await
    .map(Json)
    .ok_or_else(|| EngineError::not_found("plan", day))
}

// -------- sessions --------

#[instrument(level = "info", skip(state, body), fields(task_id = %body.daily_task_id))]
pub async fn http_start_session(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StartSessionIn>,
) -> ApiResult<SessionView> {
  Ok(Json(logic::start_session(&state, DEFAULT_LEARNER, body.daily_task_id).await?))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_get_session(State(state): State<Arc<AppState>>, Path(id): Path<SessionId>) -> ApiResult<SessionView> {
  Ok(Json(logic::get_session(&state, DEFAULT_LEARNER, id).await?))
}

#[instrument(level = "info", skip(state, body), fields(%id))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  Path(id): Path<SessionId>,
  Json(body): Json<AnswerIn>,
) -> ApiResult<AnswerAccepted> {
  Ok(Json(logic::submit_answer(&state, DEFAULT_LEARNER, id, body.answer).await?))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_post_next(State(state): State<Arc<AppState>>, Path(id): Path<SessionId>) -> ApiResult<SessionView> {
  Ok(Json(logic::advance_step(&state, DEFAULT_LEARNER, id).await?))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_post_finish(State(state): State<Arc<AppState>>, Path(id): Path<SessionId>) -> ApiResult<FinishOutcome> {
  Ok(Json(logic::finish_session(&state, DEFAULT_LEARNER, id, today()).await?))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_post_abandon(
  State(state): State<Arc<AppState>>,
  Path(id): Path<SessionId>,
) -> ApiResult<AbandonOutcome> {
  Ok(Json(logic::abandon_session(&state, DEFAULT_LEARNER, id).await?))
}

// -------- progression & cycles --------

#[instrument(level = "info", skip(state))]
pub async fn http_get_progress(State(state): State<Arc<AppState>>) -> Json<ProgressView> {
  Json(logic::get_progress(&state, DEFAULT_LEARNER).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_xp_log(State(state): State<Arc<AppState>>) -> Json<Vec<XpLogEntry>> {
  Json(logic::list_xp_log(&state, DEFAULT_LEARNER).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_cycles(State(state): State<Arc<AppState>>) -> Json<Vec<CycleView>> {
  Json(logic::list_cycles(&state, DEFAULT_LEARNER).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_gate(State(state): State<Arc<AppState>>) -> Json<GateReport> {
  Json(logic::can_advance_cycle(&state, DEFAULT_LEARNER).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_advance(State(state): State<Arc<AppState>>) -> ApiResult<AdvanceOutcome> {
  Ok(Json(logic::advance_cycle(&state, DEFAULT_LEARNER).await?))
}

// -------- sparring --------

#[instrument(level = "info", skip(state))]
pub async fn http_get_sparring_progress(State(state): State<Arc<AppState>>) -> Json<SparringProgressView> {
  Json(logic::sparring_progress(&state, DEFAULT_LEARNER).await)
}

#[instrument(level = "info", skip(state, body), fields(rank_index = body.rank_index, cycle_code = body.cycle_code))]
pub async fn http_post_sparring_question(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SparringQuestionIn>,
) -> ApiResult<SparringQuestion> {
  let q = logic::next_sparring_question(&state, DEFAULT_LEARNER, body.rank_index, body.cycle_code).await?;
  info!(target: "sparring", question_id = q.id, category = %q.category, "HTTP sparring question served");
  Ok(Json(q))
}

#[instrument(level = "info", skip(state, body), fields(answer_len = body.user_answer.len()))]
pub async fn http_post_sparring_attempt(
  State(state): State<Arc<AppState>>,
  Json(body): Json<AttemptInput>,
) -> ApiResult<AttemptOutcome> {
  Ok(Json(logic::record_sparring_attempt(&state, DEFAULT_LEARNER, body).await?))
}

// -------- mock rounds --------

#[instrument(level = "info", skip(state))]
pub async fn http_get_mock(State(state): State<Arc<AppState>>) -> Json<Vec<MockRound>> {
  Json(logic::list_mock_rounds(&state, DEFAULT_LEARNER).await)
}

#[instrument(level = "info", skip(state, body), fields(score = body.score))]
pub async fn http_post_mock(
  State(state): State<Arc<AppState>>,
  Json(body): Json<MockRoundInput>,
) -> ApiResult<MockRound> {
  Ok(Json(logic::record_mock_round(&state, DEFAULT_LEARNER, today(), body).await?))
}
