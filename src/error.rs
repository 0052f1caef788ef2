//! Error kinds returned by every engine operation, and their HTTP mapping.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
  #[error("{entity} not found: {id}")]
  NotFound { entity: &'static str, id: String },

  #[error("already completed: {0}")]
  AlreadyCompleted(String),

  #[error("invalid state: {0}")]
  InvalidState(String),

  /// Recoverable: the learner may resubmit.
  #[error("{0}")]
  ValidationFailed(String),

  #[error("steps not passed yet: {pending:?}")]
  IncompleteSteps { pending: Vec<usize> },

  #[error("cycle gate not satisfied: {}", .0.join("; "))]
  GateNotSatisfied(Vec<String>),

  #[error("no step after index {0}, finish the session instead")]
  OutOfRange(usize),

  /// Catalog and stored tasks disagree. Fatal for the request.
  #[error("template {template_id} for task {task_id} is missing from the catalog")]
  TemplateMissing { template_id: String, task_id: String },

  #[error("cycle {0} is the final cycle")]
  FinalCycle(u32),

  #[error("rank {requested} is locked (unlocked up to {unlocked})")]
  RankLocked { requested: u32, unlocked: u32 },

  #[error("bad request: {0}")]
  BadRequest(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
  pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
    EngineError::NotFound { entity, id: id.to_string() }
  }

  pub fn kind(&self) -> &'static str {
    match self {
      EngineError::NotFound { .. } => "not_found",
      EngineError::AlreadyCompleted(_) => "already_completed",
      EngineError::InvalidState(_) => "invalid_state",
      EngineError::ValidationFailed(_) => "validation_failed",
      EngineError::IncompleteSteps { .. } => "incomplete_steps",
      EngineError::GateNotSatisfied(_) => "gate_not_satisfied",
      EngineError::OutOfRange(_) => "out_of_range",
      EngineError::TemplateMissing { .. } => "template_missing",
      EngineError::FinalCycle(_) => "final_cycle",
      EngineError::RankLocked { .. } => "rank_locked",
      EngineError::BadRequest(_) => "bad_request",
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
      EngineError::RankLocked { .. } => StatusCode::FORBIDDEN,
      EngineError::TemplateMissing { .. } => StatusCode::INTERNAL_SERVER_ERROR,
      _ => StatusCode::BAD_REQUEST,
    }
  }
}

impl IntoResponse for EngineError {
  fn into_response(self) -> Response {
    let status = self.status();
    let mut error = json!({
      "kind": self.kind(),
      "message": self.to_string(),
    });
    match &self {
      EngineError::GateNotSatisfied(reasons) => error["reasons"] = json!(reasons),
      EngineError::IncompleteSteps { pending } => error["pending"] = json!(pending),
      _ => {}
    }
    (status, Json(json!({ "error": error }))).into_response()
  }
}
