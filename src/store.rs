//! In-memory persistence.
//!
//! All tables sit behind one `RwLock`. Mutations go through [`Store::transact`],
//! which holds the write lock for the whole operation, so operations on the
//! store are serialised with respect to each other. While a transaction runs,
//! every mutable access first journals the prior value of the row it touches;
//! on `Err` the journal is replayed backwards and the append-only logs are
//! truncated to their starting length, so a failed operation leaves nothing
//! half-applied. Cost is proportional to the rows touched, not to history.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::NaiveDate;
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::domain::{
  DailyPlan, DailyTask, LearnerId, MockRound, PlanId, Progress, SessionId, SparringAttempt,
  SparringProgress, TaskId, TaskSession, XpLogEntry,
};
use crate::error::{EngineError, EngineResult};

/// Prior value of one row; `None` means the row did not exist.
#[derive(Debug)]
enum Undo {
  Plan(PlanId, Option<DailyPlan>),
  PlanByDate((LearnerId, NaiveDate), Option<PlanId>),
  Task(TaskId, Option<DailyTask>),
  Session(SessionId, Option<TaskSession>),
  SessionByTask(TaskId, Option<SessionId>),
  Progress(LearnerId, Option<Progress>),
  Sparring(LearnerId, Option<SparringProgress>),
}

/// Log lengths when a transaction began.
#[derive(Clone, Copy, Debug)]
struct Checkpoint {
  xp_log: usize,
  sparring_attempts: usize,
  mock_rounds: usize,
}

fn restore<K: Eq + Hash, V>(map: &mut HashMap<K, V>, key: K, prior: Option<V>) {
  match prior {
    Some(v) => {
      map.insert(key, v);
    }
    None => {
      map.remove(&key);
    }
  }
}

#[derive(Debug, Default)]
pub struct Tables {
  plans: HashMap<PlanId, DailyPlan>,
  plan_by_date: HashMap<(LearnerId, NaiveDate), PlanId>,
  tasks: HashMap<TaskId, DailyTask>,
  sessions: HashMap<SessionId, TaskSession>,
  session_by_task: HashMap<TaskId, SessionId>,
  progress: HashMap<LearnerId, Progress>,
  /// Append-only.
  pub xp_log: Vec<XpLogEntry>,
  sparring: HashMap<LearnerId, SparringProgress>,
  /// Append-only.
  pub sparring_attempts: Vec<SparringAttempt>,
  /// Append-only.
  pub mock_rounds: Vec<MockRound>,
  journal: Option<Vec<Undo>>,
}

impl Tables {
  // -------- journal --------

  fn note(&mut self, undo: impl FnOnce(&Self) -> Undo) {
    if self.journal.is_some() {
      let entry = undo(self);
      if let Some(journal) = self.journal.as_mut() {
        journal.push(entry);
      }
    }
  }

  fn note_plan(&mut self, id: PlanId) {
    self.note(|t| Undo::Plan(id, t.plans.get(&id).cloned()));
  }

  fn note_plan_by_date(&mut self, key: (LearnerId, NaiveDate)) {
    self.note(|t| Undo::PlanByDate(key, t.plan_by_date.get(&key).copied()));
  }

  fn note_task(&mut self, id: TaskId) {
    self.note(|t| Undo::Task(id, t.tasks.get(&id).cloned()));
  }

  fn note_session(&mut self, id: SessionId) {
    self.note(|t| Undo::Session(id, t.sessions.get(&id).cloned()));
  }

  fn note_session_by_task(&mut self, task_id: TaskId) {
    self.note(|t| Undo::SessionByTask(task_id, t.session_by_task.get(&task_id).copied()));
  }

  fn begin(&mut self) -> Checkpoint {
    self.journal = Some(Vec::new());
    Checkpoint {
      xp_log: self.xp_log.len(),
      sparring_attempts: self.sparring_attempts.len(),
      mock_rounds: self.mock_rounds.len(),
    }
  }

  fn commit(&mut self) {
    self.journal = None;
  }

  /// Undo everything journaled since `begin`, newest first.
  fn rollback(&mut self, cp: Checkpoint) -> usize {
    let journal = self.journal.take().unwrap_or_default();
    let undone = journal.len();
    for undo in journal.into_iter().rev() {
      match undo {
        Undo::Plan(k, v) => restore(&mut self.plans, k, v),
        Undo::PlanByDate(k, v) => restore(&mut self.plan_by_date, k, v),
        Undo::Task(k, v) => restore(&mut self.tasks, k, v),
        Undo::Session(k, v) => restore(&mut self.sessions, k, v),
        Undo::SessionByTask(k, v) => restore(&mut self.session_by_task, k, v),
        Undo::Progress(k, v) => restore(&mut self.progress, k, v),
        Undo::Sparring(k, v) => restore(&mut self.sparring, k, v),
      }
    }
    self.xp_log.truncate(cp.xp_log);
    self.sparring_attempts.truncate(cp.sparring_attempts);
    self.mock_rounds.truncate(cp.mock_rounds);
    undone
  }

  // -------- plans & tasks --------

  pub fn plan_for_date(&self, learner: LearnerId, date: NaiveDate) -> Option<&DailyPlan> {
    self.plan_by_date.get(&(learner, date)).and_then(|id| self.plans.get(id))
  }

  pub fn plan(&self, id: PlanId) -> EngineResult<&DailyPlan> {
    self.plans.get(&id).ok_or_else(|| EngineError::not_found("plan", id))
  }

  pub fn plan_mut(&mut self, id: PlanId) -> EngineResult<&mut DailyPlan> {
    self.note_plan(id);
    self.plans.get_mut(&id).ok_or_else(|| EngineError::not_found("plan", id))
  }

  pub fn plans_of(&self, learner: LearnerId) -> impl Iterator<Item = &DailyPlan> {
    self.plans.values().filter(move |p| p.learner == learner)
  }

  /// Insert a plan with its tasks. One plan per (learner, date).
  pub fn insert_plan(&mut self, plan: DailyPlan, tasks: Vec<DailyTask>) -> EngineResult<()> {
    let key = (plan.learner, plan.date);
    if self.plan_by_date.contains_key(&key) {
      return Err(EngineError::InvalidState(format!("a plan for {} already exists", plan.date)));
    }
    for task in tasks {
      self.note_task(task.id);
      self.tasks.insert(task.id, task);
    }
    self.note_plan_by_date(key);
    self.plan_by_date.insert(key, plan.id);
    self.note_plan(plan.id);
    self.plans.insert(plan.id, plan);
    Ok(())
  }

  /// Delete a plan together with its tasks and their sessions.
  pub fn remove_plan(&mut self, id: PlanId) -> Option<DailyPlan> {
    self.note_plan(id);
    let plan = self.plans.remove(&id)?;
    let key = (plan.learner, plan.date);
    self.note_plan_by_date(key);
    self.plan_by_date.remove(&key);
    for task_id in &plan.task_ids {
      self.note_task(*task_id);
      self.tasks.remove(task_id);
      self.note_session_by_task(*task_id);
      if let Some(session_id) = self.session_by_task.remove(task_id) {
        self.note_session(session_id);
        self.sessions.remove(&session_id);
      }
    }
    debug!(target: "plan", plan_id = %id, date = %plan.date, tasks = plan.task_ids.len(), "Plan removed");
    Some(plan)
  }

  /// Tasks of a plan in plan order.
  pub fn tasks_of(&self, plan: &DailyPlan) -> Vec<&DailyTask> {
    plan.task_ids.iter().filter_map(|id| self.tasks.get(id)).collect()
  }

  /// A task owned by `learner`. Someone else's task is reported as missing.
  pub fn task(&self, learner: LearnerId, id: TaskId) -> EngineResult<&DailyTask> {
    self
      .tasks
      .get(&id)
      .filter(|t| t.learner == learner)
      .ok_or_else(|| EngineError::not_found("task", id))
  }

  pub fn task_mut(&mut self, learner: LearnerId, id: TaskId) -> EngineResult<&mut DailyTask> {
    self.note_task(id);
    self
      .tasks
      .get_mut(&id)
      .filter(|t| t.learner == learner)
      .ok_or_else(|| EngineError::not_found("task", id))
  }

  // -------- sessions --------

  pub fn session(&self, learner: LearnerId, id: SessionId) -> EngineResult<&TaskSession> {
    self
      .sessions
      .get(&id)
      .filter(|s| s.learner == learner)
      .ok_or_else(|| EngineError::not_found("session", id))
  }

  pub fn session_mut(&mut self, learner: LearnerId, id: SessionId) -> EngineResult<&mut TaskSession> {
    self.note_session(id);
    self
      .sessions
      .get_mut(&id)
      .filter(|s| s.learner == learner)
      .ok_or_else(|| EngineError::not_found("session", id))
  }

  pub fn session_for_task(&self, task_id: TaskId) -> Option<&TaskSession> {
    self.session_by_task.get(&task_id).and_then(|id| self.sessions.get(id))
  }

  /// Insert a session. One session per daily task.
  pub fn insert_session(&mut self, session: TaskSession) -> EngineResult<()> {
    if self.session_by_task.contains_key(&session.daily_task_id) {
      return Err(EngineError::InvalidState(format!(
        "task {} already has a session",
        session.daily_task_id
      )));
    }
    self.note_session_by_task(session.daily_task_id);
    self.session_by_task.insert(session.daily_task_id, session.id);
    self.note_session(session.id);
    self.sessions.insert(session.id, session);
    Ok(())
  }

  pub fn remove_session(&mut self, id: SessionId) -> Option<TaskSession> {
    self.note_session(id);
    let session = self.sessions.remove(&id)?;
    self.note_session_by_task(session.daily_task_id);
    self.session_by_task.remove(&session.daily_task_id);
    Some(session)
  }

  // -------- progress --------

  pub fn progress(&self, learner: LearnerId) -> Option<&Progress> {
    self.progress.get(&learner)
  }

  /// The learner's progress row, created at `first_cycle_code` on first use.
  pub fn progress_mut(&mut self, learner: LearnerId, first_cycle_code: u32) -> &mut Progress {
    self.note(|t| Undo::Progress(learner, t.progress.get(&learner).cloned()));
    self
      .progress
      .entry(learner)
      .or_insert_with(|| Progress::new(learner, first_cycle_code))
  }

  pub fn sparring(&self, learner: LearnerId) -> Option<&SparringProgress> {
    self.sparring.get(&learner)
  }

  pub fn sparring_mut(&mut self, learner: LearnerId) -> &mut SparringProgress {
    self.note(|t| Undo::Sparring(learner, t.sparring.get(&learner).cloned()));
    self
      .sparring
      .entry(learner)
      .or_insert_with(|| SparringProgress { learner, ..Default::default() })
  }
}

#[derive(Debug, Default)]
pub struct Store {
  inner: RwLock<Tables>,
}

impl Store {
  pub fn new() -> Self {
    Self::default()
  }

  /// Run a read-only query against a consistent snapshot.
  pub async fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
    let guard = self.inner.read().await;
    f(&guard)
  }

  /// Run `f` as one atomic unit. Changes are kept only on `Ok`.
  pub async fn transact<T>(&self, f: impl FnOnce(&mut Tables) -> EngineResult<T>) -> EngineResult<T> {
    let mut guard = self.inner.write().await;
    let tables = &mut *guard;
    let cp = tables.begin();
    match f(tables) {
      Ok(out) => {
        tables.commit();
        Ok(out)
      }
      Err(e) => {
        let undone = tables.rollback(cp);
        if matches!(e, EngineError::TemplateMissing { .. }) {
          error!(target: "kata_backend", error = %e, undone, "Transaction aborted on data-integrity error");
        } else {
          debug!(target: "kata_backend", kind = e.kind(), undone, "Transaction rolled back");
        }
        Err(e)
      }
    }
  }
}
