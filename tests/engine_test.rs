//! Engine integration tests
//!
//! Drives the async operation surface end to end:
//! - plan generation (idempotence, determinism, forced replacement)
//! - the step-session state machine
//! - XP awards, streaks and the XP log
//! - the cycle gate and cycle advancement
//! - atomicity and serialisation of concurrent operations

mod common;

use std::sync::Arc;

use common::*;
use kata_backend::domain::{SessionStatus, Step, TaskStatus, TaskType};
use kata_backend::error::EngineError;
use kata_backend::gate::CycleStatus;
use kata_backend::logic;
use kata_backend::steps::Answer;

// =============================================================================
// Plan generation
// =============================================================================

#[tokio::test]
async fn test_generate_plan_is_idempotent_per_day() {
    let state = state();
    let date = day("2024-06-03");

    let first = logic::generate_plan(&state, LEARNER, date, false).await.unwrap();
    let again = logic::generate_plan(&state, LEARNER, date, false).await.unwrap();

    assert_eq!(first.plan.id, again.plan.id);
    assert_eq!(first.tasks.len(), 5);
    assert_eq!(first.plan.target_xp, 110);
    assert_eq!(first.plan.completed_xp, 0);
    assert_eq!(first.progress_pct, 0);
    assert!(first.tasks.iter().all(|t| t.status == TaskStatus::Todo));
    let types: Vec<TaskType> = first.tasks.iter().map(|t| t.task_type).collect();
    assert_eq!(
        types,
        vec![
            TaskType::Knowledge,
            TaskType::DrillPrimary,
            TaskType::DrillSecondary,
            TaskType::Interview,
            TaskType::Interview,
        ]
    );
}

#[tokio::test]
async fn test_same_date_and_cycle_select_same_templates() {
    let a = state();
    let b = state();
    for d in ["2024-01-01", "2024-02-29", "2025-12-31"] {
        let pa = logic::generate_plan(&a, LEARNER, day(d), false).await.unwrap();
        let pb = logic::generate_plan(&b, 7, day(d), false).await.unwrap();
        let ids = |p: &kata_backend::protocol::PlanView| {
            p.tasks.iter().map(|t| t.template_id.clone()).collect::<Vec<_>>()
        };
        assert_eq!(ids(&pa), ids(&pb));
    }
}

#[tokio::test]
async fn test_forced_regeneration_replaces_plan_and_tasks() {
    let state = state();
    let date = day("2024-06-03");
    let old = logic::generate_plan(&state, LEARNER, date, false).await.unwrap();
    let old_task = old.tasks[0].id;
    logic::start_session(&state, LEARNER, old_task).await.unwrap();

    let fresh = logic::generate_plan(&state, LEARNER, date, true).await.unwrap();
    assert_ne!(fresh.plan.id, old.plan.id);
    assert!(fresh.tasks.iter().all(|t| t.status == TaskStatus::Todo));

    let err = logic::start_session(&state, LEARNER, old_task).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
    assert_eq!(logic::get_plan(&state, LEARNER, date).await.unwrap().plan.id, fresh.plan.id);
}

// =============================================================================
// Session state machine
// =============================================================================

#[tokio::test]
async fn test_theory_then_quiz_session() {
    let state = state();
    let date = day("2024-06-03");
    let plan = logic::generate_plan(&state, LEARNER, date, false).await.unwrap();
    let task = task_of(&plan, TaskType::Knowledge).id;

    let view = logic::start_session(&state, LEARNER, task).await.unwrap();
    assert_eq!(view.current_step_index, 0);
    assert_eq!(view.total_steps, 2);
    assert!(view.step_state.is_passed, "theory step starts passed");
    let sid = view.session_id;

    let view = logic::advance_step(&state, LEARNER, sid).await.unwrap();
    assert_eq!(view.current_step_index, 1);
    assert!(matches!(view.current_step, Step::QuizSingle { .. }));

    let err = logic::submit_answer(&state, LEARNER, sid, Answer::Option(0)).await.unwrap_err();
    assert!(matches!(err, EngineError::ValidationFailed(_)));
    let view = logic::get_session(&state, LEARNER, sid).await.unwrap();
    assert!(!view.step_state.is_passed);

    let err = logic::finish_session(&state, LEARNER, sid, date).await.unwrap_err();
    assert_eq!(err, EngineError::IncompleteSteps { pending: vec![1] });

    let ok = logic::submit_answer(&state, LEARNER, sid, Answer::Option(1)).await.unwrap();
    assert!(ok.step_state.is_passed);
    assert!(!ok.has_next);
    assert_eq!(ok.step_state.user_selected_option, Some(1));

    let err = logic::advance_step(&state, LEARNER, sid).await.unwrap_err();
    assert_eq!(err, EngineError::OutOfRange(1));

    let done = logic::finish_session(&state, LEARNER, sid, date).await.unwrap();
    assert_eq!(done.completion.awarded_xp, 30);
    assert_eq!(done.completion.new_total_xp, 30);
    assert!(!done.completion.day_complete);

    let view = logic::get_session(&state, LEARNER, sid).await.unwrap();
    assert_eq!(view.status, SessionStatus::Completed);
}

#[tokio::test]
async fn test_advance_requires_passed_step() {
    let state = state();
    let plan = logic::generate_plan(&state, LEARNER, day("2024-06-03"), false).await.unwrap();
    let task = task_of(&plan, TaskType::DrillPrimary).id;
    let view = logic::start_session(&state, LEARNER, task).await.unwrap();

    let err = logic::advance_step(&state, LEARNER, view.session_id).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    let err = logic::submit_answer(&state, LEARNER, view.session_id, Answer::Text("function f() {}".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ValidationFailed(_)));
}

#[tokio::test]
async fn test_no_double_award() {
    let state = state();
    let date = day("2024-06-03");
    let plan = logic::generate_plan(&state, LEARNER, date, false).await.unwrap();
    let task = task_of(&plan, TaskType::Knowledge).id;
    let done = complete(&state, LEARNER, task, date).await;

    let err = logic::finish_session(&state, LEARNER, done.session_id, date).await.unwrap_err();
    assert!(matches!(err, EngineError::AlreadyCompleted(_)));
    let err = logic::start_session(&state, LEARNER, task).await.unwrap_err();
    assert!(matches!(err, EngineError::AlreadyCompleted(_)));
    let err = logic::abandon_session(&state, LEARNER, done.session_id).await.unwrap_err();
    assert!(matches!(err, EngineError::AlreadyCompleted(_)));

    assert_eq!(logic::get_progress(&state, LEARNER).await.total_xp, 30);
    assert_eq!(logic::list_xp_log(&state, LEARNER).await.len(), 1);
    let plan = logic::get_plan(&state, LEARNER, date).await.unwrap();
    assert_eq!(plan.plan.completed_xp, 30);
}

#[tokio::test]
async fn test_resume_and_abandon() {
    let state = state();
    let plan = logic::generate_plan(&state, LEARNER, day("2024-06-03"), false).await.unwrap();
    let task = task_of(&plan, TaskType::Knowledge).id;

    let first = logic::start_session(&state, LEARNER, task).await.unwrap();
    logic::advance_step(&state, LEARNER, first.session_id).await.unwrap();
    let resumed = logic::start_session(&state, LEARNER, task).await.unwrap();
    assert_eq!(resumed.session_id, first.session_id);
    assert_eq!(resumed.current_step_index, 1);

    let out = logic::abandon_session(&state, LEARNER, first.session_id).await.unwrap();
    assert_eq!(out.daily_task_id, Some(task));
    assert!(!out.already_gone);
    let plan = logic::get_plan(&state, LEARNER, day("2024-06-03")).await.unwrap();
    assert_eq!(task_of(&plan, TaskType::Knowledge).status, TaskStatus::Todo);

    let again = logic::abandon_session(&state, LEARNER, first.session_id).await.unwrap();
    assert!(again.already_gone);

    let fresh = logic::start_session(&state, LEARNER, task).await.unwrap();
    assert_ne!(fresh.session_id, first.session_id);
    assert_eq!(fresh.current_step_index, 0);
}

#[tokio::test]
async fn test_other_learners_tasks_are_not_found() {
    let state = state();
    let plan = logic::generate_plan(&state, LEARNER, day("2024-06-03"), false).await.unwrap();
    let err = logic::start_session(&state, 2, plan.tasks[0].id).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
}

#[tokio::test]
async fn test_template_missing_aborts_without_changes() {
    let mut state = state();
    let plan = logic::generate_plan(&state, LEARNER, day("2024-06-03"), false).await.unwrap();
    let task = task_of(&plan, TaskType::Knowledge).id;

    // swap in a catalog that no longer knows the knowledge template
    let survivors = state.catalog.templates().iter().filter(|t| t.id != "know").cloned().collect();
    state.catalog = kata_backend::catalog::Catalog::new(
        state.catalog.cycles().to_vec(),
        survivors,
        state.catalog.sparring_questions().to_vec(),
    );

    let err = logic::start_session(&state, LEARNER, task).await.unwrap_err();
    assert!(matches!(err, EngineError::TemplateMissing { .. }));
    let plan = logic::get_plan(&state, LEARNER, day("2024-06-03")).await.unwrap();
    assert_eq!(task_of(&plan, TaskType::Knowledge).status, TaskStatus::Todo);
}

// =============================================================================
// Ledger: streaks, bonus, XP log
// =============================================================================

#[tokio::test]
async fn test_day_completion_latches_once_and_sets_streak() {
    let state = state();
    let date = day("2024-06-03");
    let outcomes = complete_day(&state, LEARNER, date).await;

    let completed: Vec<bool> = outcomes.iter().map(|o| o.completion.day_complete).collect();
    assert_eq!(completed, vec![false, false, false, false, true]);

    let plan = logic::get_plan(&state, LEARNER, date).await.unwrap();
    assert!(plan.plan.is_completed);
    assert_eq!(plan.plan.completed_xp, 110);
    assert_eq!(plan.progress_pct, 100);

    let progress = logic::get_progress(&state, LEARNER).await;
    assert_eq!(progress.total_xp, 110);
    assert_eq!(progress.streak, 1);
    assert_eq!(progress.last_completed_date, Some(date));
    assert_eq!(progress.rank, "Mizunoto");
    assert_eq!(progress.next_rank.as_deref(), Some("Mizunoe"));
    assert_eq!(progress.xp_for_next_rank, Some(390));
}

#[tokio::test]
async fn test_streak_bonus_after_three_consecutive_days() {
    let state = state();
    for d in ["2024-06-03", "2024-06-04", "2024-06-05"] {
        complete_day(&state, LEARNER, day(d)).await;
    }
    let progress = logic::get_progress(&state, LEARNER).await;
    assert_eq!(progress.streak, 3);
    assert_eq!(progress.total_xp, 330);
    assert!((progress.streak_bonus - 0.05).abs() < 1e-9);

    let d4 = day("2024-06-06");
    let plan = logic::generate_plan(&state, LEARNER, d4, false).await.unwrap();
    let out = complete(&state, LEARNER, task_of(&plan, TaskType::Knowledge).id, d4).await;
    assert_eq!(out.completion.base_xp, 30);
    assert_eq!(out.completion.awarded_xp, 31);
    assert_eq!(out.completion.bonus, 1);

    let log = logic::list_xp_log(&state, LEARNER).await;
    assert_eq!(log.len(), 16);
    assert_eq!(log[0].amount, 31);
    assert_eq!(log[0].date, d4);
    assert_eq!(log[0].reason, "Completed: Task know");
}

#[tokio::test]
async fn test_completed_plan_keeps_latch_under_max_bonus() {
    let state = state();
    for n in 1..=15 {
        complete_day(&state, LEARNER, day(&format!("2024-06-{:02}", n))).await;
    }
    assert_eq!(logic::get_progress(&state, LEARNER).await.streak, 15);

    // 25% bonus: the fourth task crosses the 110 target, the fifth lands on a completed plan
    let d16 = day("2024-06-16");
    let awards: Vec<(u32, bool, u32)> = complete_day(&state, LEARNER, d16)
        .await
        .iter()
        .map(|o| (o.completion.awarded_xp, o.completion.day_complete, o.completion.new_streak))
        .collect();
    assert_eq!(
        awards,
        vec![(37, false, 15), (25, false, 15), (25, false, 15), (25, true, 16), (25, false, 16)]
    );

    let plan = logic::get_plan(&state, LEARNER, d16).await.unwrap();
    assert!(plan.plan.is_completed);
    assert_eq!(plan.plan.completed_xp, 137);
    assert_eq!(plan.plan.target_xp, 110);
    let progress = logic::get_progress(&state, LEARNER).await;
    assert_eq!(progress.streak, 16);
    assert_eq!(progress.last_completed_date, Some(d16));
}

#[tokio::test]
async fn test_gap_resets_streak_to_one() {
    let state = state();
    complete_day(&state, LEARNER, day("2024-06-03")).await;
    complete_day(&state, LEARNER, day("2024-06-04")).await;
    assert_eq!(logic::get_progress(&state, LEARNER).await.streak, 2);

    complete_day(&state, LEARNER, day("2024-06-07")).await;
    assert_eq!(logic::get_progress(&state, LEARNER).await.streak, 1);
}

// =============================================================================
// Cycle gate
// =============================================================================

#[tokio::test]
async fn test_gate_blocks_until_thresholds_met() {
    let state = state();
    let report = logic::can_advance_cycle(&state, LEARNER).await;
    assert!(!report.can_advance);
    assert_eq!(report.reasons.len(), 2);

    let err = logic::advance_cycle(&state, LEARNER).await.unwrap_err();
    assert!(matches!(err, EngineError::GateNotSatisfied(ref r) if r.len() == 2));
    assert_eq!(logic::get_progress(&state, LEARNER).await.current_cycle_code, 1);

    for d in ["2024-06-03", "2024-06-04", "2024-06-05"] {
        complete_day(&state, LEARNER, day(d)).await;
    }
    let report = logic::can_advance_cycle(&state, LEARNER).await;
    assert!(report.can_advance, "{:?}", report.reasons);
    assert_eq!(report.completed_plans, 3);
    assert_eq!(report.completed_interviews, 6);

    let before = logic::get_progress(&state, LEARNER).await;
    let out = logic::advance_cycle(&state, LEARNER).await.unwrap();
    assert_eq!((out.previous_cycle_code, out.new_cycle_code), (1, 2));
    let after = logic::get_progress(&state, LEARNER).await;
    assert_eq!(after.current_cycle_code, 2);
    assert_eq!(after.total_xp, before.total_xp);
    assert_eq!(after.streak, before.streak);

    // the new cycle starts with an empty tally
    assert!(!logic::can_advance_cycle(&state, LEARNER).await.can_advance);
    let plan = logic::generate_plan(&state, LEARNER, day("2024-06-06"), false).await.unwrap();
    assert_eq!(plan.plan.cycle_code, 2);

    let cycles = logic::list_cycles(&state, LEARNER).await;
    let statuses: Vec<CycleStatus> = cycles.iter().map(|c| c.status).collect();
    assert_eq!(statuses, vec![CycleStatus::Done, CycleStatus::Current]);
    assert!(cycles[1].gate.is_some());
    assert!(cycles[0].gate.is_none());
}

#[tokio::test]
async fn test_final_cycle_cannot_advance() {
    let state = state();
    for d in ["2024-06-03", "2024-06-04", "2024-06-05"] {
        complete_day(&state, LEARNER, day(d)).await;
    }
    logic::advance_cycle(&state, LEARNER).await.unwrap();
    for d in ["2024-06-06", "2024-06-07", "2024-06-08"] {
        complete_day(&state, LEARNER, day(d)).await;
    }
    let err = logic::advance_cycle(&state, LEARNER).await.unwrap_err();
    assert_eq!(err, EngineError::FinalCycle(2));
    assert_eq!(logic::get_progress(&state, LEARNER).await.current_cycle_code, 2);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_finish_awards_once() {
    let state = Arc::new(state());
    let date = day("2024-06-03");
    let plan = logic::generate_plan(&state, LEARNER, date, false).await.unwrap();
    let task = task_of(&plan, TaskType::DrillPrimary).id;
    let view = logic::start_session(&state, LEARNER, task).await.unwrap();
    logic::submit_answer(&state, LEARNER, view.session_id, Answer::Text("const f = () => 1;".into()))
        .await
        .unwrap();

    let mut set = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let state = state.clone();
        let sid = view.session_id;
        set.spawn(async move { logic::finish_session(&state, LEARNER, sid, date).await });
    }
    let mut ok = 0;
    while let Some(res) = set.join_next().await {
        match res.unwrap() {
            Ok(_) => ok += 1,
            Err(e) => assert!(matches!(e, EngineError::AlreadyCompleted(_))),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(logic::get_progress(&state, LEARNER).await.total_xp, 20);
    assert_eq!(logic::list_xp_log(&state, LEARNER).await.len(), 1);
}
