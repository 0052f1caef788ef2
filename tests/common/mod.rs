//! Shared fixtures: a small fixed catalog and helpers that walk a task from
//! start to finish through the public operation surface.

#![allow(dead_code)]

use chrono::NaiveDate;

use kata_backend::catalog::Catalog;
use kata_backend::config::GameConfig;
use kata_backend::domain::{
    CurriculumCycle, DailyTask, LearnerId, SparringQuestion, Step, TaskTemplate, TaskType,
};
use kata_backend::logic;
use kata_backend::protocol::PlanView;
use kata_backend::session::FinishOutcome;
use kata_backend::state::AppState;
use kata_backend::steps::Answer;

pub const LEARNER: LearnerId = 1;

pub fn day(s: &str) -> NaiveDate {
    s.parse().expect("valid date")
}

fn template(id: &str, task_type: TaskType, xp: u32, steps: Vec<Step>) -> TaskTemplate {
    TaskTemplate {
        id: id.into(),
        task_type,
        cycle_code: None,
        title: format!("Task {}", id),
        prompt: format!("Prompt for {}", id),
        xp,
        steps,
    }
}

/// Two cycles; one template per slot plus two interviews. Every plan holds the
/// same five tasks: 30 + 20 + 20 + 20 + 20 = 110 XP.
pub fn catalog() -> Catalog {
    let cycles = vec![
        CurriculumCycle { code: 1, title: "Foundations".into(), topics: vec!["closures".into()] },
        CurriculumCycle { code: 2, title: "Async".into(), topics: vec!["promises".into()] },
    ];
    let templates = vec![
        template(
            "know",
            TaskType::Knowledge,
            30,
            vec![
                Step::Theory { title: "Closures".into(), content: "A closure captures its scope.".into() },
                Step::QuizSingle {
                    title: "Check".into(),
                    question: "What does a closure capture?".into(),
                    options: vec!["Nothing".into(), "Its lexical scope".into(), "The DOM".into()],
                    correct_answer: 1,
                },
            ],
        ),
        template(
            "drill-p",
            TaskType::DrillPrimary,
            20,
            vec![Step::CodeAnswer {
                title: "Arrow".into(),
                prompt: "Write an arrow function".into(),
                required_tokens: vec!["=>".into()],
            }],
        ),
        // no steps: resolves to the theory + free-text fallback
        template("drill-s", TaskType::DrillSecondary, 20, vec![]),
        template(
            "int-a",
            TaskType::Interview,
            20,
            vec![Step::TextAnswer {
                title: "Explain".into(),
                question: "Explain closures".into(),
                min_chars: Some(10),
                keywords: vec!["closure".into()],
            }],
        ),
        template(
            "int-b",
            TaskType::Interview,
            20,
            vec![Step::TextAnswer {
                title: "Explain".into(),
                question: "Explain the event loop".into(),
                min_chars: Some(10),
                keywords: vec![],
            }],
        ),
    ];
    let sparring = vec![
        SparringQuestion {
            id: 1,
            cycle_code: 1,
            category: "Core".into(),
            min_rank_index: 1,
            question: "What is hoisting?".into(),
            key_points: vec!["declarations".into()],
        },
        SparringQuestion {
            id: 2,
            cycle_code: 1,
            category: "Core".into(),
            min_rank_index: 1,
            question: "What is a closure?".into(),
            key_points: vec!["scope".into()],
        },
    ];
    Catalog::new(cycles, templates, sparring)
}

pub fn state() -> AppState {
    AppState::with_parts(catalog(), GameConfig::default())
}

/// An answer that passes `step` under the default rules.
pub fn passing_answer(step: &Step) -> Option<Answer> {
    match step {
        Step::Theory { .. } => None,
        Step::QuizSingle { correct_answer, .. } => Some(Answer::Option(*correct_answer as i64)),
        Step::TextAnswer { keywords, .. } => {
            let lead = keywords.first().cloned().unwrap_or_else(|| "answer".into());
            Some(Answer::Text(format!("{} {}", lead, "explained at length ".repeat(6))))
        }
        Step::CodeAnswer { required_tokens, .. } => {
            let token = required_tokens.first().cloned().unwrap_or_else(|| "=>".into());
            Some(Answer::Text(format!("const f = (x) {} x; // {}", token, token)))
        }
    }
}

/// Start, answer every step and finish one task.
pub async fn complete(state: &AppState, learner: LearnerId, task_id: uuid::Uuid, today: NaiveDate) -> FinishOutcome {
    let mut view = logic::start_session(state, learner, task_id).await.expect("start");
    loop {
        if let Some(answer) = passing_answer(&view.current_step) {
            logic::submit_answer(state, learner, view.session_id, answer).await.expect("answer");
        }
        if view.current_step_index + 1 >= view.total_steps {
            break;
        }
        view = logic::advance_step(state, learner, view.session_id).await.expect("advance");
    }
    logic::finish_session(state, learner, view.session_id, today).await.expect("finish")
}

pub fn task_of(plan: &PlanView, task_type: TaskType) -> &DailyTask {
    plan.tasks.iter().find(|t| t.task_type == task_type).expect("task of type")
}

/// Generate the plan for `date` and complete all of its tasks.
pub async fn complete_day(state: &AppState, learner: LearnerId, date: NaiveDate) -> Vec<FinishOutcome> {
    let plan = logic::generate_plan(state, learner, date, false).await.expect("plan");
    let mut out = Vec::new();
    for task in &plan.tasks {
        out.push(complete(state, learner, task.id, date).await);
    }
    out
}
