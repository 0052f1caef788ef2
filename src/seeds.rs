//! Built-in curriculum: cycles, a task template pool and a sparring bank that
//! guarantee the app is usable without an external catalog.

use crate::domain::{CurriculumCycle, SparringQuestion, Step, TaskTemplate, TaskType};

const KNOWLEDGE_XP: u32 = 30;
const DRILL_XP: u32 = 20;
const INTERVIEW_XP: u32 = 20;

pub fn seed_cycles() -> Vec<CurriculumCycle> {
  let raw: [(&str, [&str; 3]); 11] = [
    ("Language core", ["scope and closures", "hoisting", "this binding"]),
    ("Types and coercion", ["primitive types", "equality", "type coercion"]),
    ("Objects and prototypes", ["prototype chain", "classes", "property descriptors"]),
    ("Functions in depth", ["higher-order functions", "currying", "pure functions"]),
    ("Asynchrony", ["event loop", "promises", "async/await"]),
    ("Static typing", ["structural typing", "generics", "narrowing"]),
    ("Advanced types", ["conditional types", "mapped types", "inference"]),
    ("Browser platform", ["DOM events", "rendering pipeline", "storage"]),
    ("Networking", ["HTTP caching", "CORS", "fetch"]),
    ("Architecture", ["modules", "state management", "testing"]),
    ("Final review", ["system design", "performance", "security"]),
  ];
  raw
    .iter()
    .enumerate()
    .map(|(i, (title, topics))| CurriculumCycle {
      code: i as u32 + 1,
      title: title.to_string(),
      topics: topics.iter().map(|t| t.to_string()).collect(),
    })
    .collect()
}

/// One knowledge template per cycle, three interview templates per cycle (one
/// per topic) and two cycle-independent drill pools. Generated entries carry no
/// steps and use the two-step fallback.
pub fn seed_templates() -> Vec<TaskTemplate> {
  let mut out = vec![closures_knowledge()];

  for cycle in seed_cycles() {
    if cycle.code != 1 {
      out.push(TaskTemplate {
        id: format!("knowledge-c{}", cycle.code),
        task_type: TaskType::Knowledge,
        cycle_code: Some(cycle.code),
        title: format!("{}: key ideas", cycle.title),
        prompt: format!("Study the key ideas of '{}': {}.", cycle.title, cycle.topics.join(", ")),
        xp: KNOWLEDGE_XP,
        steps: vec![],
      });
    }
    for (n, topic) in cycle.topics.iter().enumerate() {
      out.push(TaskTemplate {
        id: format!("interview-c{}-{}", cycle.code, n + 1),
        task_type: TaskType::Interview,
        cycle_code: Some(cycle.code),
        title: format!("Interview: {}", topic),
        prompt: format!("Explain {} as you would to an interviewer, with an example.", topic),
        xp: INTERVIEW_XP,
        steps: vec![],
      });
    }
  }

  out.extend(drills(
    TaskType::DrillPrimary,
    "js",
    &[
      ("Debounce", "Implement debounce(fn, ms).", "setTimeout"),
      ("Deep clone", "Implement deepClone(value) for plain objects and arrays.", "return"),
      ("Array flat", "Implement flat(arr, depth) without Array.prototype.flat.", "return"),
    ],
  ));
  out.extend(drills(
    TaskType::DrillSecondary,
    "ts",
    &[
      ("Typed pick", "Write a generic pick<T, K extends keyof T>(obj, keys).", "keyof"),
      ("Result type", "Model a Result<T, E> union and a helper to unwrap it.", "type"),
      ("Readonly deep", "Write a DeepReadonly<T> mapped type.", "readonly"),
    ],
  ));
  out
}

fn closures_knowledge() -> TaskTemplate {
  TaskTemplate {
    id: "knowledge-c1".into(),
    task_type: TaskType::Knowledge,
    cycle_code: Some(1),
    title: "Closures".into(),
    prompt: "Understand how functions capture their lexical environment.".into(),
    xp: KNOWLEDGE_XP,
    steps: vec![
      Step::Theory {
        title: "What a closure is".into(),
        content: "A closure is a function together with the variables of the scope it was created in.".into(),
      },
      Step::QuizSingle {
        title: "Check".into(),
        question: "What does a closure capture?".into(),
        options: vec![
          "A copy of the global object".into(),
          "Bindings of its lexical scope".into(),
          "Only its arguments".into(),
        ],
        correct_answer: 1,
      },
      Step::TextAnswer {
        title: "In your own words".into(),
        question: "Describe a practical use of closures.".into(),
        min_chars: Some(60),
        keywords: vec!["scope".into(), "private".into(), "counter".into()],
      },
    ],
  }
}

fn drills(task_type: TaskType, tag: &str, items: &[(&str, &str, &str)]) -> Vec<TaskTemplate> {
  items
    .iter()
    .enumerate()
    .map(|(n, (title, prompt, token))| TaskTemplate {
      id: format!("drill-{}-{}", tag, n + 1),
      task_type,
      cycle_code: None,
      title: title.to_string(),
      prompt: prompt.to_string(),
      xp: DRILL_XP,
      steps: vec![
        Step::Theory { title: "Task".into(), content: prompt.to_string() },
        Step::CodeAnswer {
          title: "Solution".into(),
          prompt: prompt.to_string(),
          required_tokens: vec![token.to_string()],
        },
      ],
    })
    .collect()
}

pub fn seed_sparring_bank() -> Vec<SparringQuestion> {
  let raw: [(u32, u32, &str, u32, &str, &[&str]); 8] = [
    (1, 1, "Core", 1, "What is a closure and when would you use one?", &["lexical scope", "data privacy"]),
    (2, 1, "Core", 2, "How is `this` determined for a regular function call?", &["call site", "strict mode"]),
    (3, 1, "Core", 1, "Explain hoisting of var, let and function declarations.", &["TDZ", "declarations"]),
    (4, 2, "Core", 1, "When does == differ from ===?", &["coercion", "null/undefined"]),
    (5, 2, "Core", 3, "How does ToPrimitive work for objects?", &["valueOf", "toString"]),
    (6, 5, "Async", 1, "Describe the event loop and microtask queue.", &["call stack", "microtasks"]),
    (7, 5, "Async", 4, "What happens to an unhandled promise rejection?", &["unhandledrejection"]),
    (8, 6, "Types", 2, "What is structural typing?", &["shape", "compatibility"]),
  ];
  raw
    .iter()
    .map(|(id, cycle, category, min_rank, q, keys)| SparringQuestion {
      id: *id,
      cycle_code: *cycle,
      category: category.to_string(),
      min_rank_index: *min_rank,
      question: q.to_string(),
      key_points: keys.iter().map(|k| k.to_string()).collect(),
    })
    .collect()
}
