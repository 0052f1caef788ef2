//! Loading game rules and an optional curriculum catalog from TOML.
//!
//! See `AppConfig` and `GameConfig` for the expected schema. Every field has a
//! default, so an empty file (or no file at all) yields the stock rules.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{CurriculumCycle, SparringQuestion, TaskTemplate};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub game: GameConfig,
  /// Replaces the built-in cycles when non-empty.
  #[serde(default)]
  pub cycles: Vec<CurriculumCycle>,
  /// Replaces the built-in template pool when non-empty.
  #[serde(default)]
  pub templates: Vec<TaskTemplate>,
  /// Replaces the built-in sparring bank when non-empty.
  #[serde(default)]
  pub sparring_questions: Vec<SparringQuestion>,
}

/// Progression rules. Defaults match the stock curriculum.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GameConfig {
  pub default_target_xp: u32,
  pub rank_xp_step: u64,
  pub streak_bonus_per_3_days: f64,
  pub max_streak_bonus: f64,
  pub ranks: Vec<String>,
  pub min_text_answer_chars: usize,
  pub code_answer_tokens: Vec<String>,
  pub mock_timer_minutes: u32,
  pub cycle_advancement: CycleAdvancement,
  pub sparring: SparringRules,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CycleAdvancement {
  pub min_daily_plans: usize,
  pub min_interviews: usize,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SparringRules {
  pub pass_score: f32,
  pub points_per_rank: u64,
  pub max_rank_index: u32,
  pub min_answer_chars: usize,
}

impl Default for GameConfig {
  fn default() -> Self {
    Self {
      default_target_xp: 100,
      rank_xp_step: 500,
      streak_bonus_per_3_days: 0.05,
      max_streak_bonus: 0.25,
      ranks: [
        "Mizunoto", "Mizunoe", "Kanoto", "Kanoe", "Tsuchinoto", "Tsuchinoe",
        "Hinoto", "Hinoe", "Kinoto", "Kinoe", "Hashira",
      ]
      .iter()
      .map(|r| r.to_string())
      .collect(),
      min_text_answer_chars: 80,
      code_answer_tokens: ["function", "=>", "return", "const", "let"]
        .iter()
        .map(|t| t.to_string())
        .collect(),
      mock_timer_minutes: 20,
      cycle_advancement: CycleAdvancement::default(),
      sparring: SparringRules::default(),
    }
  }
}

impl Default for CycleAdvancement {
  fn default() -> Self {
    Self { min_daily_plans: 3, min_interviews: 6 }
  }
}

impl Default for SparringRules {
  fn default() -> Self {
    Self { pass_score: 7.5, points_per_rank: 1000, max_rank_index: 11, min_answer_chars: 40 }
  }
}

impl GameConfig {
  /// Streak bonus increments in basis points, so awards are exact integer math.
  pub fn bonus_step_bp(&self) -> u64 {
    to_basis_points(self.streak_bonus_per_3_days)
  }

  pub fn max_bonus_bp(&self) -> u64 {
    to_basis_points(self.max_streak_bonus)
  }
}

fn to_basis_points(fraction: f64) -> u64 {
  if fraction.is_finite() && fraction > 0.0 {
    (fraction * 10_000.0).round() as u64
  } else {
    0
  }
}

pub fn parse_app_config(s: &str) -> Result<AppConfig, toml::de::Error> {
  toml::from_str::<AppConfig>(s)
}

/// Read and parse a config file. On any IO/parse error, logs and returns None.
pub fn load_app_config(path: &str) -> Option<AppConfig> {
  match std::fs::read_to_string(path) {
    Ok(s) => match parse_app_config(&s) {
      Ok(cfg) => {
        info!(target: "kata_backend", %path, cycles = cfg.cycles.len(), templates = cfg.templates.len(), "Loaded config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "kata_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "kata_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

/// Attempt to load `AppConfig` from KATA_CONFIG_PATH.
pub fn load_app_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("KATA_CONFIG_PATH").ok()?;
  load_app_config(&path)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Step, TaskType};

  #[test]
  fn empty_file_yields_stock_rules() {
    let cfg = parse_app_config("").unwrap();
    assert_eq!(cfg.game.default_target_xp, 100);
    assert_eq!(cfg.game.rank_xp_step, 500);
    assert_eq!(cfg.game.ranks.len(), 11);
    assert_eq!(cfg.game.cycle_advancement.min_daily_plans, 3);
    assert_eq!(cfg.game.cycle_advancement.min_interviews, 6);
    assert_eq!(cfg.game.bonus_step_bp(), 500);
    assert_eq!(cfg.game.max_bonus_bp(), 2_500);
    assert!(cfg.templates.is_empty());
  }

  #[test]
  fn partial_game_section_keeps_other_defaults() {
    let cfg = parse_app_config(
      r#"
[game]
default_target_xp = 150

[game.cycle_advancement]
min_interviews = 2
"#,
    )
    .unwrap();
    assert_eq!(cfg.game.default_target_xp, 150);
    assert_eq!(cfg.game.cycle_advancement.min_interviews, 2);
    assert_eq!(cfg.game.cycle_advancement.min_daily_plans, 3);
    assert_eq!(cfg.game.sparring.pass_score, 7.5);
  }

  #[test]
  fn catalog_sections_parse_tagged_steps() {
    let cfg = parse_app_config(
      r#"
[[cycles]]
code = 1
title = "Basics"
topics = ["scope"]

[[templates]]
id = "k1"
type = "KNOWLEDGE"
cycleCode = 1
title = "Scope"
prompt = "Explain scope"
xp = 30

[[templates.steps]]
type = "theory"
title = "Read"
content = "Scope is..."

[[templates.steps]]
type = "quiz_single"
title = "Check"
question = "Which keyword is block scoped?"
options = ["var", "let"]
correctAnswer = 1

[[templates]]
id = "d1"
type = "DRILL_JS"
title = "Map"
prompt = "Implement map"
xp = 20
"#,
    )
    .unwrap();
    assert_eq!(cfg.cycles[0].topics, vec!["scope".to_string()]);
    let k1 = &cfg.templates[0];
    assert_eq!(k1.cycle_code, Some(1));
    assert_eq!(k1.steps.len(), 2);
    assert!(matches!(k1.steps[1], Step::QuizSingle { correct_answer: 1, .. }));
    assert_eq!(cfg.templates[1].task_type, TaskType::DrillPrimary);
    assert_eq!(cfg.templates[1].cycle_code, None);
  }

  #[test]
  fn missing_file_is_none() {
    assert!(load_app_config("/definitely/not/here.toml").is_none());
  }

  #[test]
  fn loads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kata.toml");
    std::fs::write(&path, "[game]\nrank_xp_step = 250\n").unwrap();
    let cfg = load_app_config(path.to_str().unwrap()).unwrap();
    assert_eq!(cfg.game.rank_xp_step, 250);
  }
}
