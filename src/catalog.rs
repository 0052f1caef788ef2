//! Read-only curriculum catalog: cycles, task templates and the sparring bank.
//!
//! Built once at startup from config sections (when present) and the built-in
//! seeds, then shared immutably for the life of the process.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::domain::{CurriculumCycle, SparringQuestion, TaskTemplate, TaskType};
use crate::seeds::{seed_cycles, seed_sparring_bank, seed_templates};

#[derive(Clone, Debug, Default)]
pub struct Catalog {
  cycles: Vec<CurriculumCycle>,
  templates: Vec<TaskTemplate>,
  by_id: HashMap<String, usize>,
  sparring: Vec<SparringQuestion>,
}

impl Catalog {
  pub fn new(
    mut cycles: Vec<CurriculumCycle>,
    templates: Vec<TaskTemplate>,
    sparring: Vec<SparringQuestion>,
  ) -> Self {
    cycles.sort_by_key(|c| c.code);
    cycles.dedup_by_key(|c| c.code);

    let mut kept = Vec::with_capacity(templates.len());
    let mut by_id = HashMap::new();
    for t in templates {
      if t.xp == 0 {
        warn!(target: "kata_backend", id = %t.id, "Skipping template with zero xp");
        continue;
      }
      if by_id.contains_key(&t.id) {
        warn!(target: "kata_backend", id = %t.id, "Skipping duplicate template id");
        continue;
      }
      by_id.insert(t.id.clone(), kept.len());
      kept.push(t);
    }

    Self { cycles, templates: kept, by_id, sparring }
  }

  /// Config sections win when non-empty; the built-in seeds fill the rest.
  pub fn from_config(cfg: Option<&AppConfig>) -> Self {
    let cycles = non_empty(cfg.map(|c| &c.cycles)).unwrap_or_else(seed_cycles);
    let templates = non_empty(cfg.map(|c| &c.templates)).unwrap_or_else(seed_templates);
    let sparring = non_empty(cfg.map(|c| &c.sparring_questions)).unwrap_or_else(seed_sparring_bank);

    let catalog = Self::new(cycles, templates, sparring);

    let mut count_by_type: HashMap<TaskType, usize> = HashMap::new();
    for t in &catalog.templates {
      *count_by_type.entry(t.task_type).or_default() += 1;
    }
    for (task_type, n) in count_by_type {
      info!(target: "kata_backend", task_type = task_type.as_str(), templates = n, "Startup template inventory");
    }
    info!(target: "kata_backend", cycles = catalog.cycles.len(), sparring_questions = catalog.sparring.len(), "Catalog ready");
    catalog
  }

  pub fn cycles(&self) -> &[CurriculumCycle] {
    &self.cycles
  }

  pub fn cycle(&self, code: u32) -> Option<&CurriculumCycle> {
    self.cycles.iter().find(|c| c.code == code)
  }

  pub fn first_cycle_code(&self) -> u32 {
    self.cycles.first().map(|c| c.code).unwrap_or(1)
  }

  pub fn max_cycle_code(&self) -> u32 {
    self.cycles.last().map(|c| c.code).unwrap_or(1)
  }

  pub fn templates(&self) -> &[TaskTemplate] {
    &self.templates
  }

  pub fn template(&self, id: &str) -> Option<&TaskTemplate> {
    self.by_id.get(id).map(|&i| &self.templates[i])
  }

  /// Templates of `task_type`, in catalog order. With `cycle_code`, only those
  /// usable in that cycle.
  pub fn pool(&self, task_type: TaskType, cycle_code: Option<u32>) -> Vec<&TaskTemplate> {
    self
      .templates
      .iter()
      .filter(|t| t.task_type == task_type)
      .filter(|t| cycle_code.map_or(true, |c| t.usable_in(c)))
      .collect()
  }

  pub fn sparring_questions(&self) -> &[SparringQuestion] {
    &self.sparring
  }
}

fn non_empty<T: Clone>(section: Option<&Vec<T>>) -> Option<Vec<T>> {
  section.filter(|v| !v.is_empty()).cloned()
}
