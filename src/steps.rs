//! Step resolution and per-step pass predicates.

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::domain::{Step, TaskTemplate};

/// A learner submission: either a selected option or free text/code.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Answer {
  Option(i64),
  Text(String),
}

/// The template's own steps, or the two-step fallback (theory echoing the
/// prompt, then a free-text explanation) when it defines none.
pub fn steps_for(template: &TaskTemplate, cfg: &GameConfig) -> Vec<Step> {
  if !template.steps.is_empty() {
    return template.steps.clone();
  }
  fallback_steps(&template.prompt, cfg.min_text_answer_chars)
}

pub fn fallback_steps(prompt: &str, min_chars: usize) -> Vec<Step> {
  vec![
    Step::Theory { title: "Study the material".into(), content: prompt.to_string() },
    Step::TextAnswer {
      title: "Explain in your own words".into(),
      question: format!("Write a short explanation in your own words (at least {} characters)", min_chars),
      min_chars: Some(min_chars),
      keywords: vec![],
    },
  ]
}

/// Check `answer` against the step's predicate. `Err` carries a reason the
/// learner can act on; theory steps always pass.
pub fn validate_answer(step: &Step, answer: &Answer, cfg: &GameConfig) -> Result<(), String> {
  match step {
    Step::Theory { .. } => Ok(()),

    Step::QuizSingle { options, correct_answer, .. } => match answer {
      Answer::Option(choice) => {
        if *choice < 0 || *choice as usize >= options.len() {
          Err(format!("Choose one of the {} options", options.len()))
        } else if *choice as usize == *correct_answer {
          Ok(())
        } else {
          Err("Incorrect, try again".into())
        }
      }
      Answer::Text(t) if t.trim().is_empty() => Err("Answer must not be empty".into()),
      Answer::Text(_) => Err("Select one of the options".into()),
    },

    Step::TextAnswer { min_chars, keywords, .. } => {
      let text = text_of(answer, "Enter a text answer")?;
      let min_chars = min_chars.unwrap_or(cfg.min_text_answer_chars);
      let len = text.chars().count();
      if len < min_chars {
        return Err(format!("At least {} characters required (currently {})", min_chars, len));
      }
      if !keywords.is_empty() {
        let lower = text.to_lowercase();
        if !keywords.iter().any(|k| lower.contains(&k.to_lowercase())) {
          return Err(format!("Answer must mention one of: {}", keywords.join(", ")));
        }
      }
      Ok(())
    }

    Step::CodeAnswer { required_tokens, .. } => {
      let code = text_of(answer, "Enter code")?;
      let tokens = if required_tokens.is_empty() { &cfg.code_answer_tokens } else { required_tokens };
      if !tokens.is_empty() && !tokens.iter().any(|t| code.contains(t.as_str())) {
        return Err(format!("Code must contain one of: {}", tokens.join(", ")));
      }
      Ok(())
    }
  }
}

fn text_of<'a>(answer: &'a Answer, wrong_kind: &str) -> Result<&'a str, String> {
  match answer {
    Answer::Text(t) if t.trim().is_empty() => Err("Answer must not be empty".into()),
    Answer::Text(t) => Ok(t),
    Answer::Option(_) => Err(wrong_kind.to_string()),
  }
}
