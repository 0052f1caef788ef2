//! Small utility helpers used across modules.

use chrono::{Local, NaiveDate};
use sha2::{Digest, Sha256};

use crate::error::{EngineError, EngineResult};

/// Stable 64-bit hash of a string key: the first 8 bytes of its SHA-256,
/// big-endian. Identical on every run and platform.
pub fn stable_hash(key: &str) -> u64 {
  let digest = Sha256::digest(key.as_bytes());
  let mut bytes = [0u8; 8];
  bytes.copy_from_slice(&digest[..8]);
  u64::from_be_bytes(bytes)
}

/// Reduce a slot key to an index into a pool of `len` items.
pub fn slot_index(key: &str, len: usize) -> usize {
  debug_assert!(len > 0);
  (stable_hash(key) % len as u64) as usize
}

/// The learner's calendar day.
pub fn today() -> NaiveDate {
  Local::now().date_naive()
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> EngineResult<NaiveDate> {
  NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
    .map_err(|e| EngineError::BadRequest(format!("invalid date '{}': {}", s, e)))
}

/// Whole calendar days from `earlier` to `later`.
pub fn days_between(earlier: NaiveDate, later: NaiveDate) -> i64 {
  (later - earlier).num_days()
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with learner answers.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} chars total)", head, s.chars().count())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hash_is_stable_and_key_sensitive() {
    assert_eq!(stable_hash("2024-01-01-KNOWLEDGE-1"), stable_hash("2024-01-01-KNOWLEDGE-1"));
    assert_ne!(stable_hash("2024-01-01-KNOWLEDGE-1"), stable_hash("2024-01-01-KNOWLEDGE-2"));
  }

  #[test]
  fn slot_index_stays_in_range() {
    for n in 1..20 {
      assert!(slot_index(&format!("key-{}", n), n) < n);
    }
  }

  #[test]
  fn dates_parse_and_diff() {
    let a = parse_date("2024-02-28").unwrap();
    let b = parse_date("2024-03-01").unwrap();
    assert_eq!(days_between(a, b), 2);
    assert!(matches!(parse_date("yesterday"), Err(EngineError::BadRequest(_))));
  }

  #[test]
  fn truncation_respects_char_boundaries() {
    assert_eq!(trunc_for_log("short", 10), "short");
    assert!(trunc_for_log("привет мир", 3).starts_with("при…"));
  }
}
