//! Filtering constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` so it's always available,
//! no runtime file I/O. Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;

/// All tuneable filtering constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // Mutation batcher
  pub batch_debounce_ms: u64,
  pub batch_slice_size: usize,
  pub batch_slice_yield_ms: u64,

  // Orchestrator
  pub settings_debounce_ms: u64,
  pub retry_delay_ms: u64,

  // Metadata cache
  pub cache_ttl_secs: u64,
  pub duration_cache_max: usize,

  pub container_candidates: Vec<String>,
}

impl Constants {
  pub fn batch_debounce(&self) -> Duration {
    Duration::from_millis(self.batch_debounce_ms)
  }

  pub fn batch_slice_yield(&self) -> Duration {
    Duration::from_millis(self.batch_slice_yield_ms)
  }

  pub fn settings_debounce(&self) -> Duration {
    Duration::from_millis(self.settings_debounce_ms)
  }

  pub fn retry_delay(&self) -> Duration {
    Duration::from_millis(self.retry_delay_ms)
  }

  pub fn cache_ttl(&self) -> Duration {
    Duration::from_secs(self.cache_ttl_secs)
  }
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed filtering constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn embedded_constants_parse() {
    let c = constants();
    assert_eq!(c.batch_slice_size, 10);
    assert_eq!(c.retry_delay(), Duration::from_secs(2));
    assert_eq!(c.cache_ttl(), Duration::from_secs(300));
    assert_eq!(c.duration_cache_max, 1000);
    assert_eq!(c.settings_debounce(), Duration::from_millis(100));
    assert!(!c.container_candidates.is_empty());
  }
}
