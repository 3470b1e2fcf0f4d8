//! Settings collaborator boundary and its in-process implementation.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

use crate::filter::FilterCriteria;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub enabled: bool,
  pub criteria: FilterCriteria,
}

impl Default for Settings {
  fn default() -> Self {
    Self { enabled: true, criteria: FilterCriteria::default() }
  }
}

/// Source of the active criteria and enabled flag.
///
/// `subscribe` stands in for an on-change callback: every receiver observes
/// the latest `Settings` after each change.
pub trait SettingsProvider {
  fn filter_criteria(&self) -> FilterCriteria;
  fn is_enabled(&self) -> bool;
  fn subscribe(&self) -> watch::Receiver<Settings>;
}

/// Watch-channel backed settings, one per session.
#[derive(Debug, Clone)]
pub struct SettingsStore {
  tx: Arc<watch::Sender<Settings>>,
}

impl Default for SettingsStore {
  fn default() -> Self {
    Self::new(Settings::default())
  }
}

impl SettingsStore {
  pub fn new(initial: Settings) -> Self {
    let (tx, _) = watch::channel(initial);
    Self { tx: Arc::new(tx) }
  }

  pub fn current(&self) -> Settings {
    self.tx.borrow().clone()
  }

  /// Replace the settings. Subscribers are only woken if something changed.
  pub fn update(&self, settings: Settings) {
    self.tx.send_if_modified(|current| {
      if *current == settings {
        return false;
      }
      *current = settings;
      true
    });
  }

  pub fn set_criteria(&self, criteria: FilterCriteria) {
    self.update(Settings { criteria, ..self.current() });
  }

  pub fn set_enabled(&self, enabled: bool) {
    self.update(Settings { enabled, ..self.current() });
  }
}

impl SettingsProvider for SettingsStore {
  fn filter_criteria(&self) -> FilterCriteria {
    self.tx.borrow().criteria.clone()
  }

  fn is_enabled(&self) -> bool {
    self.tx.borrow().enabled
  }

  fn subscribe(&self) -> watch::Receiver<Settings> {
    self.tx.subscribe()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_to_enabled_without_criteria() {
    let store = SettingsStore::default();
    assert!(store.is_enabled());
    assert_eq!(store.filter_criteria(), FilterCriteria::default());
  }

  #[test]
  fn unchanged_update_does_not_notify() {
    let store = SettingsStore::default();
    let rx = store.subscribe();
    store.set_enabled(true);
    assert!(!rx.has_changed().unwrap());
    store.set_enabled(false);
    assert!(rx.has_changed().unwrap());
    assert!(!store.is_enabled());
  }

  #[test]
  fn set_criteria_keeps_enabled_flag() {
    let store = SettingsStore::default();
    store.set_enabled(false);
    store.set_criteria(FilterCriteria { min_duration: Some(60), ..Default::default() });
    let current = store.current();
    assert!(!current.enabled);
    assert_eq!(current.criteria.min_duration, Some(60));
  }
}
