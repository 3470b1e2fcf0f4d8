//! Offline replay of a page fixture through the filter service.
//!
//! The fixture's initial entries are present at start; waves are inserted and
//! late duration renders applied at their offsets, then the service is given
//! `settle` to finish debounces and retries before it is stopped.

use anyhow::{Result, bail};
use futures::future::join;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::engine::FilterStats;
use crate::events::EventBus;
use crate::filter::FeatureGate;
use crate::report::ReportRow;
use crate::service::{ServiceOptions, spawn};
use crate::settings::{Settings, SettingsStore};
use crate::sim::{FixtureEntry, PageFixture, SimulatedPage};

#[derive(Debug, Clone)]
pub struct ReplayOptions {
  pub settings: Settings,
  pub gate: FeatureGate,
  /// Quiet time after the last timeline step.
  pub settle: Duration,
}

impl Default for ReplayOptions {
  fn default() -> Self {
    Self { settings: Settings::default(), gate: FeatureGate::default(), settle: Duration::from_millis(2500) }
  }
}

#[derive(Debug, Clone)]
pub struct ReplayReport {
  pub rows: Vec<ReportRow>,
  pub stats: FilterStats,
  /// `videos-filtered` events observed.
  pub passes: usize,
}

enum Step<'a> {
  Wave(&'a [FixtureEntry]),
  Render { video_id: &'a str, text: &'a str },
  Navigate(&'a [FixtureEntry]),
}

pub async fn replay(fixture: &PageFixture, options: ReplayOptions) -> Result<ReplayReport> {
  let page = SimulatedPage::from_fixture(fixture);
  let store = SettingsStore::new(options.settings.clone());
  let bus = EventBus::default();
  let mut events = bus.subscribe();
  let service_options = ServiceOptions { gate: options.gate, ..Default::default() };
  let mut handle = spawn(page.clone(), &store, bus, service_options);

  let mut timeline: Vec<(u64, Step)> = fixture.waves.iter().map(|w| (w.after_ms, Step::Wave(&w.entries))).collect();
  timeline.extend(
    fixture
      .renders
      .iter()
      .map(|r| (r.after_ms, Step::Render { video_id: &r.video_id, text: &r.duration_text })),
  );
  timeline.extend(fixture.navigations.iter().map(|n| (n.after_ms, Step::Navigate(&n.entries))));
  timeline.sort_by_key(|(at, _)| *at);
  info!(initial = fixture.entries.len(), steps = timeline.len(), "harness: replay started");

  let start = Instant::now();
  let drive = async {
    for (after_ms, step) in timeline {
      sleep_until(start + Duration::from_millis(after_ms)).await;
      match step {
        Step::Wave(entries) => {
          debug!(after_ms, entries = entries.len(), "harness: inserting wave");
          handle.mutations(vec![page.insert_batch(entries)]);
        }
        Step::Render { video_id, text } => {
          let updated = page.render_duration(video_id, text);
          if updated == 0 {
            warn!(video_id, "harness: late render matched no entry");
          }
        }
        Step::Navigate(entries) => {
          debug!(after_ms, entries = entries.len(), "harness: navigating");
          page.replace_content(entries);
          handle.navigated();
        }
      }
    }
    tokio::time::sleep(options.settle).await;
    handle.stop().await
  };

  let collect = async {
    let mut passes = 0usize;
    loop {
      match events.recv().await {
        Ok(_) => passes += 1,
        Err(RecvError::Lagged(skipped)) => {
          warn!(skipped, "harness: event listener lagged");
          passes += skipped as usize;
        }
        Err(RecvError::Closed) => break passes,
      }
    }
  };

  let (stats, passes) = join(drive, collect).await;
  let Some(stats) = stats else {
    bail!("Filter service ended before the replay finished");
  };

  let rows = page.rows().iter().map(|(entry, snapshot, hidden)| ReportRow::new(*entry, snapshot, *hidden)).collect();
  info!(processed = stats.processed, hidden = stats.hidden, passes, "harness: replay finished");
  Ok(ReplayReport { rows, stats, passes })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::filter::FilterCriteria;
  use crate::sim::tests::entry;
  use crate::sim::{FixtureWave, LateRender};

  fn range(min: u32, max: u32) -> Settings {
    Settings {
      enabled: true,
      criteria: FilterCriteria { min_duration: Some(min), max_duration: Some(max), ..Default::default() },
    }
  }

  #[tokio::test(start_paused = true)]
  async fn replays_waves_and_late_renders() {
    let fixture = PageFixture {
      containers: vec!["ytd-rich-grid-renderer #contents".to_string()],
      entries: vec![entry("a", "A", Some("2:00")), entry("b", "B", None)],
      waves: vec![FixtureWave { after_ms: 500, entries: vec![entry("c", "C", Some("10:00")), entry("d", "D", Some("45:00"))] }],
      renders: vec![LateRender { after_ms: 800, video_id: "b".to_string(), duration_text: "0:30".to_string() }],
      ..Default::default()
    };
    let options = ReplayOptions { settings: range(300, 1800), ..Default::default() };
    let report = replay(&fixture, options).await.unwrap();

    let hidden: Vec<&str> = report.rows.iter().filter(|r| r.hidden).map(|r| r.title.as_str()).collect();
    assert_eq!(hidden, vec!["A", "B", "D"]);
    assert_eq!(report.stats, FilterStats { processed: 4, hidden: 3, time_saved: 120 + 30 + 2700 });
    // Initial pass, the wave's batch, and the retry.
    assert_eq!(report.passes, 3);
  }

  #[tokio::test(start_paused = true)]
  async fn navigation_replaces_page_and_stats() {
    let fixture = PageFixture {
      entries: vec![entry("a", "A", Some("2:00"))],
      navigations: vec![FixtureWave { after_ms: 300, entries: vec![entry("n", "N", Some("1:00:00"))] }],
      ..Default::default()
    };
    let report = replay(&fixture, ReplayOptions { settings: range(300, 1800), ..Default::default() }).await.unwrap();
    assert_eq!(report.rows.len(), 1);
    assert!(report.rows[0].hidden);
    assert_eq!(report.stats, FilterStats { processed: 1, hidden: 1, time_saved: 3600 });
    assert_eq!(report.passes, 2);
  }

  #[tokio::test(start_paused = true)]
  async fn disabled_replay_hides_nothing() {
    let fixture = PageFixture { entries: vec![entry("a", "A", Some("2:00"))], ..Default::default() };
    let options = ReplayOptions { settings: Settings { enabled: false, ..range(300, 1800) }, ..Default::default() };
    let report = replay(&fixture, options).await.unwrap();
    assert!(report.rows.iter().all(|r| !r.hidden));
    assert_eq!(report.stats.hidden, 0);
  }
}
