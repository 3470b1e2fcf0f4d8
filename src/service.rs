//! The filtering orchestrator's event loop.
//!
//! One task owns the engine, the mutation batcher, the retry scheduler and
//! every timer. Inputs (settings changes, mutation records, navigation) arrive
//! over channels and are handled one at a time inside a single `select!`
//! loop, so pending sets are never touched from two places at once.

use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::batcher::MutationBatcher;
use crate::constants::constants;
use crate::engine::{FilterEngine, FilterStats};
use crate::events::EventBus;
use crate::filter::FeatureGate;
use crate::page::{MutationRecord, ObserveScope, Page};
use crate::retry::RetryScheduler;
use crate::settings::{Settings, SettingsProvider};

/// Signals from the host page integration.
#[derive(Debug)]
pub enum PageSignal {
  Mutations(Vec<MutationRecord>),
  /// The page swapped its primary content.
  Navigated,
  Stop,
}

/// Owner-side handle to a running filter service.
#[derive(Debug)]
pub struct FilterHandle {
  tx: mpsc::UnboundedSender<PageSignal>,
  task: Option<JoinHandle<FilterStats>>,
}

impl FilterHandle {
  /// Forward observed insertions. Ignored once the service has stopped.
  pub fn mutations(&self, records: Vec<MutationRecord>) {
    let _ = self.tx.send(PageSignal::Mutations(records));
  }

  pub fn navigated(&self) {
    let _ = self.tx.send(PageSignal::Navigated);
  }

  pub fn is_running(&self) -> bool {
    self.task.as_ref().is_some_and(|t| !t.is_finished())
  }

  /// Tear down observation and timers, returning the final stats.
  ///
  /// Returns `None` if the service was already stopped.
  pub async fn stop(&mut self) -> Option<FilterStats> {
    let task = self.task.take()?;
    let _ = self.tx.send(PageSignal::Stop);
    match task.await {
      Ok(stats) => Some(stats),
      Err(e) => {
        warn!(err = %e, "service: task ended abnormally");
        None
      }
    }
  }
}

/// Service timing, defaulting to the embedded constants.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
  pub gate: FeatureGate,
  pub settings_debounce: Duration,
  pub container_candidates: Vec<String>,
}

impl Default for ServiceOptions {
  fn default() -> Self {
    let c = constants();
    Self {
      gate: FeatureGate::default(),
      settings_debounce: c.settings_debounce(),
      container_candidates: c.container_candidates.clone(),
    }
  }
}

pub struct FilterService<P> {
  engine: FilterEngine<P>,
  batcher: MutationBatcher,
  retry: RetryScheduler,
  settings: watch::Receiver<Settings>,
  settings_open: bool,
  refresh_at: Option<Instant>,
  options: ServiceOptions,
}

/// Start filtering `page` on the current runtime.
pub fn spawn<P>(page: P, settings: &impl SettingsProvider, bus: EventBus, options: ServiceOptions) -> FilterHandle
where
  P: Page + Send + 'static,
{
  let service = FilterService::new(page, settings.subscribe(), bus, options);
  let (tx, rx) = mpsc::unbounded_channel();
  let task = tokio::spawn(service.run(rx));
  FilterHandle { tx, task: Some(task) }
}

impl<P: Page> FilterService<P> {
  pub fn new(page: P, settings: watch::Receiver<Settings>, bus: EventBus, options: ServiceOptions) -> Self {
    Self {
      engine: FilterEngine::new(page, options.gate, bus),
      batcher: MutationBatcher::default(),
      retry: RetryScheduler::default(),
      settings,
      settings_open: true,
      refresh_at: None,
      options,
    }
  }

  fn next_wake(&self) -> Option<Instant> {
    [self.batcher.deadline(), self.retry.deadline(), self.refresh_at].into_iter().flatten().min()
  }

  pub async fn run(mut self, mut signals: mpsc::UnboundedReceiver<PageSignal>) -> FilterStats {
    self.start(Instant::now());

    loop {
      let wake = self.next_wake();
      tokio::select! {
        signal = signals.recv() => match signal {
          Some(PageSignal::Mutations(records)) => {
            let added = self.batcher.record(&records, Instant::now());
            if added > 0 {
              debug!(added, "service: entries queued");
            }
          }
          Some(PageSignal::Navigated) => self.navigated(Instant::now()),
          Some(PageSignal::Stop) | None => break,
        },
        changed = self.settings.changed(), if self.settings_open => match changed {
          // Re-armed on every change so only the settled state gets a pass.
          Ok(()) => self.refresh_at = Some(Instant::now() + self.options.settings_debounce),
          Err(_) => {
            debug!("service: settings provider dropped");
            self.settings_open = false;
          }
        },
        () = sleep_until(wake.unwrap_or_else(Instant::now)), if wake.is_some() => self.on_timers(Instant::now()),
      }
    }

    self.shutdown();
    self.engine.stats()
  }

  fn start(&mut self, now: Instant) {
    let settings = self.settings.borrow_and_update().clone();
    self.engine.configure(&settings);
    self.attach();
    self.full_pass(now);
  }

  /// Observe the narrowest listing container present, else the whole document.
  fn attach(&mut self) {
    let scope = match self.engine.page().find_container(&self.options.container_candidates) {
      Some(selector) => ObserveScope::Container(selector),
      None => {
        warn!("service: no listing container found, observing the whole document");
        ObserveScope::Document
      }
    };
    self.batcher.observe(scope);
  }

  fn full_pass(&mut self, now: Instant) {
    let outcome = self.engine.full_pass(now);
    self.retry.request(outcome.unknown_duration, now);
  }

  fn on_timers(&mut self, now: Instant) {
    if self.refresh_at.is_some_and(|at| at <= now) {
      self.refresh_at = None;
      let settings = self.settings.borrow_and_update().clone();
      self.engine.configure(&settings);
      self.full_pass(now);
    }

    if let Some(slice) = self.batcher.poll(now) {
      debug!(drain = slice.drain, entries = slice.entries.len(), last = slice.last, "service: filtering slice");
      let outcome = self.engine.pass(&slice.entries, now);
      self.retry.request(outcome.unknown_duration, now);
    }

    // Retried entries get exactly one more look; leftovers are not re-queued.
    if let Some(entries) = self.retry.fire(now) {
      self.engine.pass(&entries, now);
    }
  }

  fn navigated(&mut self, now: Instant) {
    info!("service: page navigated, re-filtering");
    self.retry.cancel();
    self.batcher.stop();
    self.engine.reset();
    self.attach();
    self.full_pass(now);
  }

  fn shutdown(&mut self) {
    self.batcher.stop();
    self.retry.cancel();
    self.refresh_at = None;
    let stats = self.engine.stats();
    info!(processed = stats.processed, hidden = stats.hidden, time_saved = stats.time_saved, "service: stopped");
  }
}
