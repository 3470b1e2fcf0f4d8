use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use vidsift::config::Config;
use vidsift::harness::{ReplayOptions, replay};
use vidsift::metadata::parse_duration;
use vidsift::report::{render_json, render_table};
use vidsift::sim::PageFixture;

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Cli {
  /// Log to stderr instead of the daily log file
  #[arg(long, global = true)]
  log_stderr: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Replay a page fixture through the filter and report what stays visible
  Run {
    /// JSON page fixture
    fixture: PathBuf,

    #[command(flatten)]
    criteria: CriteriaArgs,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Persist the resulting preferences to prefs.toml
    #[arg(long)]
    save: bool,

    /// Quiet time after the last fixture step, in milliseconds
    #[arg(long, default_value_t = 2500)]
    settle_ms: u64,
  },
  /// Print shell completions
  Completions { shell: Shell },
}

/// Overrides on top of the saved preferences.
#[derive(Args, Debug, Default)]
struct CriteriaArgs {
  /// Minimum length, as seconds or M:SS / H:MM:SS
  #[arg(long, value_parser = parse_length)]
  min: Option<u32>,
  /// Maximum length, as seconds or M:SS / H:MM:SS
  #[arg(long, value_parser = parse_length)]
  max: Option<u32>,
  /// Title keyword; any one must match (repeatable)
  #[arg(long = "keyword")]
  keywords: Vec<String>,
  /// Channel name fragment to keep (repeatable)
  #[arg(long = "channel")]
  channels: Vec<String>,
  /// Channel name fragment to hide (repeatable)
  #[arg(long = "exclude-channel")]
  exclude_channels: Vec<String>,
  /// Only keep uploads on or after this date (YYYY-MM-DD)
  #[arg(long, value_parser = parse_date)]
  after: Option<DateTime<Utc>>,
  #[arg(long)]
  min_views: Option<u64>,
  #[arg(long)]
  max_views: Option<u64>,
  /// Turn filtering off; every entry is shown
  #[arg(long)]
  disabled: bool,
  /// Enable the keyword, channel, date and view filters
  #[arg(long)]
  advanced: bool,
}

fn parse_length(s: &str) -> Result<u32, String> {
  let seconds = parse_duration(s);
  if seconds == 0 && !s.trim().chars().all(|c| c == '0' || c == ':') {
    return Err(format!("invalid length '{s}', expected seconds or M:SS"));
  }
  Ok(seconds)
}

fn parse_date(s: &str) -> Result<DateTime<Utc>, String> {
  let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("invalid date '{s}': {e}"))?;
  Ok(date.and_time(chrono::NaiveTime::MIN).and_utc())
}

impl CriteriaArgs {
  fn apply(self, config: &mut Config) {
    let c = &mut config.criteria;
    if self.min.is_some() {
      c.min_duration = self.min;
    }
    if self.max.is_some() {
      c.max_duration = self.max;
    }
    if !self.keywords.is_empty() {
      c.keywords = self.keywords;
    }
    if !self.channels.is_empty() {
      c.channels = self.channels;
    }
    if !self.exclude_channels.is_empty() {
      c.exclude_channels = self.exclude_channels;
    }
    if self.after.is_some() {
      c.uploaded_after = self.after;
    }
    if self.min_views.is_some() {
      c.min_views = self.min_views;
    }
    if self.max_views.is_some() {
      c.max_views = self.max_views;
    }
    if self.disabled {
      config.enabled = false;
    }
    if self.advanced {
      config.advanced_filters = true;
    }
  }
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  match cli.command {
    Command::Completions { shell } => {
      clap_complete::generate(shell, &mut Cli::command(), "vidsift", &mut std::io::stdout());
      Ok(())
    }
    Command::Run { fixture, criteria, json, save, settle_ms } => {
      let _guard = vidsift::logging::init(cli.log_stderr)?;
      run(fixture, criteria, json, save, Duration::from_millis(settle_ms)).await
    }
  }
}

async fn run(fixture_path: PathBuf, criteria: CriteriaArgs, json: bool, save: bool, settle: Duration) -> Result<()> {
  let mut config = Config::load();
  criteria.apply(&mut config);
  if save {
    let path = config.save()?;
    info!(path = %path.display(), "preferences saved");
  }

  let fixture = PageFixture::load(&fixture_path)?;
  let options = ReplayOptions { settings: config.settings(), gate: config.gate(), settle };
  let report = replay(&fixture, options).await.context("Replay failed")?;

  let output = if json {
    render_json(&report.rows, &report.stats, report.passes).context("Failed to encode report")?
  } else {
    render_table(&report.rows, &report.stats, report.passes)
  };
  println!("{output}");
  Ok(())
}
