//! Filter criteria and the predicates built from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metadata::Metadata;

/// The active filter bounds and lists. Unset bounds and empty lists are inactive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
  /// Seconds, inclusive.
  pub min_duration: Option<u32>,
  /// Seconds, inclusive.
  pub max_duration: Option<u32>,
  pub keywords: Vec<String>,
  /// Include-list: at least one must appear in the channel name.
  pub channels: Vec<String>,
  pub exclude_channels: Vec<String>,
  pub uploaded_after: Option<DateTime<Utc>>,
  pub min_views: Option<u64>,
  pub max_views: Option<u64>,
}

/// One independent check over a metadata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
  Duration,
  Keyword,
  ChannelInclude,
  ChannelExclude,
  UploadDate,
  ViewCount,
}

fn contains_ci(haystack: &str, needles: &[String]) -> bool {
  let haystack = haystack.to_lowercase();
  needles.iter().any(|n| haystack.contains(&n.to_lowercase()))
}

fn within<T: PartialOrd + Copy>(value: T, min: Option<T>, max: Option<T>) -> bool {
  min.is_none_or(|min| value >= min) && max.is_none_or(|max| value <= max)
}

impl Predicate {
  pub const ALL: [Predicate; 6] = [
    Predicate::Duration,
    Predicate::Keyword,
    Predicate::ChannelInclude,
    Predicate::ChannelExclude,
    Predicate::UploadDate,
    Predicate::ViewCount,
  ];

  pub fn label(self) -> &'static str {
    match self {
      Predicate::Duration => "duration",
      Predicate::Keyword => "keyword",
      Predicate::ChannelInclude => "channel",
      Predicate::ChannelExclude => "exclude-channel",
      Predicate::UploadDate => "upload-date",
      Predicate::ViewCount => "views",
    }
  }

  /// Whether `criteria` sets anything this predicate checks.
  pub fn is_active(self, criteria: &FilterCriteria) -> bool {
    match self {
      Predicate::Duration => criteria.min_duration.is_some() || criteria.max_duration.is_some(),
      Predicate::Keyword => !criteria.keywords.is_empty(),
      Predicate::ChannelInclude => !criteria.channels.is_empty(),
      Predicate::ChannelExclude => !criteria.exclude_channels.is_empty(),
      Predicate::UploadDate => criteria.uploaded_after.is_some(),
      Predicate::ViewCount => criteria.min_views.is_some() || criteria.max_views.is_some(),
    }
  }

  /// Duration is the only check available without advanced filters.
  pub fn is_advanced(self) -> bool {
    self != Predicate::Duration
  }

  /// Unknown values pass: it is better to show an entry than to hide it wrongly.
  pub fn matches(self, criteria: &FilterCriteria, meta: &Metadata) -> bool {
    match self {
      // 0 is unknown/live/not rendered, never "zero length".
      Predicate::Duration => {
        meta.duration == 0 || within(meta.duration, criteria.min_duration, criteria.max_duration)
      }
      Predicate::Keyword => criteria.keywords.is_empty() || contains_ci(&meta.title, &criteria.keywords),
      Predicate::ChannelInclude => {
        criteria.channels.is_empty() || meta.channel.as_deref().is_some_and(|c| contains_ci(c, &criteria.channels))
      }
      Predicate::ChannelExclude => {
        criteria.exclude_channels.is_empty()
          || !meta.channel.as_deref().is_some_and(|c| contains_ci(c, &criteria.exclude_channels))
      }
      Predicate::UploadDate => match (criteria.uploaded_after, meta.upload_date) {
        (Some(after), Some(date)) => date >= after,
        _ => true,
      },
      Predicate::ViewCount => {
        meta.view_count.is_none_or(|views| within(views, criteria.min_views, criteria.max_views))
      }
    }
  }
}

/// Capabilities granted by the host's licensing layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureGate {
  pub advanced_filters: bool,
}

impl FeatureGate {
  pub fn all() -> Self {
    Self { advanced_filters: true }
  }

  pub fn allows(self, predicate: Predicate) -> bool {
    self.advanced_filters || !predicate.is_advanced()
  }
}

/// The active predicates for one set of criteria, all of which must pass.
#[derive(Debug, Clone)]
pub struct CompositeFilter {
  criteria: FilterCriteria,
  active: Vec<Predicate>,
}

impl CompositeFilter {
  pub fn new(criteria: FilterCriteria) -> Self {
    Self::gated(criteria, FeatureGate::all())
  }

  /// Build only the predicates that are both active and permitted by `gate`.
  pub fn gated(criteria: FilterCriteria, gate: FeatureGate) -> Self {
    let active = Predicate::ALL.into_iter().filter(|p| p.is_active(&criteria) && gate.allows(*p)).collect();
    Self { criteria, active }
  }

  pub fn criteria(&self) -> &FilterCriteria {
    &self.criteria
  }

  pub fn active(&self) -> &[Predicate] {
    &self.active
  }

  pub fn is_empty(&self) -> bool {
    self.active.is_empty()
  }

  pub fn matches(&self, meta: &Metadata) -> bool {
    self.active.iter().all(|p| p.matches(&self.criteria, meta))
  }
}
