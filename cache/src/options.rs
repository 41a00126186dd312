use crate::policy::Strategy;

use std::collections::BTreeSet;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum TtlChoice {
  #[default]
  Default,
  Never,
  For(Duration),
}

/// Per-call overrides for `Cache::set_with`.
///
/// ```
/// use skein_cache::{SetOptions, Strategy};
/// use std::time::Duration;
///
/// let opts = SetOptions::new()
///   .ttl(Duration::from_secs(30))
///   .tag("user:42")
///   .compress(true)
///   .strategy(Strategy::Lfu);
/// # let _ = opts;
/// ```
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
  pub(crate) ttl: TtlChoice,
  pub(crate) tags: BTreeSet<String>,
  pub(crate) compress: Option<bool>,
  pub(crate) encrypt: Option<bool>,
  pub(crate) strategy: Option<Strategy>,
}

impl SetOptions {
  pub fn new() -> Self {
    Self::default()
  }

  /// Overrides the cache's default TTL. A zero duration never expires.
  pub fn ttl(mut self, ttl: Duration) -> Self {
    self.ttl = if ttl.is_zero() {
      TtlChoice::Never
    } else {
      TtlChoice::For(ttl)
    };
    self
  }

  /// Stores the entry without any TTL.
  pub fn no_ttl(mut self) -> Self {
    self.ttl = TtlChoice::Never;
    self
  }

  pub fn tag(mut self, tag: impl Into<String>) -> Self {
    self.tags.insert(tag.into());
    self
  }

  pub fn tags<I, T>(mut self, tags: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: Into<String>,
  {
    self.tags.extend(tags.into_iter().map(Into::into));
    self
  }

  pub fn compress(mut self, enabled: bool) -> Self {
    self.compress = Some(enabled);
    self
  }

  pub fn encrypt(mut self, enabled: bool) -> Self {
    self.encrypt = Some(enabled);
    self
  }

  /// Evicts by `strategy` if this write needs room, instead of the cache's
  /// configured strategy.
  pub fn strategy(mut self, strategy: Strategy) -> Self {
    self.strategy = Some(strategy);
    self
  }
}

/// Per-call options for `Cache::get_with`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetOptions {
  pub(crate) refresh_access: bool,
}

impl Default for GetOptions {
  fn default() -> Self {
    Self {
      refresh_access: true,
    }
  }
}

impl GetOptions {
  pub fn new() -> Self {
    Self::default()
  }

  /// Reads without updating the entry's access time or count, so the read
  /// does not influence eviction order. Statistics are still recorded.
  pub fn peek() -> Self {
    Self {
      refresh_access: false,
    }
  }

  pub fn refresh_access(mut self, refresh: bool) -> Self {
    self.refresh_access = refresh;
    self
  }
}
