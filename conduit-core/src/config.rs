//! Process-wide configuration.
//!
//! Cells never read this state while running. [`CellOptions::new`] takes a
//! snapshot at construction and the cell keeps it for its lifetime; pipes and
//! joins inherit their parent's snapshot. Tests that want full isolation
//! build cells from [`CellOptions::detached`].
//!
//! [`CellOptions::new`]: crate::reactive::CellOptions::new
//! [`CellOptions::detached`]: crate::reactive::CellOptions::detached

use std::any::{Any, TypeId};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diagnostics::{SlowCall, SlowCallTracker};
use crate::error::Result;
use crate::reactive::{CellValue, Distinction};

/// User-facing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Report transforms and comparators slower than this many milliseconds.
    /// `None` disables slow-call tracking.
    pub slow_call_threshold_ms: Option<u64>,

    /// Emit `warn!` logs for recoverable misuse.
    pub misuse_warnings: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            slow_call_threshold_ms: None,
            misuse_warnings: true,
        }
    }
}

impl Config {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// The installed configuration plus the tracker built from it.
#[derive(Debug, Clone, Default)]
pub(crate) struct ActiveConfig {
    pub(crate) config: Config,
    pub(crate) tracker: Option<Arc<SlowCallTracker>>,
}

static ACTIVE: OnceLock<RwLock<ActiveConfig>> = OnceLock::new();
static DEFAULT_DISTINCTIONS: OnceLock<DashMap<TypeId, Arc<dyn Any + Send + Sync>>> =
    OnceLock::new();

fn get_active() -> &'static RwLock<ActiveConfig> {
    ACTIVE.get_or_init(|| RwLock::new(ActiveConfig::default()))
}

fn get_default_distinctions() -> &'static DashMap<TypeId, Arc<dyn Any + Send + Sync>> {
    DEFAULT_DISTINCTIONS.get_or_init(DashMap::new)
}

/// Install `config` for every cell constructed from now on.
///
/// A fresh [`SlowCallTracker`] is created when a threshold is set; reports of
/// a previously installed tracker are not carried over.
pub fn configure(config: Config) {
    let tracker = config
        .slow_call_threshold_ms
        .map(|ms| Arc::new(SlowCallTracker::new(Duration::from_millis(ms))));
    debug!(?config, "installing configuration");
    *get_active().write() = ActiveConfig { config, tracker };
}

/// Restore the defaults and forget every registered default distinction.
pub fn reset() {
    *get_active().write() = ActiveConfig::default();
    get_default_distinctions().clear();
}

/// The configuration currently installed.
pub fn current() -> Config {
    get_active().read().config.clone()
}

/// Reports recorded by the process-wide tracker, if one is installed.
pub fn slow_call_report() -> Option<Vec<SlowCall>> {
    get_active().read().tracker.as_ref().map(|t| t.reports())
}

pub(crate) fn active() -> ActiveConfig {
    get_active().read().clone()
}

/// Register the distinction strategy that
/// [`ignore_repeats`](crate::reactive::ignore_repeats) uses for `T`.
pub fn set_default_distinction<T: CellValue>(distinction: Distinction<T>) {
    get_default_distinctions().insert(TypeId::of::<T>(), Arc::new(distinction));
}

/// Remove the default distinction strategy for `T`.
pub fn clear_default_distinction<T: CellValue>() {
    get_default_distinctions().remove(&TypeId::of::<T>());
}

pub(crate) fn default_distinction<T: CellValue>() -> Option<Distinction<T>> {
    let entry = get_default_distinctions().get(&TypeId::of::<T>())?;
    entry.value().downcast_ref::<Distinction<T>>().cloned()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = Config::default();
        assert_eq!(config.slow_call_threshold_ms, None);
        assert!(config.misuse_warnings);
    }

    #[test]
    fn config_from_partial_json() {
        let config = Config::from_json(r#"{ "slow_call_threshold_ms": 16 }"#).unwrap();
        assert_eq!(config.slow_call_threshold_ms, Some(16));
        assert!(config.misuse_warnings);
    }

    #[test]
    fn config_from_invalid_json() {
        let err = Config::from_json("{ not json").unwrap_err();
        assert!(err.to_string().starts_with("invalid configuration"));
    }

    #[test]
    fn config_serializes_back() {
        let config = Config {
            slow_call_threshold_ms: Some(4),
            misuse_warnings: false,
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(Config::from_json(&json).unwrap(), config);
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Tagged(u32);

    #[test]
    fn default_distinction_registry() {
        assert!(default_distinction::<Tagged>().is_none());

        set_default_distinction(Distinction::new(
            |a: &Tagged, b: &Tagged| a.0 / 10 == b.0 / 10,
            Tagged::clone,
        ));
        let distinction = default_distinction::<Tagged>().unwrap();
        assert!(distinction.same(&Tagged(11), &Tagged(19)));
        assert!(!distinction.same(&Tagged(11), &Tagged(21)));

        clear_default_distinction::<Tagged>();
        assert!(default_distinction::<Tagged>().is_none());
    }
}
