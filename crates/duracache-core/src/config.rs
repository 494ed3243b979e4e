//! Process/instance-level configuration recognized by the cache engine

use crate::Clock;
use std::sync::Arc;

/// How a returned timestamp's time zone should be framed for the caller.
///
/// This does not change the instant in time a timestamp represents, only
/// how it is labeled when handed back across the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTimeKind {
    /// Frame timestamps as UTC (the default).
    Utc,
    /// Frame timestamps as local time.
    Local,
}

/// Configuration options recognized by a cache instance.
#[derive(Clone)]
pub struct CacheConfig {
    /// Informational application name, surfaced in tracing spans. Does not
    /// drive any default path resolution (the caller supplies paths).
    pub application_name: Option<String>,
    /// Coerces the framing of timestamps returned to the caller.
    /// `None` means "unset", which behaves like `Some(DateTimeKind::Utc)`.
    pub forced_date_time_kind: Option<DateTimeKind>,
    /// Clock used for `created_at` stamps and expiration comparisons.
    pub scheduler: Arc<dyn Clock>,
}

impl std::fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheConfig")
            .field("application_name", &self.application_name)
            .field("forced_date_time_kind", &self.forced_date_time_kind)
            .finish_non_exhaustive()
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            application_name: None,
            forced_date_time_kind: None,
            scheduler: Arc::new(crate::SystemClock),
        }
    }
}

impl CacheConfig {
    /// Create config carrying an application name.
    pub fn with_application_name(name: impl Into<String>) -> Self {
        Self {
            application_name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Force timestamps returned to the caller to a specific kind.
    pub fn forcing_date_time_kind(mut self, kind: DateTimeKind) -> Self {
        self.forced_date_time_kind = Some(kind);
        self
    }

    /// Override the clock (tests inject a fixed clock here).
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Clock>) -> Self {
        self.scheduler = scheduler;
        self
    }
}
