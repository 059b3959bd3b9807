//! Session construction.
//!
//! Sessions sharing a [`BeanCache`] stay consistent with each other, so an
//! application usually keeps one builder around and stamps out a session per
//! connection.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlbean::prelude::*;
//!
//! let builder = SessionBuilder::new()
//!     .show_sql(true)
//!     .cache(Arc::new(MemoryCache::new(4096)))
//!     .cache_update(CacheUpdateStrategy::Patch);
//!
//! let mut session = builder.build(conn);
//! ```

use std::sync::Arc;

use chrono::FixedOffset;
use sqlbean_core::{BeanCache, Connection};
use sqlbean_session::{CacheUpdateStrategy, Session, SessionConfig};

/// Builder for creating [`Session`] instances with a fluent API.
#[derive(Clone, Default)]
pub struct SessionBuilder {
    config: SessionConfig,
    cache: Option<Arc<dyn BeanCache>>,
}

impl std::fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("config", &self.config)
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

impl SessionBuilder {
    /// Create a new session builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    #[must_use]
    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            config,
            cache: None,
        }
    }

    /// Log every statement at `info`.
    #[must_use]
    pub fn show_sql(mut self, value: bool) -> Self {
        self.config.show_sql = value;
        self
    }

    #[must_use]
    pub fn database_tz(mut self, tz: FixedOffset) -> Self {
        self.config.database_tz = tz;
        self
    }

    #[must_use]
    pub fn local_tz(mut self, tz: FixedOffset) -> Self {
        self.config.local_tz = tz;
        self
    }

    #[must_use]
    pub fn check_version(mut self, value: bool) -> Self {
        self.config.check_version = value;
        self
    }

    /// Share a bean cache with every session this builder creates.
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn BeanCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn cache_update(mut self, strategy: CacheUpdateStrategy) -> Self {
        self.config.cache_update = strategy;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Build a session over `conn`.
    pub fn build<C: Connection>(&self, conn: C) -> Session<C> {
        let session = Session::with_config(conn, self.config.clone());
        match &self.cache {
            Some(cache) => session.with_cache(Arc::clone(cache)),
            None => session,
        }
    }
}
