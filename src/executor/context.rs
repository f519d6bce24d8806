// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Query Context
//!
//! Per-execution state shared read-mostly by every cursor of one plan:
//! start time, cancellation flag, timeout budget, session id, the storage
//! adapter, a warning sink and the statistics handle.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::core::{Error, Result, Schema};
use crate::storage::StoreAdapter;

use super::config::ExecConfig;
use super::stats::ExecStats;

/// Execution context for one run of a plan
pub struct QueryContext {
    store: Arc<dyn StoreAdapter>,
    config: ExecConfig,
    session_id: u64,
    start: Instant,
    /// Cancellation flag
    cancelled: Arc<AtomicBool>,
    warnings: Mutex<Vec<String>>,
    stats: Option<Arc<ExecStats>>,
}

impl QueryContext {
    /// Context with default configuration
    pub fn new(store: Arc<dyn StoreAdapter>) -> Self {
        QueryContextBuilder::new(store).build()
    }

    pub fn builder(store: Arc<dyn StoreAdapter>) -> QueryContextBuilder {
        QueryContextBuilder::new(store)
    }

    #[inline]
    pub fn store(&self) -> &Arc<dyn StoreAdapter> {
        &self.store
    }

    #[inline]
    pub fn schema(&self) -> &Arc<Schema> {
        self.store.schema()
    }

    #[inline]
    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Time since the context was created
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get the query timeout in milliseconds (0 = no timeout)
    pub fn timeout_ms(&self) -> u64 {
        self.config.timeout_ms
    }

    /// Check if the query has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Cancel the query
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Get a cancellation handle that can be used from another thread
    pub fn cancellation_handle(&self) -> CancellationHandle {
        CancellationHandle {
            cancelled: self.cancelled.clone(),
        }
    }

    /// Fail with `QueryCancelled` or `QueryTimeout` if execution must stop
    ///
    /// Called by the cursor lifecycle wrapper before every `open`, `next`
    /// and `jump`.
    pub fn check_query_cancelation(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::QueryCancelled);
        }
        let limit_ms = self.config.timeout_ms;
        if limit_ms > 0 {
            let elapsed_ms = self.start.elapsed().as_millis() as u64;
            if elapsed_ms > limit_ms {
                return Err(Error::QueryTimeout {
                    elapsed_ms,
                    limit_ms,
                });
            }
        }
        Ok(())
    }

    /// Record a non-fatal warning
    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(session = self.session_id, "{}", message);
        self.warnings.lock().push(message);
    }

    /// Warnings recorded so far
    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().clone()
    }

    /// Statistics handle, present when the config enables collection
    #[inline]
    pub fn stats(&self) -> Option<&Arc<ExecStats>> {
        self.stats.as_ref()
    }
}

impl fmt::Debug for QueryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryContext")
            .field("session_id", &self.session_id)
            .field("config", &self.config)
            .field("cancelled", &self.is_cancelled())
            .field("elapsed", &self.elapsed())
            .finish()
    }
}

/// A handle for cancelling a running query from another thread
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancellationHandle {
    /// Cancel the query
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Check if the query has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Builder for QueryContext
pub struct QueryContextBuilder {
    store: Arc<dyn StoreAdapter>,
    config: ExecConfig,
    session_id: u64,
}

impl QueryContextBuilder {
    pub fn new(store: Arc<dyn StoreAdapter>) -> Self {
        Self {
            store,
            config: ExecConfig::default(),
            session_id: 0,
        }
    }

    pub fn config(mut self, config: ExecConfig) -> Self {
        self.config = config;
        self
    }

    pub fn session_id(mut self, session_id: u64) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.timeout_ms = timeout_ms;
        self
    }

    pub fn collect_stats(mut self, collect: bool) -> Self {
        self.config.collect_stats = collect;
        self
    }

    /// Build the context; its clock starts now
    pub fn build(self) -> QueryContext {
        let stats = self
            .config
            .collect_stats
            .then(|| Arc::new(ExecStats::new()));
        QueryContext {
            store: self.store,
            config: self.config,
            session_id: self.session_id,
            start: Instant::now(),
            cancelled: Arc::new(AtomicBool::new(false)),
            warnings: Mutex::new(Vec::new()),
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType, SchemaBuilder};
    use crate::storage::MemoryStore;

    fn store() -> Arc<dyn StoreAdapter> {
        let mut builder = SchemaBuilder::new();
        builder
            .add_root_table("g", "t", vec![Column::new("id", DataType::Integer)], &["id"])
            .unwrap();
        Arc::new(MemoryStore::new(builder.build()))
    }

    #[test]
    fn test_cancellation() {
        let ctx = QueryContext::new(store());
        assert!(ctx.check_query_cancelation().is_ok());

        let handle = ctx.cancellation_handle();
        assert!(!handle.is_cancelled());
        handle.cancel();
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.check_query_cancelation(), Err(Error::QueryCancelled));
    }

    #[test]
    fn test_timeout() {
        let ctx = QueryContext::builder(store()).timeout_ms(1).build();
        std::thread::sleep(Duration::from_millis(10));
        match ctx.check_query_cancelation() {
            Err(Error::QueryTimeout { limit_ms, elapsed_ms }) => {
                assert_eq!(limit_ms, 1);
                assert!(elapsed_ms > 1);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_builder() {
        let ctx = QueryContextBuilder::new(store())
            .config(ExecConfig::sequential())
            .session_id(42)
            .collect_stats(true)
            .build();
        assert_eq!(ctx.session_id(), 42);
        assert!(ctx.config().force_sequential_scan);
        assert!(ctx.stats().is_some());
        assert_eq!(ctx.timeout_ms(), 0);
        assert!(ctx.schema().table_by_name("t").is_some());

        assert!(QueryContext::new(store()).stats().is_none());
    }

    #[test]
    fn test_warnings() {
        let ctx = QueryContext::new(store());
        ctx.warn("first");
        ctx.warn(String::from("second"));
        assert_eq!(ctx.warnings(), vec!["first".to_string(), "second".to_string()]);
    }
}
