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

//! Cursor protocol
//!
//! A [`Cursor`] is the live, single-use iterator an operator produces for
//! one execution. Its lifecycle is
//!
//! ```text
//! Idle --open--> Active --next=None--> Exhausted
//!   ^               |                     |
//!   +----close------+------close----------+
//!         (any non-destroyed state) --destroy--> Destroyed
//! ```
//!
//! Operators implement the crate-private [`CursorImpl`] and are wrapped in
//! a [`ManagedCursor`], which owns the state machine, the cancellation
//! check before every `open`/`next`/`jump`, statistics and logging. No
//! operator can skip those.

use std::fmt;
use std::sync::Arc;

use crate::core::{Error, Result, Row, Value};

use super::context::QueryContext;

/// Lifecycle state of a cursor
///
/// `Exhausted` is the idle state a cursor falls into when `next` runs out
/// of rows: its resources are released (unless kept for `jump`) and it
/// accepts `open` like `Idle`. It differs from `Idle` only in that `next`
/// keeps returning `None` instead of faulting. Use [`CursorState::is_idle`]
/// to test for either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Idle,
    Active,
    Exhausted,
    Destroyed,
}

impl CursorState {
    /// True when the cursor is not iterating and may be opened
    pub fn is_idle(&self) -> bool {
        matches!(self, CursorState::Idle | CursorState::Exhausted)
    }
}

impl fmt::Display for CursorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CursorState::Idle => "IDLE",
            CursorState::Active => "ACTIVE",
            CursorState::Exhausted => "EXHAUSTED",
            CursorState::Destroyed => "DESTROYED",
        };
        f.write_str(name)
    }
}

/// Leading columns of a row that form a jump key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSelector {
    count: usize,
}

impl ColumnSelector {
    /// The first `count` columns
    pub fn leading(count: usize) -> Self {
        Self { count }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Selected values of `row`
    pub fn select<'a>(&self, row: &'a Row) -> &'a [Value] {
        let values = row.values();
        &values[..self.count.min(values.len())]
    }
}

/// The live iterator of one operator in one execution
pub trait Cursor: Send {
    /// Start (or restart) iteration
    fn open(&mut self) -> Result<()>;

    /// Next row, `None` once exhausted
    fn next(&mut self) -> Result<Option<Row>>;

    /// Resume at the first row at or after the key formed by the selected
    /// columns of `row`, in this cursor's scan order
    fn jump(&mut self, row: &Row, columns: &ColumnSelector) -> Result<()>;

    /// Release resources and return to idle. Idempotent.
    fn close(&mut self) -> Result<()>;

    /// Close and make the cursor unusable
    fn destroy(&mut self) -> Result<()>;

    fn state(&self) -> CursorState;

    /// Operator name, for diagnostics
    fn name(&self) -> &'static str;
}

/// Operator-specific half of a cursor
///
/// Implementations may assume the lifecycle is respected: `next` and `jump`
/// are only called between a successful `open` and the following `close`.
pub(crate) trait CursorImpl: Send {
    const NAME: &'static str;

    fn open(&mut self) -> Result<()>;

    fn next(&mut self) -> Result<Option<Row>>;

    fn jump(&mut self, _row: &Row, _columns: &ColumnSelector) -> Result<()> {
        Err(Error::JumpNotSupported(Self::NAME.to_string()))
    }

    /// Release per-iteration resources. Must tolerate repeated calls.
    fn close(&mut self) -> Result<()>;

    /// Release everything, including child cursors
    fn destroy(&mut self) -> Result<()> {
        self.close()
    }

    /// True if the cursor stays positioned after exhaustion so that a
    /// later `jump` can resume it
    fn keeps_open_for_jump(&self) -> bool {
        false
    }
}

/// Lifecycle wrapper around an operator cursor
pub(crate) struct ManagedCursor<C: CursorImpl> {
    inner: C,
    state: CursorState,
    ctx: Arc<QueryContext>,
}

impl<C: CursorImpl> ManagedCursor<C> {
    pub(crate) fn new(inner: C, ctx: &Arc<QueryContext>) -> Self {
        Self {
            inner,
            state: CursorState::Idle,
            ctx: ctx.clone(),
        }
    }

    /// Boxed as a trait object
    pub(crate) fn boxed(inner: C, ctx: &Arc<QueryContext>) -> Box<dyn Cursor>
    where
        C: 'static,
    {
        Box::new(Self::new(inner, ctx))
    }
}

impl<C: CursorImpl> Cursor for ManagedCursor<C> {
    fn open(&mut self) -> Result<()> {
        match self.state {
            CursorState::Idle | CursorState::Exhausted => {}
            state => return Err(Error::lifecycle(C::NAME, "open", state)),
        }
        self.ctx.check_query_cancelation()?;
        // Release whatever an exhausted cursor kept for jump.
        self.inner.close()?;
        if let Err(err) = self.inner.open() {
            let _ = self.inner.close();
            self.state = CursorState::Idle;
            return Err(err);
        }
        self.state = CursorState::Active;
        if let Some(stats) = self.ctx.stats() {
            stats.record_open(C::NAME);
        }
        tracing::debug!(operator = C::NAME, "cursor opened");
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Row>> {
        match self.state {
            CursorState::Active => {}
            CursorState::Exhausted => return Ok(None),
            state => return Err(Error::lifecycle(C::NAME, "next", state)),
        }
        self.ctx.check_query_cancelation()?;
        match self.inner.next()? {
            Some(row) => {
                if let Some(stats) = self.ctx.stats() {
                    stats.record_row(C::NAME);
                }
                Ok(Some(row))
            }
            None => {
                self.state = CursorState::Exhausted;
                if !self.inner.keeps_open_for_jump() {
                    self.inner.close()?;
                }
                tracing::debug!(operator = C::NAME, "cursor exhausted");
                Ok(None)
            }
        }
    }

    fn jump(&mut self, row: &Row, columns: &ColumnSelector) -> Result<()> {
        match self.state {
            CursorState::Active => {}
            CursorState::Exhausted if self.inner.keeps_open_for_jump() => {}
            state => return Err(Error::lifecycle(C::NAME, "jump", state)),
        }
        self.ctx.check_query_cancelation()?;
        self.inner.jump(row, columns)?;
        self.state = CursorState::Active;
        if let Some(stats) = self.ctx.stats() {
            stats.record_jump(C::NAME);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.state == CursorState::Destroyed {
            return Err(Error::lifecycle(C::NAME, "close", self.state));
        }
        self.inner.close()?;
        self.state = CursorState::Idle;
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        if self.state == CursorState::Destroyed {
            return Err(Error::lifecycle(C::NAME, "destroy", self.state));
        }
        self.state = CursorState::Destroyed;
        self.inner.destroy()
    }

    fn state(&self) -> CursorState {
        self.state
    }

    fn name(&self) -> &'static str {
        C::NAME
    }
}

/// Iterator over the rows of an opened cursor
///
/// The cursor is destroyed when the stream is dropped.
pub struct RowStream {
    cursor: Box<dyn Cursor>,
    done: bool,
}

impl RowStream {
    /// Open `cursor` and stream its rows
    pub fn open(mut cursor: Box<dyn Cursor>) -> Result<Self> {
        cursor.open()?;
        Ok(Self {
            cursor,
            done: false,
        })
    }

    /// Drain the remaining rows
    pub fn collect_rows(self) -> Result<Vec<Row>> {
        self.collect()
    }
}

impl Iterator for RowStream {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.cursor.next() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl Drop for RowStream {
    fn drop(&mut self) {
        if self.cursor.state() != CursorState::Destroyed {
            let _ = self.cursor.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType, RowType, SchemaBuilder};
    use crate::executor::config::ExecConfig;
    use crate::storage::{MemoryStore, StoreAdapter};

    struct Counting {
        rt: Arc<RowType>,
        remaining: i64,
        opens: usize,
        closes: usize,
    }

    impl CursorImpl for Counting {
        const NAME: &'static str = "Counting";

        fn open(&mut self) -> Result<()> {
            self.opens += 1;
            self.remaining = 2;
            Ok(())
        }

        fn next(&mut self) -> Result<Option<Row>> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            Row::new(&self.rt, vec![Value::integer(self.remaining)]).map(Some)
        }

        fn close(&mut self) -> Result<()> {
            self.closes += 1;
            Ok(())
        }
    }

    fn context(config: ExecConfig) -> Arc<QueryContext> {
        let mut builder = SchemaBuilder::new();
        builder
            .add_root_table("g", "t", vec![Column::new("id", DataType::Integer)], &["id"])
            .unwrap();
        let store: Arc<dyn StoreAdapter> = Arc::new(MemoryStore::new(builder.build()));
        Arc::new(QueryContext::builder(store).config(config).build())
    }

    fn cursor(ctx: &Arc<QueryContext>) -> ManagedCursor<Counting> {
        let rt = RowType::derived("n", vec![DataType::Integer]);
        ManagedCursor::new(
            Counting {
                rt,
                remaining: 0,
                opens: 0,
                closes: 0,
            },
            ctx,
        )
    }

    #[test]
    fn test_lifecycle_faults() {
        let ctx = context(ExecConfig::default());
        let mut c = cursor(&ctx);
        assert_eq!(c.state(), CursorState::Idle);
        assert!(c.next().unwrap_err().is_lifecycle_fault());

        c.open().unwrap();
        assert!(c.open().unwrap_err().is_lifecycle_fault());
        assert!(c.next().unwrap().is_some());

        c.destroy().unwrap();
        assert!(c.next().unwrap_err().is_lifecycle_fault());
        assert!(c.close().unwrap_err().is_lifecycle_fault());
        assert!(c.destroy().unwrap_err().is_lifecycle_fault());
    }

    #[test]
    fn test_exhaustion_and_reopen() {
        let ctx = context(ExecConfig::instrumented());
        let mut c = cursor(&ctx);
        c.open().unwrap();
        assert!(c.next().unwrap().is_some());
        assert!(c.next().unwrap().is_some());
        assert!(c.next().unwrap().is_none());
        assert_eq!(c.state(), CursorState::Exhausted);
        assert!(c.next().unwrap().is_none());

        // exhausted cursors may be reopened directly
        c.open().unwrap();
        assert_eq!(c.state(), CursorState::Active);
        assert_eq!(c.inner.opens, 2);

        c.close().unwrap();
        c.close().unwrap();
        assert_eq!(c.state(), CursorState::Idle);

        let stats = ctx.stats().unwrap().operator("Counting");
        assert_eq!(stats.opens, 2);
        assert_eq!(stats.rows, 2);
    }

    #[test]
    fn test_jump_not_supported() {
        let ctx = context(ExecConfig::default());
        let mut c = cursor(&ctx);
        c.open().unwrap();
        let row = c.next().unwrap().unwrap();
        let err = c.jump(&row, &ColumnSelector::leading(1)).unwrap_err();
        assert_eq!(err, Error::JumpNotSupported("Counting".to_string()));
    }

    #[test]
    fn test_cancellation_checked() {
        let ctx = context(ExecConfig::default());
        let mut c = cursor(&ctx);
        c.open().unwrap();
        ctx.cancel();
        assert_eq!(c.next().unwrap_err(), Error::QueryCancelled);
        c.close().unwrap();
        assert_eq!(c.open().unwrap_err(), Error::QueryCancelled);
        assert_eq!(c.state(), CursorState::Idle);
    }

    #[test]
    fn test_row_stream_destroys_on_drop() {
        let ctx = context(ExecConfig::default());
        let stream = RowStream::open(Box::new(cursor(&ctx))).unwrap();
        let rows = stream.collect_rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], Value::integer(1));
    }

    #[test]
    fn test_column_selector() {
        let rt = RowType::derived("p", vec![DataType::Integer, DataType::Integer]);
        let row = Row::new(&rt, vec![Value::integer(1), Value::integer(2)]).unwrap();
        assert_eq!(ColumnSelector::leading(1).select(&row), &[Value::integer(1)]);
        assert_eq!(ColumnSelector::leading(5).select(&row).len(), 2);
    }
}
