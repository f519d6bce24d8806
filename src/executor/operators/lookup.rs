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

//! Hierarchical lookups: ancestors and branches of a row's hkey
//!
//! Both operators come in a default flavor, driven by an input stream, and
//! a nested flavor, driven by a row or hkey bound by an enclosing
//! nested loop.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::api::options::LookupOption;
use crate::core::{Error, GroupId, HKey, HKeySegment, Result, Row, RowType, RowTypeKind, TableDef};
use crate::executor::bindings::QueryBindings;
use crate::executor::context::QueryContext;
use crate::executor::cursor::{Cursor, CursorImpl, ManagedCursor};
use crate::executor::operator::{Operator, OperatorImpl};
use crate::storage::{GroupCursor, GroupScanStart};

/// Where a lookup gets its rows from
#[derive(Debug, Clone)]
enum LookupSource {
    Input(Arc<Operator>),
    Binding(usize),
}

impl LookupSource {
    fn children(&self) -> Vec<&Arc<Operator>> {
        match self {
            LookupSource::Input(input) => vec![input],
            LookupSource::Binding(_) => Vec::new(),
        }
    }

    /// Variant suffix and argument prefix for explain output
    fn describe(&self) -> (&'static str, String) {
        match self {
            LookupSource::Input(_) => ("Default", String::new()),
            LookupSource::Binding(position) => ("Nested", format!("bound[{}]: ", position)),
        }
    }
}

fn table_of(row_type: &RowType) -> Result<&Arc<TableDef>> {
    match row_type.kind() {
        RowTypeKind::Table(table) => Ok(table),
        _ => Err(Error::invalid_plan(format!("{} is not a table row type", row_type))),
    }
}

fn hkey_of(row: &Row) -> Result<&HKey> {
    row.hkey()
        .ok_or_else(|| Error::internal(format!("{} row has no hkey", row.row_type())))
}

// ============================================================================
// AncestorLookup
// ============================================================================

/// Point lookups of the ancestors of each input row
#[derive(Debug)]
pub struct AncestorLookup {
    source: LookupSource,
    group: GroupId,
    source_type: Arc<RowType>,
    /// Shallowest first
    ancestors: Vec<Arc<RowType>>,
    keep_input: bool,
}

impl AncestorLookup {
    /// Look up ancestors of the `source_type` rows of `input`
    pub fn new(
        input: Arc<Operator>,
        source_type: &Arc<RowType>,
        ancestors: Vec<Arc<RowType>>,
        option: LookupOption,
    ) -> Result<Self> {
        Self::build(LookupSource::Input(input), source_type, ancestors, option)
    }

    /// Look up ancestors of the row or hkey bound at `binding`
    pub fn nested(
        binding: usize,
        source_type: &Arc<RowType>,
        ancestors: Vec<Arc<RowType>>,
        option: LookupOption,
    ) -> Result<Self> {
        if option.keeps_input() {
            return Err(Error::invalid_plan(
                "nested ancestor lookup cannot keep its input",
            ));
        }
        Self::build(LookupSource::Binding(binding), source_type, ancestors, option)
    }

    fn build(
        source: LookupSource,
        source_type: &Arc<RowType>,
        mut ancestors: Vec<Arc<RowType>>,
        option: LookupOption,
    ) -> Result<Self> {
        let source_table = source_type.hkey_table().ok_or_else(|| {
            Error::invalid_plan(format!("{} rows have no hkey to look up from", source_type))
        })?;
        if ancestors.is_empty() {
            return Err(Error::invalid_plan("ancestor lookup needs at least one ancestor type"));
        }
        for ancestor in &ancestors {
            let table = table_of(ancestor)?;
            if !table.contains(source_table) {
                return Err(Error::invalid_plan(format!(
                    "{} is not an ancestor of {}",
                    ancestor, source_type
                )));
            }
        }
        ancestors.sort_by_key(|t| t.table().map_or(0, |t| t.depth()));
        ancestors.dedup_by(|a, b| RowType::same(a, b));
        Ok(Self {
            source,
            group: source_table.group,
            source_type: source_type.clone(),
            ancestors,
            keep_input: option.keeps_input(),
        })
    }
}

impl OperatorImpl for AncestorLookup {
    fn row_type(&self) -> Option<Arc<RowType>> {
        match (&self.source, self.ancestors.as_slice()) {
            (LookupSource::Binding(_), [only]) => Some(only.clone()),
            _ => None,
        }
    }

    fn children(&self) -> Vec<&Arc<Operator>> {
        self.source.children()
    }

    fn describe(&self) -> String {
        let names: Vec<_> = self.ancestors.iter().map(|t| t.to_string()).collect();
        let (variant, source) = self.source.describe();
        format!(
            "AncestorLookup_{}({}{} -> {}{})",
            variant,
            source,
            self.source_type,
            names.join(", "),
            if self.keep_input { ", KEEP_INPUT" } else { "" }
        )
    }

    fn cursor(
        &self,
        ctx: &Arc<QueryContext>,
        bindings: &QueryBindings,
    ) -> Result<Box<dyn Cursor>> {
        let input = match &self.source {
            LookupSource::Input(op) => Some(op.cursor(ctx, bindings)?),
            LookupSource::Binding(_) => None,
        };
        let cursor = AncestorLookupCursor {
            input,
            binding: match self.source {
                LookupSource::Binding(position) => Some(position),
                LookupSource::Input(_) => None,
            },
            bindings: bindings.clone(),
            storage: ctx.store().group_cursor(self.group)?,
            source_type: self.source_type.clone(),
            ancestors: self.ancestors.clone(),
            keep_input: self.keep_input,
            pending: VecDeque::new(),
        };
        Ok(ManagedCursor::boxed(cursor, ctx))
    }
}

struct AncestorLookupCursor {
    input: Option<Box<dyn Cursor>>,
    binding: Option<usize>,
    bindings: QueryBindings,
    storage: Box<dyn GroupCursor>,
    source_type: Arc<RowType>,
    ancestors: Vec<Arc<RowType>>,
    keep_input: bool,
    pending: VecDeque<Row>,
}

impl AncestorLookupCursor {
    /// Queue every ancestor of `hkey` that exists
    fn lookup(&mut self, hkey: &HKey) -> Result<()> {
        for ancestor in &self.ancestors {
            let depth = ancestor.table().map_or(0, |t| t.depth());
            let key = hkey.prefix(depth);
            self.storage.open(GroupScanStart::At {
                hkey: key.clone(),
                deep: false,
            })?;
            let found = self.storage.next()?;
            self.storage.close();
            match found {
                Some(row) if row.hkey() == Some(&key) && row.is_type(ancestor) => {
                    self.pending.push_back(row)
                }
                _ => {
                    if tracing::enabled!(tracing::Level::TRACE) {
                        tracing::trace!(%key, ancestor = %ancestor, "ancestor missing");
                    }
                }
            }
        }
        Ok(())
    }
}

impl CursorImpl for AncestorLookupCursor {
    const NAME: &'static str = "AncestorLookup";

    fn open(&mut self) -> Result<()> {
        self.pending.clear();
        if let Some(input) = self.input.as_mut() {
            return input.open();
        }
        if let Some(binding) = self.binding {
            let hkey = self.bindings.get_hkey(binding)?;
            self.lookup(&hkey)?;
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Row>> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Ok(Some(row));
            }
            let Some(input) = self.input.as_mut() else {
                return Ok(None);
            };
            let Some(row) = input.next()? else {
                return Ok(None);
            };
            if !row.is_type(&self.source_type) {
                return Ok(Some(row));
            }
            let hkey = hkey_of(&row)?.clone();
            self.lookup(&hkey)?;
            if self.keep_input {
                self.pending.push_back(row);
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.pending.clear();
        self.storage.close();
        match self.input.as_mut() {
            Some(input) => input.close(),
            None => Ok(()),
        }
    }

    fn destroy(&mut self) -> Result<()> {
        self.pending.clear();
        self.storage.close();
        match self.input.as_mut() {
            Some(input) => input.destroy(),
            None => Ok(()),
        }
    }
}

// ============================================================================
// BranchLookup
// ============================================================================

/// Retrieval of the branch of an output table related to each input row
///
/// The branch is every row at or below the output table under the common
/// ancestor of the input's table and the output table.
#[derive(Debug)]
pub struct BranchLookup {
    source: LookupSource,
    group: GroupId,
    source_type: Arc<RowType>,
    output_type: Arc<RowType>,
    output_table: Arc<TableDef>,
    /// Depth of the common ancestor
    common_depth: usize,
    /// Ordinal of the table below the common ancestor on the way to the
    /// output table; `None` when the output table is the common ancestor
    branch_ordinal: Option<u32>,
    keep_input: bool,
}

impl BranchLookup {
    pub fn new(
        input: Arc<Operator>,
        source_type: &Arc<RowType>,
        output_type: &Arc<RowType>,
        option: LookupOption,
    ) -> Result<Self> {
        Self::build(LookupSource::Input(input), source_type, output_type, option)
    }

    /// Branch of the row bound at `binding`
    pub fn nested(
        binding: usize,
        source_type: &Arc<RowType>,
        output_type: &Arc<RowType>,
        option: LookupOption,
    ) -> Result<Self> {
        Self::build(LookupSource::Binding(binding), source_type, output_type, option)
    }

    fn build(
        source: LookupSource,
        source_type: &Arc<RowType>,
        output_type: &Arc<RowType>,
        option: LookupOption,
    ) -> Result<Self> {
        let source_table = source_type.hkey_table().ok_or_else(|| {
            Error::invalid_plan(format!("{} rows have no hkey to branch from", source_type))
        })?;
        let output_table = table_of(output_type)?.clone();
        if source_table.group != output_table.group {
            return Err(Error::invalid_plan(format!(
                "{} and {} are in different groups",
                source_type, output_type
            )));
        }
        let common_depth = source_table
            .ancestry
            .iter()
            .zip(output_table.ancestry.iter())
            .take_while(|(a, b)| a == b)
            .count();
        let branch_ordinal = output_table.ancestry_ordinals.get(common_depth).copied();
        Ok(Self {
            source,
            group: output_table.group,
            source_type: source_type.clone(),
            output_type: output_type.clone(),
            output_table,
            common_depth,
            branch_ordinal,
            keep_input: option.keeps_input(),
        })
    }
}

impl OperatorImpl for BranchLookup {
    fn row_type(&self) -> Option<Arc<RowType>> {
        None
    }

    fn children(&self) -> Vec<&Arc<Operator>> {
        self.source.children()
    }

    fn describe(&self) -> String {
        let (variant, source) = self.source.describe();
        format!(
            "BranchLookup_{}({}{} -> {}{})",
            variant,
            source,
            self.source_type,
            self.output_type,
            if self.keep_input { ", KEEP_INPUT" } else { "" }
        )
    }

    fn cursor(
        &self,
        ctx: &Arc<QueryContext>,
        bindings: &QueryBindings,
    ) -> Result<Box<dyn Cursor>> {
        let (input, binding) = match &self.source {
            LookupSource::Input(op) => (Some(op.cursor(ctx, bindings)?), None),
            LookupSource::Binding(position) => (None, Some(*position)),
        };
        let cursor = BranchLookupCursor {
            input,
            binding,
            bindings: bindings.clone(),
            storage: ctx.store().group_cursor(self.group)?,
            source_type: self.source_type.clone(),
            output_table: self.output_table.clone(),
            common_depth: self.common_depth,
            branch_ordinal: self.branch_ordinal,
            keep_input: self.keep_input,
            pending: None,
            skip: None,
            scanning: false,
        };
        Ok(ManagedCursor::boxed(cursor, ctx))
    }
}

struct BranchLookupCursor {
    input: Option<Box<dyn Cursor>>,
    binding: Option<usize>,
    bindings: QueryBindings,
    storage: Box<dyn GroupCursor>,
    source_type: Arc<RowType>,
    output_table: Arc<TableDef>,
    common_depth: usize,
    branch_ordinal: Option<u32>,
    keep_input: bool,
    /// Input row to emit before its branch
    pending: Option<Row>,
    /// Input row already emitted, skipped if the branch contains it
    skip: Option<Row>,
    scanning: bool,
}

impl BranchLookupCursor {
    fn start_branch(&mut self, hkey: &HKey, input: Option<Row>) -> Result<()> {
        let mut key = hkey.prefix(self.common_depth);
        if let Some(ordinal) = self.branch_ordinal {
            key.push(HKeySegment::ordinal_only(ordinal));
        }
        self.storage.open(GroupScanStart::At { hkey: key, deep: true })?;
        self.scanning = true;
        self.skip = input.clone();
        self.pending = input;
        Ok(())
    }

    fn in_branch(&self, row: &Row) -> bool {
        let below_output = row
            .row_type()
            .table()
            .is_some_and(|t| self.output_table.contains(t));
        let already_emitted = self
            .skip
            .as_ref()
            .is_some_and(|s| RowType::same(s.row_type(), row.row_type()) && s.hkey() == row.hkey());
        below_output && !already_emitted
    }
}

impl CursorImpl for BranchLookupCursor {
    const NAME: &'static str = "BranchLookup";

    fn open(&mut self) -> Result<()> {
        self.pending = None;
        self.skip = None;
        self.scanning = false;
        if let Some(input) = self.input.as_mut() {
            return input.open();
        }
        if let Some(binding) = self.binding {
            let hkey = self.bindings.get_hkey(binding)?;
            let input = if self.keep_input {
                Some(self.bindings.get_row(binding)?)
            } else {
                None
            };
            self.start_branch(&hkey, input)?;
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Row>> {
        loop {
            if let Some(row) = self.pending.take() {
                return Ok(Some(row));
            }
            if self.scanning {
                if let Some(row) = self.storage.next()? {
                    if self.in_branch(&row) {
                        return Ok(Some(row));
                    }
                    continue;
                }
                self.scanning = false;
                self.skip = None;
                self.storage.close();
            }
            let Some(input) = self.input.as_mut() else {
                return Ok(None);
            };
            let Some(row) = input.next()? else {
                return Ok(None);
            };
            if !row.is_type(&self.source_type) {
                return Ok(Some(row));
            }
            let hkey = hkey_of(&row)?.clone();
            let keep = self.keep_input.then_some(row);
            self.start_branch(&hkey, keep)?;
        }
    }

    fn close(&mut self) -> Result<()> {
        self.pending = None;
        self.skip = None;
        self.scanning = false;
        self.storage.close();
        match self.input.as_mut() {
            Some(input) => input.close(),
            None => Ok(()),
        }
    }

    fn destroy(&mut self) -> Result<()> {
        self.close()?;
        match self.input.as_mut() {
            Some(input) => input.destroy(),
            None => Ok(()),
        }
    }
}
