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

//! Option types accepted by the plan factories

use std::fmt;

use crate::core::{Error, Result};

/// Join semantics of flatten and intersect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JoinType {
    /// Only matching rows
    #[default]
    Inner,
    /// All left (parent) rows
    Left,
    /// All right (child) rows
    Right,
    /// All rows from both sides
    Full,
}

impl JoinType {
    /// True if unmatched left rows are kept
    pub fn keeps_left(&self) -> bool {
        matches!(self, JoinType::Left | JoinType::Full)
    }

    /// True if unmatched right rows are kept
    pub fn keeps_right(&self) -> bool {
        matches!(self, JoinType::Right | JoinType::Full)
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "INNER"),
            JoinType::Left => write!(f, "LEFT"),
            JoinType::Right => write!(f, "RIGHT"),
            JoinType::Full => write!(f, "FULL"),
        }
    }
}

/// Extra behavior of a flatten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlattenOptions {
    /// Also emit each parent row, before its flattened rows
    pub keep_parent: bool,
    /// Also emit each child row, after its flattened row
    pub keep_child: bool,
    /// Null-extended rows of unmatched parents carry the parent's hkey
    /// instead of the parent's hkey plus a null child segment
    pub left_join_shortens_hkey: bool,
}

impl FlattenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keep_parent(mut self) -> Self {
        self.keep_parent = true;
        self
    }

    pub fn keep_child(mut self) -> Self {
        self.keep_child = true;
        self
    }

    pub fn left_join_shortens_hkey(mut self) -> Self {
        self.left_join_shortens_hkey = true;
        self
    }

    /// Reject combinations that cannot be honored for `join`
    pub fn validate(&self, join: JoinType) -> Result<()> {
        if self.left_join_shortens_hkey && !join.keeps_left() {
            return Err(Error::invalid_plan(format!(
                "LEFT_JOIN_SHORTENS_HKEY requires a LEFT or FULL join, got {}",
                join
            )));
        }
        Ok(())
    }
}

impl fmt::Display for FlattenOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.keep_parent {
            names.push("KEEP_PARENT");
        }
        if self.keep_child {
            names.push("KEEP_CHILD");
        }
        if self.left_join_shortens_hkey {
            names.push("LEFT_JOIN_SHORTENS_HKEY");
        }
        write!(f, "{}", names.join(", "))
    }
}

/// Whether lookup operators also emit the row that triggered the lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookupOption {
    KeepInput,
    #[default]
    DiscardInput,
}

impl LookupOption {
    pub fn keeps_input(&self) -> bool {
        matches!(self, LookupOption::KeepInput)
    }
}

/// Duplicate policy of the sort operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOption {
    #[default]
    PreserveDuplicates,
    /// Keep only the first row of each run of equal sort keys
    SuppressDuplicates,
}

/// Which side's row an intersect emits on a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntersectOutput {
    #[default]
    OutputLeft,
    OutputRight,
}

/// How an intersect advances the losing side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    #[default]
    SequentialScan,
    /// Jump the losing cursor straight to the winner's key
    SkipScan,
}

/// Options of Intersect_Ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntersectOptions {
    pub output: IntersectOutput,
    pub scan: ScanMode,
}

impl IntersectOptions {
    pub fn new(output: IntersectOutput, scan: ScanMode) -> Self {
        Self { output, scan }
    }

    pub fn output_left() -> Self {
        Self::new(IntersectOutput::OutputLeft, ScanMode::SequentialScan)
    }

    pub fn output_right() -> Self {
        Self::new(IntersectOutput::OutputRight, ScanMode::SequentialScan)
    }

    pub fn skip_scan(mut self) -> Self {
        self.scan = ScanMode::SkipScan;
        self
    }

    /// Reject outer joins whose preserved side is not the output side
    pub fn validate(&self, join: JoinType) -> Result<()> {
        match (join, self.output) {
            (JoinType::Full, _) => Err(Error::invalid_plan(
                "intersect does not support FULL join",
            )),
            (JoinType::Left, IntersectOutput::OutputRight) => Err(Error::invalid_plan(
                "LEFT intersect must output left rows",
            )),
            (JoinType::Right, IntersectOutput::OutputLeft) => Err(Error::invalid_plan(
                "RIGHT intersect must output right rows",
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_options_validation() {
        let shortens = FlattenOptions::new().left_join_shortens_hkey();
        assert!(shortens.validate(JoinType::Left).is_ok());
        assert!(shortens.validate(JoinType::Full).is_ok());
        assert!(shortens.validate(JoinType::Inner).unwrap_err().is_plan_error());
        assert!(FlattenOptions::new().keep_parent().validate(JoinType::Right).is_ok());
        assert_eq!(
            FlattenOptions::new().keep_parent().keep_child().to_string(),
            "KEEP_PARENT, KEEP_CHILD"
        );
    }

    #[test]
    fn test_intersect_options_validation() {
        assert!(IntersectOptions::output_left().validate(JoinType::Inner).is_ok());
        assert!(IntersectOptions::output_left().validate(JoinType::Left).is_ok());
        assert!(IntersectOptions::output_right().validate(JoinType::Left).is_err());
        assert!(IntersectOptions::output_left().validate(JoinType::Right).is_err());
        assert!(IntersectOptions::output_right().validate(JoinType::Right).is_ok());
        assert!(IntersectOptions::output_left().validate(JoinType::Full).is_err());
        assert_eq!(
            IntersectOptions::output_right().skip_scan().scan,
            ScanMode::SkipScan
        );
    }

    #[test]
    fn test_join_sides() {
        assert!(JoinType::Full.keeps_left() && JoinType::Full.keeps_right());
        assert!(!JoinType::Inner.keeps_left());
        assert!(LookupOption::KeepInput.keeps_input());
        assert!(!LookupOption::default().keeps_input());
    }
}
