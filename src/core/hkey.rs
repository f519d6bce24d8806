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

//! Hierarchical keys
//!
//! An [`HKey`] locates a row inside its group: one [`HKeySegment`] per table
//! level from the group root down to the row's own table. Each segment holds
//! the table's ordinal within the group followed by that level's key values.
//!
//! The derived ordering is the physical group order. Segments compare by
//! ordinal, then by key values (NULLs first). A key that is a proper prefix
//! of another sorts first, which puts every parent immediately before its
//! descendants and keeps siblings grouped by table then key.

use std::fmt;

use smallvec::SmallVec;

use super::value::Value;

/// One level of a hierarchical key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HKeySegment {
    ordinal: u32,
    keys: SmallVec<[Value; 2]>,
}

impl HKeySegment {
    /// Create a segment for the table with the given group ordinal
    pub fn new(ordinal: u32, keys: impl IntoIterator<Item = Value>) -> Self {
        Self {
            ordinal,
            keys: keys.into_iter().collect(),
        }
    }

    /// Segment carrying only the ordinal, matching every key of that table
    /// when used as the last segment of a prefix.
    pub fn ordinal_only(ordinal: u32) -> Self {
        Self {
            ordinal,
            keys: SmallVec::new(),
        }
    }

    /// Table ordinal within the group
    #[inline]
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// Key values of this level
    #[inline]
    pub fn keys(&self) -> &[Value] {
        &self.keys
    }

    /// True if `other` is the same table and its keys start with ours
    pub fn is_prefix_of(&self, other: &HKeySegment) -> bool {
        self.ordinal == other.ordinal
            && self.keys.len() <= other.keys.len()
            && self.keys.iter().zip(other.keys.iter()).all(|(a, b)| a == b)
    }
}

/// Hierarchical key of a row
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HKey {
    segments: SmallVec<[HKeySegment; 4]>,
}

impl HKey {
    /// Create an empty key (sorts before every row of every group)
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a key from its segments, root first
    pub fn from_segments(segments: impl IntoIterator<Item = HKeySegment>) -> Self {
        Self {
            segments: segments.into_iter().collect(),
        }
    }

    /// Number of segments, equal to the depth of the row's table
    #[inline]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    #[inline]
    pub fn segments(&self) -> &[HKeySegment] {
        &self.segments
    }

    /// The deepest segment
    pub fn last_segment(&self) -> Option<&HKeySegment> {
        self.segments.last()
    }

    /// Ordinal of the deepest segment
    pub fn ordinal(&self) -> Option<u32> {
        self.segments.last().map(HKeySegment::ordinal)
    }

    /// Truncate to the first `depth` segments (an ancestor's key)
    ///
    /// A depth beyond the key's own depth returns the key unchanged.
    pub fn prefix(&self, depth: usize) -> HKey {
        let depth = depth.min(self.segments.len());
        Self {
            segments: self.segments[..depth].iter().cloned().collect(),
        }
    }

    /// In-place variant of [`HKey::prefix`]
    pub fn truncate(&mut self, depth: usize) {
        self.segments.truncate(depth);
    }

    /// Append a segment one level deeper
    pub fn push(&mut self, segment: HKeySegment) {
        self.segments.push(segment);
    }

    /// Return a copy extended by one segment
    pub fn extended(&self, segment: HKeySegment) -> HKey {
        let mut key = self.clone();
        key.push(segment);
        key
    }

    /// True if every row whose key is `other` lies in the subtree rooted at
    /// this key.
    ///
    /// All segments but the last must match exactly; the last may be
    /// partial (fewer key values, or ordinal only), in which case it matches
    /// any key of that table starting with those values.
    pub fn is_prefix_of(&self, other: &HKey) -> bool {
        let n = self.segments.len();
        if n > other.segments.len() {
            return false;
        }
        if n == 0 {
            return true;
        }
        self.segments[..n - 1] == other.segments[..n - 1]
            && self.segments[n - 1].is_prefix_of(&other.segments[n - 1])
    }

    /// True if this key identifies a proper ancestor of the row keyed `other`
    pub fn is_ancestor_of(&self, other: &HKey) -> bool {
        self.segments.len() < other.segments.len()
            && self.segments[..] == other.segments[..self.segments.len()]
    }

    /// All key values, root level first
    pub fn key_values(&self) -> impl Iterator<Item = &Value> {
        self.segments.iter().flat_map(|s| s.keys.iter())
    }
}

impl fmt::Display for HKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", segment.ordinal)?;
            if !segment.keys.is_empty() {
                write!(f, ":(")?;
                for (j, key) in segment.keys.iter().enumerate() {
                    if j > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", key)?;
                }
                write!(f, ")")?;
            }
        }
        write!(f, "}}")
    }
}
