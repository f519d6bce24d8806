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

//! Bloom filter for semi-join pre-filtering
//!
//! The filter is built over hashes of key tuples. Builder and prober must
//! hash the same projection with [`hash_keys`] so that equal keys (including
//! `Integer(5)` vs `Float(5.0)`) always land on the same bits.
//!
//! False positives are possible, false negatives are not.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::core::Value;

/// Minimum bloom filter size in bits
const MIN_FILTER_BITS: usize = 64;

/// Maximum bloom filter size in bits (~1MB)
const MAX_FILTER_BITS: usize = 8_000_000;

/// Hash a key tuple into a single u64
#[inline]
pub fn hash_keys(keys: &[Value]) -> u64 {
    let mut hasher = FxHasher::default();
    keys.len().hash(&mut hasher);
    for key in keys {
        key.hash(&mut hasher);
    }
    // murmur3 fmix64: Fx leaves the low bits poorly mixed
    let mut h = hasher.finish();
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^ (h >> 33)
}

/// A space-efficient probabilistic set of key hashes
#[derive(Debug, Clone)]
pub struct BloomFilter {
    /// Bit array stored as u64 words
    bits: Vec<u64>,
    num_bits: usize,
    num_hashes: usize,
    element_count: u64,
}

impl BloomFilter {
    /// Create a filter sized for `expected_elements` at the given false
    /// positive rate
    pub fn new(expected_elements: usize, false_positive_rate: f64) -> Self {
        let fp_rate = false_positive_rate.clamp(0.0001, 0.5);

        // m = -n * ln(p) / (ln(2)^2)
        let ln2_squared = std::f64::consts::LN_2 * std::f64::consts::LN_2;
        let optimal_bits =
            (-(expected_elements.max(1) as f64) * fp_rate.ln() / ln2_squared).ceil() as usize;
        let num_bits = optimal_bits.clamp(MIN_FILTER_BITS, MAX_FILTER_BITS);
        let num_bits = num_bits.div_ceil(64) * 64;

        // k = (m/n) * ln(2)
        let optimal_hashes = ((num_bits as f64 / expected_elements.max(1) as f64)
            * std::f64::consts::LN_2)
            .ceil() as usize;
        let num_hashes = optimal_hashes.clamp(1, 15);

        Self {
            bits: vec![0u64; num_bits / 64],
            num_bits,
            num_hashes,
            element_count: 0,
        }
    }

    /// Filter with a 1% false positive rate
    pub fn with_capacity(expected_elements: usize) -> Self {
        Self::new(expected_elements, 0.01)
    }

    /// Insert a key tuple
    pub fn insert_keys(&mut self, keys: &[Value]) {
        self.insert_raw_hash(hash_keys(keys));
    }

    /// Check a key tuple
    ///
    /// `false` means the keys were definitely never inserted.
    pub fn might_contain_keys(&self, keys: &[Value]) -> bool {
        self.might_contain_raw_hash(hash_keys(keys))
    }

    /// Insert a pre-computed hash
    pub fn insert_raw_hash(&mut self, hash: u64) {
        for i in 0..self.num_hashes {
            let bit_idx = self.bit_index(hash, i);
            self.bits[bit_idx / 64] |= 1u64 << (bit_idx % 64);
        }
        self.element_count += 1;
    }

    /// Check a pre-computed hash
    pub fn might_contain_raw_hash(&self, hash: u64) -> bool {
        (0..self.num_hashes).all(|i| {
            let bit_idx = self.bit_index(hash, i);
            self.bits[bit_idx / 64] & (1u64 << (bit_idx % 64)) != 0
        })
    }

    /// Double hashing: h(i) = h1 + i*h2 + i^2
    fn bit_index(&self, hash: u64, i: usize) -> usize {
        let h1 = hash as usize;
        let h2 = (hash >> 32) as usize;
        let combined = h1.wrapping_add(i.wrapping_mul(h2)).wrapping_add(i * i);
        combined % self.num_bits
    }

    /// Estimated false positive rate at the current fill: (1 - e^(-kn/m))^k
    pub fn estimated_false_positive_rate(&self) -> f64 {
        if self.element_count == 0 {
            return 0.0;
        }
        let k = self.num_hashes as f64;
        let n = self.element_count as f64;
        let m = self.num_bits as f64;
        (1.0 - (-k * n / m).exp()).powf(k)
    }

    pub fn memory_bytes(&self) -> usize {
        self.bits.len() * 8
    }

    /// Number of inserted keys
    pub fn len(&self) -> u64 {
        self.element_count
    }

    pub fn is_empty(&self) -> bool {
        self.element_count == 0
    }
}

impl Default for BloomFilter {
    fn default() -> Self {
        Self::with_capacity(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_false_negatives() {
        let mut filter = BloomFilter::new(500, 0.01);
        for i in 0..500 {
            filter.insert_keys(&[Value::integer(i), Value::text(format!("k{}", i))]);
        }
        assert_eq!(filter.len(), 500);
        for i in 0..500 {
            assert!(filter.might_contain_keys(&[Value::integer(i), Value::text(format!("k{}", i))]));
        }
    }

    #[test]
    fn test_false_positive_rate_reasonable() {
        let mut filter = BloomFilter::new(1000, 0.01);
        for i in 0..1000 {
            filter.insert_keys(&[Value::integer(i)]);
        }
        let false_positives = (10_000..20_000)
            .filter(|&i| filter.might_contain_keys(&[Value::integer(i)]))
            .count();
        // 1% target; leave generous headroom
        assert!(false_positives < 500, "too many false positives: {}", false_positives);
        assert!(filter.estimated_false_positive_rate() < 0.05);
    }

    #[test]
    fn test_numeric_keys_hash_alike() {
        assert_eq!(
            hash_keys(&[Value::integer(5), Value::text("a")]),
            hash_keys(&[Value::float(5.0), Value::text("a")])
        );
        assert_ne!(
            hash_keys(&[Value::integer(1), Value::integer(2)]),
            hash_keys(&[Value::integer(2), Value::integer(1)])
        );
    }

    #[test]
    fn test_empty_filter() {
        let filter = BloomFilter::default();
        assert!(filter.is_empty());
        assert!(!filter.might_contain_keys(&[Value::integer(1)]));
        assert!(filter.memory_bytes() >= 8);
    }
}
