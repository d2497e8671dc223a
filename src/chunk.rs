// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0
//! Fixed-size batching of candidate lists.
//!
//! On-chain batch methods (`queueMany`, `toggleMany`, `registerWallets`) run
//! out of gas long before they run out of array length, so candidate lists
//! are split into batches of at most `limit` entries. The sequence is lazy
//! and restartable: an operator who persisted the index of the last
//! completed batch can resume with [`Chunks::resume_from`] without
//! recomputing anything before it.
//!
//! ```rust
//! use hector_ops::chunks;
//!
//! let tokens: Vec<u32> = (0..45).collect();
//! let sizes: Vec<usize> = chunks(&tokens, 20).unwrap().map(|b| b.len()).collect();
//! assert_eq!(sizes, vec![20, 20, 5]);
//! ```

use std::ops::Range;

use crate::error::{OpsError, Result};

/// One contiguous slice `[start, end)` of a candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch<'a, T> {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub items: &'a [T],
}

impl<T> Batch<'_, T> {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Lazy iterator over the batches of a slice.
#[derive(Debug, Clone)]
pub struct Chunks<'a, T> {
    items: &'a [T],
    limit: usize,
    next_index: usize,
}

/// Splits `items` into batches of at most `limit` entries.
///
/// # Errors
///
/// Returns [`OpsError::InvalidConfig`] when `limit` is zero.
pub fn chunks<T>(items: &[T], limit: usize) -> Result<Chunks<'_, T>> {
    if limit == 0 {
        return Err(OpsError::InvalidConfig(
            "batch limit must be greater than zero".to_string(),
        ));
    }
    Ok(Chunks {
        items,
        limit,
        next_index: 0,
    })
}

/// Number of batches `n` items produce with the given limit.
pub fn batch_count(n: usize, limit: usize) -> usize {
    if limit == 0 {
        return 0;
    }
    n.div_ceil(limit)
}

impl<'a, T> Chunks<'a, T> {
    /// Skips to batch `index`. Batches before it are never produced.
    pub fn resume_from(mut self, index: usize) -> Self {
        self.next_index = index.min(self.total());
        self
    }

    /// Total number of batches in the full sequence, including skipped ones.
    pub fn total(&self) -> usize {
        batch_count(self.items.len(), self.limit)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl<'a, T> Iterator for Chunks<'a, T> {
    type Item = Batch<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_index >= self.total() {
            return None;
        }
        let index = self.next_index;
        let start = index * self.limit;
        let end = (start + self.limit).min(self.items.len());
        self.next_index += 1;
        Some(Batch {
            index,
            start,
            end,
            items: &self.items[start..end],
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total().saturating_sub(self.next_index);
        (remaining, Some(remaining))
    }
}

impl<T> ExactSizeIterator for Chunks<'_, T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_forty_five_tokens_in_batches_of_twenty() {
        let tokens: Vec<usize> = (0..45).collect();
        let batches: Vec<_> = chunks(&tokens, 20).unwrap().collect();

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].range(), 0..20);
        assert_eq!(batches[1].range(), 20..40);
        assert_eq!(batches[2].range(), 40..45);
        assert_eq!(batches[2].items, &tokens[40..45]);
    }

    #[rstest]
    #[case(0, 1)]
    #[case(0, 20)]
    #[case(1, 1)]
    #[case(19, 20)]
    #[case(20, 20)]
    #[case(21, 20)]
    #[case(401, 400)]
    #[case(1905, 20)]
    fn test_batches_partition_the_list(#[case] n: usize, #[case] limit: usize) {
        let items: Vec<usize> = (0..n).collect();
        let batches: Vec<_> = chunks(&items, limit).unwrap().collect();

        assert_eq!(batches.len(), n.div_ceil(limit));
        assert!(batches.iter().all(|b| b.len() <= limit && !b.is_empty()));

        let mut expected_start = 0;
        for (i, batch) in batches.iter().enumerate() {
            assert_eq!(batch.index, i);
            assert_eq!(batch.start, expected_start);
            expected_start = batch.end;
        }
        assert_eq!(expected_start, n);

        let rejoined: Vec<usize> = batches.iter().flat_map(|b| b.items.iter().copied()).collect();
        assert_eq!(rejoined, items);
    }

    #[test]
    fn test_short_list_is_single_batch() {
        let items = [1, 2, 3];
        let batches: Vec<_> = chunks(&items, 20).unwrap().collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].items, &items);
    }

    #[test]
    fn test_zero_limit_is_rejected() {
        let items = [1, 2, 3];
        assert!(matches!(chunks(&items, 0), Err(OpsError::InvalidConfig(_))));
        assert_eq!(batch_count(3, 0), 0);
    }

    #[test]
    fn test_resume_from_checkpoint() {
        let items: Vec<usize> = (0..45).collect();
        let resumed: Vec<_> = chunks(&items, 20).unwrap().resume_from(2).collect();

        assert_eq!(resumed.len(), 1);
        assert_eq!(resumed[0].index, 2);
        assert_eq!(resumed[0].items, &items[40..45]);

        assert_eq!(chunks(&items, 20).unwrap().resume_from(7).count(), 0);
    }

    #[test]
    fn test_sequence_is_restartable() {
        let items: Vec<usize> = (0..10).collect();
        let sequence = chunks(&items, 3).unwrap();
        let first: Vec<_> = sequence.clone().map(|b| b.range()).collect();
        let second: Vec<_> = sequence.map(|b| b.range()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_exact_size() {
        let items: Vec<usize> = (0..45).collect();
        let mut sequence = chunks(&items, 20).unwrap();
        assert_eq!(sequence.len(), 3);
        sequence.next();
        assert_eq!(sequence.len(), 2);
    }
}
