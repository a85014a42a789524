//! Candidate pair generation via blocking.
//!
//! Scoring every record against every other is O(n²) and falls over at
//! scale. [`BlockingIndex`] buckets records by a cheap coarse key — the
//! first token of the normalized content plus a length band — and only
//! emits pairs within a bucket or across adjacent length bands of the same
//! token. This is a deliberate approximation: above the exhaustive ceiling,
//! true duplicates that land in non-adjacent buckets are missed, an
//! accepted cost of scaling. At or below the ceiling the index falls back
//! to full pairwise comparison for exactness.

use std::collections::BTreeMap;

/// Width of one length band. Near-duplicates rarely differ by more than a
/// band, and adjacent bands are always cross-paired.
const LENGTH_BAND: usize = 64;

/// Blocking key: leading token (truncated) plus length band of the
/// normalized content.
fn blocking_key(normalized: &str) -> (String, usize) {
    let token = normalized
        .split_whitespace()
        .next()
        .unwrap_or("")
        .chars()
        .take(8)
        .collect::<String>();
    (token, normalized.len() / LENGTH_BAND)
}

/// One unit of pair emission: all pairs within a block, or all cross pairs
/// between two blocks.
#[derive(Debug, Clone, Copy)]
enum Task {
    Within(usize),
    Cross(usize, usize),
}

/// Partitioned candidate index over dense record indices.
///
/// `candidate_pairs` returns a lazy, finite iterator and can be called any
/// number of times — each call restarts from the beginning.
#[derive(Debug)]
pub struct BlockingIndex {
    blocks: Vec<Vec<usize>>,
    tasks: Vec<Task>,
}

impl BlockingIndex {
    /// Build the index over pre-normalized contents.
    ///
    /// `ceiling` bounds both the exhaustive fallback (at or below it, every
    /// pair is emitted) and the maximum block size (oversized buckets are
    /// chunked so peak per-block pair state stays bounded).
    pub fn build(normalized: &[String], ceiling: usize) -> Self {
        if normalized.len() <= ceiling {
            let all: Vec<usize> = (0..normalized.len()).collect();
            return Self {
                blocks: vec![all],
                tasks: vec![Task::Within(0)],
            };
        }

        // BTreeMap keeps buckets ordered by (token, band) so adjacency is
        // a matter of looking at the next entry.
        let mut buckets: BTreeMap<(String, usize), Vec<usize>> = BTreeMap::new();
        for (idx, norm) in normalized.iter().enumerate() {
            buckets.entry(blocking_key(norm)).or_default().push(idx);
        }

        let mut blocks: Vec<Vec<usize>> = Vec::new();
        let mut tasks: Vec<Task> = Vec::new();
        // Last block of the previous bucket, with its key, for adjacency.
        let mut prev: Option<((String, usize), usize)> = None;

        for ((token, band), mut members) in buckets {
            // Sort by content length so chunk boundaries separate the most
            // dissimilar members when an oversized bucket is split.
            members.sort_by_key(|&idx| normalized[idx].len());

            let mut first_block_of_bucket = None;
            for chunk in members.chunks(ceiling.max(2)) {
                let block_id = blocks.len();
                blocks.push(chunk.to_vec());
                tasks.push(Task::Within(block_id));
                match first_block_of_bucket {
                    None => first_block_of_bucket = Some(block_id),
                    // Consecutive chunks of the same bucket stay comparable.
                    Some(_) => tasks.push(Task::Cross(block_id - 1, block_id)),
                }
            }

            if let Some(first) = first_block_of_bucket {
                if let Some(((prev_token, prev_band), prev_block)) = &prev {
                    if *prev_token == token && band == prev_band + 1 {
                        tasks.push(Task::Cross(*prev_block, first));
                    }
                }
                prev = Some(((token, band), blocks.len() - 1));
            }
        }

        Self { blocks, tasks }
    }

    /// Lazy sequence of candidate `(i, j)` index pairs, `i < j` within a
    /// block; cross-block pairs are ordered (block a, block b).
    pub fn candidate_pairs(&self) -> CandidatePairs<'_> {
        CandidatePairs {
            index: self,
            task: 0,
            i: 0,
            j: 1,
        }
    }

    /// Number of blocks (exposed for logging).
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

/// Restartable iterator over candidate pairs. Holds only cursors, never a
/// materialized pair list.
pub struct CandidatePairs<'a> {
    index: &'a BlockingIndex,
    task: usize,
    i: usize,
    j: usize,
}

impl Iterator for CandidatePairs<'_> {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<(usize, usize)> {
        loop {
            let task = *self.index.tasks.get(self.task)?;
            match task {
                Task::Within(b) => {
                    let block = &self.index.blocks[b];
                    if self.i + 1 < block.len() {
                        if self.j < block.len() {
                            let pair = (block[self.i], block[self.j]);
                            self.j += 1;
                            return Some(pair);
                        }
                        self.i += 1;
                        self.j = self.i + 1;
                        continue;
                    }
                }
                Task::Cross(a, b) => {
                    let left = &self.index.blocks[a];
                    let right = &self.index.blocks[b];
                    if self.i < left.len() {
                        if self.j < right.len() {
                            let pair = (left[self.i], right[self.j]);
                            self.j += 1;
                            return Some(pair);
                        }
                        self.i += 1;
                        self.j = 0;
                        continue;
                    }
                }
            }
            self.task += 1;
            self.i = 0;
            self.j = match self.index.tasks.get(self.task) {
                Some(Task::Within(_)) => 1,
                _ => 0,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn pairs(index: &BlockingIndex) -> HashSet<(usize, usize)> {
        index
            .candidate_pairs()
            .map(|(a, b)| if a < b { (a, b) } else { (b, a) })
            .collect()
    }

    #[test]
    fn small_input_is_exhaustive() {
        let contents: Vec<String> = ["alpha one", "beta two", "gamma three", "delta four"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let index = BlockingIndex::build(&contents, 1000);
        let got = pairs(&index);
        assert_eq!(got.len(), 6); // C(4, 2)
    }

    #[test]
    fn iterator_is_restartable() {
        let contents: Vec<String> = (0..10).map(|i| format!("record number {i}")).collect();
        let index = BlockingIndex::build(&contents, 1000);
        let first: Vec<_> = index.candidate_pairs().collect();
        let second: Vec<_> = index.candidate_pairs().collect();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn same_bucket_records_are_paired_above_ceiling() {
        // Push past the ceiling so blocking actually engages.
        let mut contents: Vec<String> = (0..30).map(|i| format!("filler{i} noise")).collect();
        contents.push("checkpoint sync finished".to_string()); // idx 30
        contents.push("checkpoint sync finished".to_string()); // idx 31
        let index = BlockingIndex::build(&contents, 8);
        assert!(pairs(&index).contains(&(30, 31)));
    }

    #[test]
    fn adjacent_length_bands_are_cross_paired() {
        let mut contents: Vec<String> = (0..20).map(|i| format!("pad{i}")).collect();
        // Same leading token, lengths straddling a band boundary.
        contents.push(format!("sync {}", "x".repeat(60))); // idx 20, band 1
        contents.push(format!("sync {}", "x".repeat(70))); // idx 21, band 1
        contents.push(format!("sync {}", "x".repeat(125))); // idx 22, band 2
        let index = BlockingIndex::build(&contents, 8);
        let got = pairs(&index);
        assert!(got.contains(&(20, 21)));
        assert!(got.contains(&(21, 22)) || got.contains(&(20, 22)));
    }

    #[test]
    fn no_self_or_duplicate_pairs() {
        let contents: Vec<String> = (0..50).map(|i| format!("tok{} body", i % 5)).collect();
        let index = BlockingIndex::build(&contents, 10);
        let all: Vec<_> = index
            .candidate_pairs()
            .map(|(a, b)| if a < b { (a, b) } else { (b, a) })
            .collect();
        let unique: HashSet<_> = all.iter().copied().collect();
        assert_eq!(all.len(), unique.len());
        assert!(all.iter().all(|(a, b)| a != b));
    }

    #[test]
    fn oversized_buckets_are_chunked() {
        // 40 records sharing one blocking key with ceiling 10: blocks stay
        // bounded and consecutive chunks are cross-paired.
        let contents: Vec<String> = (0..40).map(|_| "same content here".to_string()).collect();
        let index = BlockingIndex::build(&contents, 10);
        assert!(index.block_count() >= 4);
        // Pair count well under the full C(40, 2) = 780.
        let got = pairs(&index);
        assert!(got.len() < 780);
        assert!(!got.is_empty());
    }
}
