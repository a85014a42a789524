//! Duplicate cluster formation.
//!
//! Records are nodes, above-threshold scores are edges, and duplicate
//! groups are the connected components — computed with union-find over a
//! dense index arena (path compression + union by rank), near-linear in
//! edge count. Components are frozen before resolution, so groups from one
//! run are pairwise disjoint and transitive merging is intentional: A~B and
//! B~C land A, B, C in one group even when A~C scores below threshold.

use super::types::{Candidate, DuplicateGroup, SimilarityScore, Strategy};

/// Disjoint-set forest over dense indices.
#[derive(Debug)]
pub struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    /// Find with path compression (two-pass, iterative).
    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cursor = x;
        while self.parent[cursor] != root {
            let next = self.parent[cursor];
            self.parent[cursor] = root;
            cursor = next;
        }
        root
    }

    /// Union by rank. Returns `true` if the two sets were merged.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
        true
    }
}

/// A scored candidate pair, carrying the dense indices it was scored at.
#[derive(Debug, Clone)]
pub struct ScoredPair {
    pub a: usize,
    pub b: usize,
    pub score: SimilarityScore,
}

/// Build duplicate groups from a stream of scored pairs.
///
/// Pairs below `threshold` are discarded as they stream past, so only true
/// edges are ever held in memory. Singleton components are impossible by
/// construction and never emitted.
pub fn group<I>(
    candidates: &[Candidate<'_>],
    scored: I,
    threshold: f64,
    strategy: Strategy,
) -> Vec<DuplicateGroup>
where
    I: IntoIterator<Item = ScoredPair>,
{
    let mut set = DisjointSet::new(candidates.len());
    let mut edges: Vec<ScoredPair> = Vec::new();

    for pair in scored {
        if pair.score.composite >= threshold {
            set.union(pair.a, pair.b);
            edges.push(pair);
        }
    }

    freeze(candidates, &mut set, edges, strategy)
}

/// Freeze the union-find into disjoint groups of size >= 2.
fn freeze(
    candidates: &[Candidate<'_>],
    set: &mut DisjointSet,
    edges: Vec<ScoredPair>,
    strategy: Strategy,
) -> Vec<DuplicateGroup> {
    let mut components: Vec<Vec<usize>> = vec![Vec::new(); candidates.len()];
    for idx in 0..candidates.len() {
        components[set.find(idx)].push(idx);
    }

    let mut scores_by_root: Vec<Vec<SimilarityScore>> = vec![Vec::new(); candidates.len()];
    for edge in edges {
        scores_by_root[set.find(edge.a)].push(edge.score);
    }

    let mut groups = Vec::new();
    for (root, members) in components.into_iter().enumerate() {
        if members.len() < 2 {
            continue;
        }
        let representative = representative(candidates, &members);
        let mut ids: Vec<String> = members
            .iter()
            .map(|&idx| candidates[idx].record.id.clone())
            .collect();
        ids.sort();
        groups.push(DuplicateGroup {
            members: ids,
            representative,
            strategy,
            scores: std::mem::take(&mut scores_by_root[root]),
        });
    }

    // Deterministic output order regardless of union internals.
    groups.sort_by(|a, b| a.members[0].cmp(&b.members[0]));
    groups
}

/// Canonical pick for a component: most recently created member, timestamp
/// ties broken by the greater identifier (UUID v7 ids are time-ordered, so
/// the greater id is the later write).
fn representative(candidates: &[Candidate<'_>], members: &[usize]) -> String {
    let best = members
        .iter()
        .max_by(|&&x, &&y| {
            candidates[x]
                .created
                .cmp(&candidates[y].created)
                .then_with(|| candidates[x].record.id.cmp(&candidates[y].record.id))
        })
        .expect("group members are non-empty");
    candidates[*best].record.id.clone()
}
