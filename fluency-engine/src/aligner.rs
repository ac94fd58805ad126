//! Word-level alignment between the reference passage and the transcript
//!
//! Ratcliff/Obershelp matching: repeatedly take the longest common block
//! of words, recurse on both sides of it, then turn the gaps between
//! matching blocks into edit runs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;

/// Kind of an edit run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditKind {
    /// Same words in the same order
    Match,
    /// Expected words read as different words (equal-length sides)
    Substitute,
    /// Expected words with no spoken counterpart
    Omit,
    /// Spoken words with no expected counterpart
    Insert,
}

impl std::fmt::Display for EditKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditKind::Match => write!(f, "match"),
            EditKind::Substitute => write!(f, "substitute"),
            EditKind::Omit => write!(f, "omit"),
            EditKind::Insert => write!(f, "insert"),
        }
    }
}

/// One run of the edit script, as index ranges into both token sequences.
///
/// `expected` is empty for inserts, `spoken` is empty for omissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditOperation {
    pub kind: EditKind,
    pub expected: Range<usize>,
    pub spoken: Range<usize>,
}

impl EditOperation {
    /// Number of words this run spans.
    pub fn span(&self) -> usize {
        self.expected.len().max(self.spoken.len())
    }

    pub fn is_error(&self) -> bool {
        self.kind != EditKind::Match
    }

    /// Reference-side tokens covered by this run.
    pub fn expected_tokens<'a>(&self, expected: &'a [String]) -> &'a [String] {
        &expected[self.expected.clone()]
    }

    /// Spoken-side tokens covered by this run.
    pub fn spoken_tokens<'a>(&self, spoken: &'a [String]) -> &'a [String] {
        &spoken[self.spoken.clone()]
    }
}

/// A maximal common block: `expected[a..a + size] == spoken[b..b + size]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MatchingBlock {
    a: usize,
    b: usize,
    size: usize,
}

/// Compute the edit script turning `expected` into `spoken`.
///
/// Runs are emitted in increasing index order on both sides and the result
/// is fully determined by the inputs.
pub fn align(expected: &[String], spoken: &[String]) -> Vec<EditOperation> {
    let blocks = matching_blocks(expected, spoken);

    let mut ops = Vec::new();
    let (mut i, mut j) = (0, 0);

    for block in blocks {
        if i < block.a || j < block.b {
            push_gap(&mut ops, i..block.a, j..block.b);
        }
        if block.size > 0 {
            ops.push(EditOperation {
                kind: EditKind::Match,
                expected: block.a..block.a + block.size,
                spoken: block.b..block.b + block.size,
            });
        }
        i = block.a + block.size;
        j = block.b + block.size;
    }

    ops
}

/// Turn an unmatched region into substitute/omit/insert runs.
///
/// Words are paired positionally; the surplus on the longer side becomes an
/// omission (reference side) or an insertion (spoken side).
fn push_gap(ops: &mut Vec<EditOperation>, expected: Range<usize>, spoken: Range<usize>) {
    let paired = expected.len().min(spoken.len());

    if paired > 0 {
        ops.push(EditOperation {
            kind: EditKind::Substitute,
            expected: expected.start..expected.start + paired,
            spoken: spoken.start..spoken.start + paired,
        });
    }

    if expected.len() > paired {
        let at = spoken.start + paired;
        ops.push(EditOperation {
            kind: EditKind::Omit,
            expected: expected.start + paired..expected.end,
            spoken: at..at,
        });
    } else if spoken.len() > paired {
        let at = expected.start + paired;
        ops.push(EditOperation {
            kind: EditKind::Insert,
            expected: at..at,
            spoken: spoken.start + paired..spoken.end,
        });
    }
}

/// All maximal matching blocks, sorted, adjacent blocks merged, terminated by
/// a zero-size sentinel at `(len(expected), len(spoken))`.
fn matching_blocks(expected: &[String], spoken: &[String]) -> Vec<MatchingBlock> {
    // Positions of every word on the spoken side, ascending
    let mut positions: HashMap<&str, Vec<usize>> = HashMap::new();
    for (j, word) in spoken.iter().enumerate() {
        positions.entry(word.as_str()).or_default().push(j);
    }

    let mut found = Vec::new();
    let mut pending = vec![(0, expected.len(), 0, spoken.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let block = longest_match(expected, &positions, alo, ahi, blo, bhi);
        if block.size == 0 {
            continue;
        }
        if alo < block.a && blo < block.b {
            pending.push((alo, block.a, blo, block.b));
        }
        if block.a + block.size < ahi && block.b + block.size < bhi {
            pending.push((block.a + block.size, ahi, block.b + block.size, bhi));
        }
        found.push(block);
    }

    found.sort_by_key(|block| (block.a, block.b));

    let mut merged: Vec<MatchingBlock> = Vec::with_capacity(found.len() + 1);
    for block in found {
        match merged.last_mut() {
            Some(last) if last.a + last.size == block.a && last.b + last.size == block.b => {
                last.size += block.size;
            }
            _ => merged.push(block),
        }
    }

    merged.push(MatchingBlock {
        a: expected.len(),
        b: spoken.len(),
        size: 0,
    });
    merged
}

/// Longest common block inside `expected[alo..ahi]` × `spoken[blo..bhi]`.
///
/// Ties resolve to the earliest start in `expected`, then in `spoken`.
fn longest_match(
    expected: &[String],
    positions: &HashMap<&str, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> MatchingBlock {
    let mut best = MatchingBlock {
        a: alo,
        b: blo,
        size: 0,
    };

    // Length of the common run ending at (i - 1, j), keyed by j
    let mut run_ending_at: HashMap<usize, usize> = HashMap::new();

    for (i, word) in expected.iter().enumerate().take(ahi).skip(alo) {
        let mut next_runs = HashMap::new();

        if let Some(js) = positions.get(word.as_str()) {
            for &j in js {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }

                let run = j
                    .checked_sub(1)
                    .and_then(|prev| run_ending_at.get(&prev))
                    .copied()
                    .unwrap_or(0)
                    + 1;
                next_runs.insert(j, run);

                if run > best.size {
                    best = MatchingBlock {
                        a: i + 1 - run,
                        b: j + 1 - run,
                        size: run,
                    };
                }
            }
        }

        run_ending_at = next_runs;
    }

    best
}
