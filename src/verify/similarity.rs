//! Ratcliff/Obershelp text similarity

use std::collections::HashMap;

/// Similarity of two SQL bodies and whether it clears the threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityVerdict {
    /// `2 * matches / (len(a) + len(b))`, in `[0, 1]`
    pub ratio: f64,
    pub is_similar: bool,
}

/// Compare `original` against `rewritten`, case-insensitively, character by character.
///
/// Whitespace and formatting count as differences. Two empty inputs compare
/// as identical (ratio 1.0); one empty input against a non-empty one gives 0.0.
pub fn compare(original: &str, rewritten: &str, threshold: f64) -> SimilarityVerdict {
    let ratio = similarity_ratio(original, rewritten);
    SimilarityVerdict {
        ratio,
        is_similar: ratio >= threshold,
    }
}

/// The bare ratio behind [`compare`].
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    // Longest-match tie-breaking depends on argument order; fix the order so
    // compare(a, b) and compare(b, a) agree.
    let (a, b) = if a <= b { (a, b) } else { (b, a) };

    2.0 * matching_characters(&a, &b) as f64 / total as f64
}

/// Total size of the matching blocks found by recursive longest-common-substring.
fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut matcher = Matcher::new(b);
    let mut matches = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = matcher.longest_match(a, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matches += k;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            queue.push((i + k, ahi, j + k, bhi));
        }
    }
    matches
}

/// Longest-match search over `b`, indexed by character.
///
/// Only positions of `b` holding the current character of `a` are visited,
/// and the run-length rows are reused across calls.
struct Matcher {
    /// Ascending positions in `b` of each character
    positions: HashMap<char, Vec<usize>>,
    /// `prev[j + 1]`: length of the run ending at `b[j]` on the previous row
    prev: Vec<usize>,
    cur: Vec<usize>,
    prev_touched: Vec<usize>,
    cur_touched: Vec<usize>,
}

impl Matcher {
    fn new(b: &[char]) -> Self {
        let mut positions: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, c) in b.iter().enumerate() {
            positions.entry(*c).or_default().push(j);
        }
        Self {
            positions,
            prev: vec![0; b.len() + 1],
            cur: vec![0; b.len() + 1],
            prev_touched: Vec::new(),
            cur_touched: Vec::new(),
        }
    }

    /// Longest common block of `a[alo..ahi]` and `b[blo..bhi]` as `(i, j, len)`.
    ///
    /// Among equally long blocks the one starting earliest in `a`, then earliest in `b`, wins.
    fn longest_match(
        &mut self,
        a: &[char],
        alo: usize,
        ahi: usize,
        blo: usize,
        bhi: usize,
    ) -> (usize, usize, usize) {
        let (mut best_i, mut best_j, mut best_len) = (alo, blo, 0);

        for i in alo..ahi {
            if let Some(js) = self.positions.get(&a[i]) {
                let first = js.partition_point(|&j| j < blo);
                for &j in js[first..].iter().take_while(|&&j| j < bhi) {
                    let len = self.prev[j] + 1;
                    self.cur[j + 1] = len;
                    self.cur_touched.push(j + 1);
                    if len > best_len {
                        best_len = len;
                        best_i = i + 1 - len;
                        best_j = j + 1 - len;
                    }
                }
            }
            for &slot in &self.prev_touched {
                self.prev[slot] = 0;
            }
            self.prev_touched.clear();
            std::mem::swap(&mut self.prev, &mut self.cur);
            std::mem::swap(&mut self.prev_touched, &mut self.cur_touched);
        }

        for &slot in &self.prev_touched {
            self.prev[slot] = 0;
        }
        self.prev_touched.clear();

        (best_i, best_j, best_len)
    }
}
