//! Sanity checks for rewritten procedure bodies

mod similarity;

pub use similarity::{compare, similarity_ratio, SimilarityVerdict};

/// What to do with a proposed rewrite of a procedure
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RewriteReview {
    /// Close to the original but not identical
    Accept(SimilarityVerdict),
    /// Same text as the original (ignoring case and surrounding whitespace)
    NoOp(SimilarityVerdict),
    /// Below the similarity threshold
    TooDifferent(SimilarityVerdict),
}

impl RewriteReview {
    pub fn verdict(&self) -> SimilarityVerdict {
        match self {
            RewriteReview::Accept(v) | RewriteReview::NoOp(v) | RewriteReview::TooDifferent(v) => *v,
        }
    }
}

/// Gate a rewrite before it is persisted.
pub fn review_rewrite(original: &str, rewritten: &str, threshold: f64) -> RewriteReview {
    let verdict = compare(original, rewritten, threshold);
    if original.trim().to_lowercase() == rewritten.trim().to_lowercase() {
        RewriteReview::NoOp(verdict)
    } else if verdict.is_similar {
        RewriteReview::Accept(verdict)
    } else {
        RewriteReview::TooDifferent(verdict)
    }
}
