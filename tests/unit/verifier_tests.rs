//! Unit tests for the similarity verifier

use sql_index_advisor::verify::{compare, review_rewrite, similarity_ratio, RewriteReview};

use crate::common::GET_ORDERS;

#[test]
fn test_procedure_against_itself() {
    assert_eq!(similarity_ratio(GET_ORDERS, GET_ORDERS), 1.0);
    assert_eq!(similarity_ratio(GET_ORDERS, &GET_ORDERS.to_uppercase()), 1.0);
}

#[test]
fn test_whitespace_counts() {
    let reformatted = GET_ORDERS.replace("    ", "\t");
    let ratio = similarity_ratio(GET_ORDERS, &reformatted);
    assert!(ratio < 1.0);
    assert!(ratio > 0.8);
}

#[test]
fn test_verdict_threshold_inclusive() {
    let verdict = compare("abcd", "bcde", 0.75);
    assert!(verdict.is_similar);
    let verdict = compare("abcd", "bcde", 0.76);
    assert!(!verdict.is_similar);
}

#[test]
fn test_select_star_rewrite_is_close() {
    let original = "CREATE PROCEDURE dbo.P AS SELECT * FROM dbo.Orders WHERE CustomerId = @Id";
    let rewritten = "CREATE PROCEDURE dbo.P AS SELECT Id, Total FROM dbo.Orders WHERE CustomerId = @Id";
    let review = review_rewrite(original, rewritten, 0.85);
    assert!(matches!(review, RewriteReview::Accept(_)), "{:?}", review);
}
