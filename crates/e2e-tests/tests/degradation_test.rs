//! Reranking and graceful degradation E2E tests for mydocs.
//!
//! A failing or missing reranker must never fail a search that vector
//! recall alone can answer.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use e2e_tests::{write_sample_docs, FailingReranker, KeywordReranker, TestHarness};
use mydocs_search::{SearchError, SearchParams};

#[tokio::test]
async fn test_failing_reranker_falls_back_to_vector_order() {
    let harness = TestHarness::new();
    write_sample_docs(&harness);
    harness.index().await;

    let params = SearchParams::new("copy the binary into your path");
    let cancel = CancellationToken::new();

    let vector_only = harness.service().search(&params, &cancel).unwrap();
    let degraded = harness
        .service_with(Arc::new(FailingReranker))
        .search(&params, &cancel)
        .unwrap();

    assert!(!degraded.reranked);
    assert_eq!(degraded, vector_only);
}

#[tokio::test]
async fn test_reranker_reorders_candidates() {
    let harness = TestHarness::new();
    write_sample_docs(&harness);
    harness.index().await;

    let outcome = harness
        .service_with(Arc::new(KeywordReranker))
        .search(
            &SearchParams::new("installer wizard executable").with_limit(3),
            &CancellationToken::new(),
        )
        .unwrap();

    assert!(outcome.reranked);
    assert_eq!(outcome.items.len(), 3);
    assert_eq!(
        outcome.items[0].result.heading_path,
        "# Installation > ## Windows"
    );
    assert_eq!(outcome.items[0].score, 3.0);
    for pair in outcome.items.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn test_rerank_preference() {
    let harness = TestHarness::new();
    write_sample_docs(&harness);
    harness.index().await;
    let cancel = CancellationToken::new();

    let forced = harness
        .service()
        .search(&SearchParams::new("install").with_rerank(true), &cancel);
    assert!(matches!(forced, Err(SearchError::RerankerUnavailable)));

    let skipped = harness
        .service_with(Arc::new(KeywordReranker))
        .search(&SearchParams::new("install").with_rerank(false), &cancel)
        .unwrap();
    assert!(!skipped.reranked);
}

#[tokio::test]
async fn test_invalid_and_cancelled_searches() {
    let harness = TestHarness::new();
    write_sample_docs(&harness);
    harness.index().await;

    let empty = harness
        .service()
        .search(&SearchParams::new(""), &CancellationToken::new());
    assert!(matches!(empty, Err(SearchError::InvalidInput(_))));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let cancelled = harness.service().search(&SearchParams::new("install"), &cancel);
    assert!(matches!(cancelled, Err(SearchError::Cancelled)));
}
