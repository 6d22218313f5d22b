//! Admission control on service mutations

mod common;

use common::TestHarness;
use kitforge_core::component::ComponentDraft;
use kitforge_core::rate_limit::RateLimitConfig;
use kitforge_core::service::LimiterKind;
use kitforge_core::KitforgeError;

#[tokio::test]
async fn test_mutations_are_limited_per_caller() {
    let h = TestHarness::with_mutation_limit(RateLimitConfig::new(2, 60_000));

    for slug in ["alpha", "beta"] {
        let name = kitforge_core::naming::slug_to_name(slug);
        h.service
            .create(
                "alice",
                ComponentDraft::new(slug, format!("export const {name} = 1;")),
            )
            .await
            .unwrap();
    }

    let err = h
        .service
        .create("alice", ComponentDraft::new("gamma", "export const Gamma = 1;"))
        .await
        .unwrap_err();
    match err {
        KitforgeError::RateLimited {
            identifier,
            remaining,
            limit,
            ..
        } => {
            assert_eq!(identifier, "alice");
            assert_eq!(remaining, 0);
            assert_eq!(limit, 2);
        }
        other => panic!("expected rate limit, got {other:?}"),
    }
    // Rejected before any registry work
    h.assert_no_traces("gamma");

    // Another caller has its own window
    h.service
        .create("bob", ComponentDraft::new("gamma", "export const Gamma = 1;"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_limiters_are_independent() {
    let h = TestHarness::with_mutation_limit(RateLimitConfig::new(1, 60_000));

    assert!(h.service.rate_limiter_check(LimiterKind::Mutation, "x").allowed);
    assert!(!h.service.rate_limiter_check(LimiterKind::Mutation, "x").allowed);

    let generation = h.service.rate_limiter_check(LimiterKind::Generation, "x");
    assert!(generation.allowed);
    assert_eq!(generation.limit, RateLimitConfig::generation().requests_per_window);
    assert_eq!(generation.remaining, generation.limit - 1);
}

#[test]
fn test_full_window_sequence() {
    let limiter = kitforge_core::rate_limit::RateLimiter::new(
        "mutation",
        RateLimitConfig::new(4, 10_000),
    )
    .unwrap();

    let mut last_remaining = u32::MAX;
    let mut reset_at = 0;
    for _ in 0..4 {
        let d = limiter.check_at("ip-1", 5_000);
        assert!(d.allowed);
        assert!(d.remaining < last_remaining);
        last_remaining = d.remaining;
        reset_at = d.reset_at;
    }
    assert_eq!(last_remaining, 0);

    let denied = limiter.check_at("ip-1", 9_000);
    assert!(!denied.allowed);
    assert_eq!(denied.remaining, 0);
    assert_eq!(denied.reset_at, reset_at);

    let reopened = limiter.check_at("ip-1", reset_at);
    assert!(reopened.allowed);
    assert_eq!(reopened.remaining, 3);
}
