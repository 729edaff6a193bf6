//! Concurrency tests for quota consumption.

use std::sync::Arc;

use petro_rag::{
    InMemoryQuotaStore, QuotaDecision, QuotaPolicy, UsageTracker, ANONYMOUS_USER,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn n_concurrent_consumes_against_one_unit_yield_one_success() {
    const N: usize = 16;

    let tracker = Arc::new(
        UsageTracker::new(
            QuotaPolicy { anonymous_daily: 1, registered_daily: 20, enabled: true },
            Box::new(InMemoryQuotaStore),
        )
        .await
        .unwrap(),
    );

    let mut handles = Vec::new();
    for _ in 0..N {
        let tracker = Arc::clone(&tracker);
        handles.push(tokio::spawn(async move {
            tracker.check_and_consume(ANONYMOUS_USER, true).await.unwrap()
        }));
    }

    let mut allowed = 0;
    let mut exhausted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            QuotaDecision::Allowed { remaining } => {
                assert_eq!(remaining, 0);
                allowed += 1;
            }
            QuotaDecision::Exhausted => exhausted += 1,
            QuotaDecision::NotCounted => panic!("domain query must be counted"),
        }
    }

    assert_eq!(allowed, 1, "exactly one concurrent request may consume the last unit");
    assert_eq!(exhausted, N - 1);
    assert_eq!(tracker.remaining(ANONYMOUS_USER).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registered_users_do_not_interfere() {
    let tracker = Arc::new(
        UsageTracker::new(
            QuotaPolicy { anonymous_daily: 1, registered_daily: 2, enabled: true },
            Box::new(InMemoryQuotaStore),
        )
        .await
        .unwrap(),
    );

    let mut handles = Vec::new();
    for user in ["amira", "lukas", "marie"] {
        for _ in 0..2 {
            let tracker = Arc::clone(&tracker);
            handles.push(tokio::spawn(async move {
                tracker.check_and_consume(user, true).await.unwrap()
            }));
        }
    }

    for handle in handles {
        assert!(matches!(handle.await.unwrap(), QuotaDecision::Allowed { .. }));
    }
    for user in ["amira", "lukas", "marie"] {
        assert_eq!(tracker.remaining(user).await, 0);
    }
}
