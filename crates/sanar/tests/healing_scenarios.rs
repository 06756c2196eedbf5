//! End-to-end healing scenarios against a scripted page.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use sanar::keys::{CLASS, ID};
use sanar::{
    AttemptOutcome, AttributeSnapshot, CancellationToken, CandidateSource, HealJournal,
    HealingConfig, Heuristic, LocatorDescriptor, LocatorStore, MockPage, Resolver, SanarError,
};

const TEXT_XPATH: &str = "//button[normalize-space(.)='Log In']";

fn login_button(id: &str) -> AttributeSnapshot {
    AttributeSnapshot::new()
        .with_tag("button")
        .with(ID, id)
        .with_text("Log In")
}

fn login() -> LocatorDescriptor {
    LocatorDescriptor::css("#login-btn").with_logical_name("login-submit-button")
}

fn resolver_with(store: LocatorStore) -> Resolver {
    Resolver::new(HealingConfig::default(), store).unwrap()
}

/// Resolve once while the button still has its original id, then rename it.
async fn drifted_login(resolver: &Resolver) -> MockPage {
    let page = MockPage::new().with_element("login", login_button("login-btn"));
    let first = resolver.resolve(&login(), &page).await.unwrap();
    assert!(!first.healed);
    page.add_element("login", login_button("submit-42"));
    page
}

mod primary_tests {
    use super::*;

    #[tokio::test]
    async fn test_unique_primary_is_not_healed() {
        let resolver = resolver_with(LocatorStore::in_memory());
        let page = MockPage::new().with_element("login", login_button("login-btn"));

        let result = resolver.resolve(&login(), &page).await.unwrap();
        assert!(!result.healed);
        assert!((result.confidence - 1.0).abs() < f64::EPSILON);
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(page.query_count(), 1);
    }

    #[tokio::test]
    async fn test_primary_hit_leaves_fallback_order_alone() {
        let resolver = resolver_with(LocatorStore::in_memory());
        let page = drifted_login(&resolver).await;
        resolver.resolve(&login(), &page).await.unwrap();
        let before = resolver.history("login-submit-button").await.unwrap().unwrap();

        page.add_element("login", login_button("login-btn"));
        let result = resolver.resolve(&login(), &page).await.unwrap();
        assert!(!result.healed);

        let after = resolver.history("login-submit-button").await.unwrap().unwrap();
        assert_eq!(after.fallback_history, before.fallback_history);
        assert_eq!(
            after.primary_stats.success_count,
            before.primary_stats.success_count + 1
        );
    }
}

mod healing_tests {
    use super::*;

    #[tokio::test]
    async fn test_renamed_id_heals_by_visible_text() {
        let resolver = resolver_with(LocatorStore::in_memory());
        let page = drifted_login(&resolver).await;

        let result = resolver.resolve(&login(), &page).await.unwrap();
        assert!(result.healed);
        assert_eq!(result.element.id, "login");
        assert_eq!(result.matched_descriptor, LocatorDescriptor::xpath(TEXT_XPATH));
        assert_eq!(
            result.matched_descriptor.logical_name(),
            Some("login-submit-button")
        );
        assert!(result.confidence < 1.0);
        assert_eq!(
            result.attempts.last().unwrap().source,
            CandidateSource::Heuristic(Heuristic::VisibleText)
        );

        let record = resolver.history("login-submit-button").await.unwrap().unwrap();
        let entry = record.fallback(&LocatorDescriptor::xpath(TEXT_XPATH)).unwrap();
        assert_eq!(entry.stats.success_count, 1);
        assert_eq!(record.last_snapshot.id(), Some("submit-42"));
        assert_eq!(record.primary_stats.failure_count, 1);
    }

    #[tokio::test]
    async fn test_recorded_fallback_tried_first() {
        let resolver = resolver_with(LocatorStore::in_memory());
        let page = drifted_login(&resolver).await;
        resolver.resolve(&login(), &page).await.unwrap();

        let result = resolver.resolve(&login(), &page).await.unwrap();
        assert!(result.healed);
        assert_eq!(result.attempts.len(), 2);
        assert_eq!(result.attempts[1].source, CandidateSource::Stored);
        assert!((result.confidence - 0.5).abs() < f64::EPSILON);

        let record = resolver.history("login-submit-button").await.unwrap().unwrap();
        let entry = record.fallback(&LocatorDescriptor::xpath(TEXT_XPATH)).unwrap();
        assert_eq!(entry.stats.success_count, 2);
        assert!(record.is_well_ordered());
    }

    #[tokio::test]
    async fn test_verifier_picks_closest_of_several() {
        let resolver = resolver_with(LocatorStore::in_memory());
        let checkout = LocatorDescriptor::css("#pay").with_logical_name("pay-button");
        let pay = AttributeSnapshot::new()
            .with_tag("button")
            .with(ID, "pay")
            .with(CLASS, "btn-primary")
            .with_text("Pay now");
        let page = MockPage::new().with_element("pay", pay);
        resolver.resolve(&checkout, &page).await.unwrap();

        page.remove_element("pay");
        page.add_element(
            "cancel",
            AttributeSnapshot::new()
                .with_tag("button")
                .with(CLASS, "btn-primary")
                .with_text("Cancel order"),
        );
        page.add_element(
            "pay-v2",
            AttributeSnapshot::new()
                .with_tag("button")
                .with(CLASS, "btn-primary")
                .with_text("Pay now!"),
        );
        // Text lookups miss the edited label, leaving only the class selector
        let result = resolver.resolve(&checkout, &page).await.unwrap();
        assert!(result.healed);
        assert_eq!(result.element.id, "pay-v2");
        assert!(matches!(
            result.attempts.last().unwrap().outcome,
            AttemptOutcome::Verified { .. }
        ));
    }

    #[tokio::test]
    async fn test_heal_written_to_journal() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("reports").join("heal.jsonl");
        let config = HealingConfig::default().with_heal_log(&log);
        let resolver = Resolver::new(config, LocatorStore::in_memory()).unwrap();
        let page = drifted_login(&resolver).await;
        let result = resolver.resolve(&login(), &page).await.unwrap();

        let events = HealJournal::read(&log).await.unwrap();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.logical_name.as_deref(), Some("login-submit-button"));
        assert_eq!(event.original, LocatorDescriptor::css("#login-btn"));
        assert_eq!(event.healed, LocatorDescriptor::xpath(TEXT_XPATH));
        assert!((event.confidence - result.confidence).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_history_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let resolver = resolver_with(LocatorStore::open_dir(dir.path()).unwrap());
            let page = drifted_login(&resolver).await;
            assert!(resolver.resolve(&login(), &page).await.unwrap().healed);
        }

        let resolver = resolver_with(LocatorStore::open_dir(dir.path()).unwrap());
        let page = MockPage::new().with_element("login", login_button("submit-42"));
        let result = resolver.resolve(&login(), &page).await.unwrap();
        assert_eq!(result.attempts[1].source, CandidateSource::Stored);
        assert_eq!(
            resolver.store().list().await.unwrap(),
            vec!["login-submit-button".to_string()]
        );
    }
}

mod ambiguity_tests {
    use super::*;

    #[tokio::test]
    async fn test_identical_matches_are_ambiguous() {
        let resolver = resolver_with(LocatorStore::in_memory());
        let checkout = LocatorDescriptor::css("#checkout").with_logical_name("checkout");
        let page = MockPage::new().with_element(
            "checkout",
            AttributeSnapshot::new()
                .with_tag("button")
                .with(ID, "checkout")
                .with(CLASS, "btn-primary"),
        );
        resolver.resolve(&checkout, &page).await.unwrap();

        page.remove_element("checkout");
        for id in ["a", "b"] {
            page.add_element(
                id,
                AttributeSnapshot::new()
                    .with_tag("button")
                    .with(CLASS, "btn-primary"),
            );
        }

        let err = resolver.resolve(&checkout, &page).await.unwrap_err();
        match &err {
            SanarError::AmbiguousMatch { scores, .. } => {
                assert_eq!(scores.len(), 2);
                assert!((scores[0] - scores[1]).abs() < f64::EPSILON);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
        assert!(err.attempts().iter().all(|a| !a.outcome.is_success()));

        let record = resolver.history("checkout").await.unwrap().unwrap();
        assert!(record.fallback_history.is_empty());
        assert_eq!(resolver.metrics().ambiguous, 1);
    }
}

mod budget_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhausted_by_slow_page() {
        let store = LocatorStore::in_memory();
        let warmup = resolver_with(store.clone());
        let page = drifted_login(&warmup).await;
        warmup.resolve(&login(), &page).await.unwrap();
        let before = warmup.history("login-submit-button").await.unwrap().unwrap();

        let config = HealingConfig::default()
            .with_provider_timeout(100)
            .with_resolution_timeout(250);
        let resolver = Resolver::new(config, store).unwrap();
        let slow = MockPage::new()
            .with_element("login", login_button("submit-42"))
            .with_delay(Duration::from_secs(1));

        let err = resolver.resolve(&login(), &slow).await.unwrap_err();
        match &err {
            SanarError::Timeout {
                budget_ms,
                attempted,
                ..
            } => {
                assert_eq!(*budget_ms, 250);
                assert_eq!(*attempted, 3);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(err
            .attempts()
            .iter()
            .all(|a| a.outcome == AttemptOutcome::TimedOut));

        let after = resolver.history("login-submit-button").await.unwrap().unwrap();
        let fallback = LocatorDescriptor::xpath(TEXT_XPATH);
        let (was, now) = (
            before.fallback(&fallback).unwrap(),
            after.fallback(&fallback).unwrap(),
        );
        assert_eq!(now.stats.success_count, was.stats.success_count);
        assert_eq!(now.stats.failure_count, was.stats.failure_count + 1);
        assert_eq!(
            after.primary_stats.success_count,
            before.primary_stats.success_count
        );
        assert_eq!(after.fallback_history.len(), before.fallback_history.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_query_skipped_within_budget() {
        let resolver = resolver_with(LocatorStore::in_memory());
        let page = drifted_login(&resolver).await;
        page.delay_query(&LocatorDescriptor::css("button#login-btn"), Duration::from_secs(30));

        let result = resolver.resolve(&login(), &page).await.unwrap();
        assert!(result.healed);
        assert_eq!(result.attempts[1].outcome, AttemptOutcome::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresponsive_page_reports_timeout() {
        let config = HealingConfig::default()
            .with_provider_timeout(100)
            .with_resolution_timeout(10_000);
        let resolver = Resolver::new(config, LocatorStore::in_memory()).unwrap();
        let page = MockPage::new()
            .with_element("login", login_button("login-btn"))
            .with_delay(Duration::from_secs(5));

        let started = tokio::time::Instant::now();
        let err = resolver
            .resolve(&LocatorDescriptor::css("button#login-btn"), &page)
            .await
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_millis(10_000));
        match &err {
            SanarError::Timeout {
                budget_ms,
                attempted,
                attempts,
                ..
            } => {
                assert_eq!(*budget_ms, 10_000);
                assert!(!attempts.is_empty());
                assert_eq!(*attempted, attempts.len());
                assert!(attempts.iter().all(|a| a.outcome == AttemptOutcome::TimedOut));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(resolver.metrics().timeouts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_timeout_still_not_found() {
        let resolver = resolver_with(LocatorStore::in_memory());
        let primary = LocatorDescriptor::css("button#login-btn.primary");
        let page = MockPage::new();
        page.delay_query(&primary, Duration::from_secs(30));

        let err = resolver.resolve(&primary, &page).await.unwrap_err();
        assert!(matches!(err, SanarError::NotFound { .. }));
        assert_eq!(err.attempts()[0].outcome, AttemptOutcome::TimedOut);
        assert!(err.attempts()[1..]
            .iter()
            .all(|a| a.outcome == AttemptOutcome::NoMatch));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_query() {
        let resolver = resolver_with(LocatorStore::in_memory());
        let page = MockPage::new()
            .with_element("login", login_button("login-btn"))
            .with_delay(Duration::from_secs(1));
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = resolver
            .resolve_with_cancel(&login(), &page, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, SanarError::Cancelled { attempted: 1, .. }));
        assert!(resolver.history("login-submit-button").await.unwrap().is_none());
        assert_eq!(resolver.metrics().cancellations, 1);
    }
}

mod concurrency_tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_workers_share_history() {
        let resolver = Arc::new(resolver_with(LocatorStore::in_memory()));
        let page = Arc::new(MockPage::new().with_element("login", login_button("login-btn")));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                let page = Arc::clone(&page);
                tokio::spawn(async move { resolver.resolve(&login(), page.as_ref()).await })
            })
            .collect();
        for worker in workers {
            assert!(!worker.await.unwrap().unwrap().healed);
        }

        let record = resolver.history("login-submit-button").await.unwrap().unwrap();
        assert_eq!(record.primary_stats.success_count, 8);
        assert_eq!(resolver.metrics().primary_hits, 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_heals_count_every_success() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = Arc::new(resolver_with(LocatorStore::open_dir(dir.path()).unwrap()));
        let page = Arc::new(drifted_login(&resolver).await);
        resolver.resolve(&login(), page.as_ref()).await.unwrap();

        let workers: Vec<_> = (0..6)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                let page = Arc::clone(&page);
                tokio::spawn(async move { resolver.resolve(&login(), page.as_ref()).await })
            })
            .collect();
        for worker in workers {
            assert!(worker.await.unwrap().unwrap().healed);
        }

        let record = resolver.history("login-submit-button").await.unwrap().unwrap();
        let entry = record.fallback(&LocatorDescriptor::xpath(TEXT_XPATH)).unwrap();
        assert_eq!(entry.stats.success_count, 7);
        assert_eq!(record.primary_stats.failure_count, 7);
    }
}
