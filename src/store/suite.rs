//! Behavior every `CounterStore` backend must share.

/// Expands to the shared store tests for a backend built by `$make`.
macro_rules! counter_store_suite {
    ($make:expr) => {
        mod suite {
            use super::*;
            use crate::store::{CounterStore, UsageRecord};
            use std::sync::Arc;

            const WINDOW_MS: u64 = 1_000;

            #[tokio::test]
            async fn test_get_missing_is_none() {
                let store = $make;
                assert_eq!(store.get("missing").await.unwrap(), None);
            }

            #[tokio::test]
            async fn test_increment_creates_record() {
                let store = $make;

                let record = store.increment("ns", 3, WINDOW_MS, 500).await.unwrap();
                assert_eq!(record, UsageRecord { count: 3, window_start: 500 });

                // The window start is fixed at creation.
                let record = store.increment("ns", 2, WINDOW_MS, 900).await.unwrap();
                assert_eq!(record, UsageRecord { count: 5, window_start: 500 });
                assert_eq!(store.get("ns").await.unwrap(), Some(record));
            }

            #[tokio::test]
            async fn test_increment_rolls_expired_window() {
                let store = $make;

                store.increment("ns", 5, WINDOW_MS, 0).await.unwrap();
                let record = store.increment("ns", 1, WINDOW_MS, 999).await.unwrap();
                assert_eq!(record, UsageRecord { count: 6, window_start: 0 });

                let record = store.increment("ns", 1, WINDOW_MS, 1_000).await.unwrap();
                assert_eq!(record, UsageRecord { count: 1, window_start: 1_000 });
            }

            #[tokio::test]
            async fn test_reset_clears_record() {
                let store = $make;

                store.increment("ns", 4, WINDOW_MS, 0).await.unwrap();
                store.reset("ns").await.unwrap();
                assert_eq!(store.get("ns").await.unwrap(), None);

                // Resetting an unknown namespace is a no-op.
                store.reset("never-seen").await.unwrap();
            }

            #[tokio::test]
            async fn test_namespaces_are_independent() {
                let store = $make;

                store.increment("a", 7, WINDOW_MS, 0).await.unwrap();
                store.increment("b", 1, WINDOW_MS, 0).await.unwrap();

                assert_eq!(store.get("a").await.unwrap().map(|r| r.count), Some(7));
                assert_eq!(store.get("b").await.unwrap().map(|r| r.count), Some(1));
            }

            #[tokio::test]
            async fn test_acquire_admits_up_to_limit() {
                let store = $make;

                for expected in 1..=3 {
                    let acq = store.acquire("ns", 1, 3, WINDOW_MS, 0).await.unwrap();
                    assert!(acq.admitted);
                    assert_eq!(acq.record.count, expected);
                }

                let acq = store.acquire("ns", 1, 3, WINDOW_MS, 10).await.unwrap();
                assert!(!acq.admitted);
                assert_eq!(acq.record.count, 3);
            }

            #[tokio::test]
            async fn test_acquire_refuses_amount_over_remaining() {
                let store = $make;

                store.acquire("ns", 8, 10, WINDOW_MS, 0).await.unwrap();
                let acq = store.acquire("ns", 3, 10, WINDOW_MS, 0).await.unwrap();
                assert!(!acq.admitted);

                let acq = store.acquire("ns", 2, 10, WINDOW_MS, 0).await.unwrap();
                assert!(acq.admitted);
                assert_eq!(acq.record.count, 10);
            }

            #[tokio::test]
            async fn test_acquire_rolls_expired_window() {
                let store = $make;

                store.acquire("ns", 3, 3, WINDOW_MS, 0).await.unwrap();
                assert!(!store.acquire("ns", 1, 3, WINDOW_MS, 999).await.unwrap().admitted);

                let acq = store.acquire("ns", 1, 3, WINDOW_MS, 1_000).await.unwrap();
                assert!(acq.admitted);
                assert_eq!(acq.record, UsageRecord { count: 1, window_start: 1_000 });
            }

            #[tokio::test]
            async fn test_refused_acquire_writes_nothing() {
                let store = $make;

                let acq = store.acquire("ns", 5, 3, WINDOW_MS, 0).await.unwrap();
                assert!(!acq.admitted);
                assert_eq!(store.get("ns").await.unwrap(), None);
            }

            #[tokio::test]
            async fn test_concurrent_increments_are_not_lost() {
                let store = Arc::new($make);

                let tasks: Vec<_> = (0..100)
                    .map(|_| {
                        let store = store.clone();
                        tokio::spawn(async move { store.increment("ns", 1, WINDOW_MS, 0).await })
                    })
                    .collect();
                for task in futures::future::join_all(tasks).await {
                    task.unwrap().unwrap();
                }

                assert_eq!(store.get("ns").await.unwrap().map(|r| r.count), Some(100));
            }

            #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
            async fn test_concurrent_increments_across_rollover_are_not_lost() {
                let store = Arc::new($make);
                store.increment("ns", 5, WINDOW_MS, 0).await.unwrap();

                let tasks: Vec<_> = (0..16)
                    .map(|_| {
                        let store = store.clone();
                        tokio::spawn(
                            async move { store.increment("ns", 1, WINDOW_MS, 5_000).await },
                        )
                    })
                    .collect();
                for task in futures::future::join_all(tasks).await {
                    task.unwrap().unwrap();
                }

                assert_eq!(
                    store.get("ns").await.unwrap(),
                    Some(UsageRecord { count: 16, window_start: 5_000 })
                );
            }

            #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
            async fn test_concurrent_acquire_never_overshoots() {
                let store = Arc::new($make);

                let tasks: Vec<_> = (0..100)
                    .map(|_| {
                        let store = store.clone();
                        tokio::spawn(async move { store.acquire("ns", 1, 10, WINDOW_MS, 0).await })
                    })
                    .collect();

                let mut admitted = 0;
                for task in futures::future::join_all(tasks).await {
                    if task.unwrap().unwrap().admitted {
                        admitted += 1;
                    }
                }

                assert_eq!(admitted, 10);
                assert_eq!(store.get("ns").await.unwrap().map(|r| r.count), Some(10));
            }
        }
    };
}
