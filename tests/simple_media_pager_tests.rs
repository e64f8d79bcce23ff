/// SimpleMediaPager tests
///
/// Lazy discovery with compute-once memoization.
/// Run with: cargo test --test simple_media_pager_tests

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use mediapager::{Pager, PagerError, SimpleMediaPager};

#[tokio::test]
async fn discovery_runs_once_across_repeated_fetches() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let pager = SimpleMediaPager::new(move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec!["videos", "albums"])
        }
    });

    let mut items = pager.observe_items();
    pager.fetch_at(0, 2);
    pager.fetch_at(0, 2);
    pager.fetch_at(1, 0);

    tokio::time::timeout(Duration::from_secs(2), items.changed())
        .await
        .expect("discovery never resolved")
        .unwrap();
    assert_eq!(
        items.borrow().resident().copied().collect::<Vec<_>>(),
        vec!["videos", "albums"]
    );
    assert_eq!(pager.total(), Some(2));

    pager.fetch_at(0, 2);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1, "thunk must be memoized");
}

#[tokio::test]
async fn concurrent_first_accesses_coalesce() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let pager = Arc::new(SimpleMediaPager::new(move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(vec![1, 2, 3])
        }
    }));

    let mut handles = vec![];
    for _ in 0..5 {
        let pager = Arc::clone(&pager);
        handles.push(tokio::spawn(async move {
            pager.fetch_at(0, 3);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mut items = pager.observe_items();
    if items.borrow_and_update().resident_len() < 3 {
        tokio::time::timeout(Duration::from_secs(2), items.changed())
            .await
            .expect("discovery never resolved")
            .unwrap();
    }
    assert_eq!(items.borrow().resident_len(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn discovery_failure_surfaces_on_the_error_channel() {
    let pager: SimpleMediaPager<usize> =
        SimpleMediaPager::new(|| async { Err(PagerError::fetch("probe failed")) });
    let mut errors = pager.observe_error();

    pager.fetch_at(0, 1);
    let err = tokio::time::timeout(Duration::from_secs(2), errors.recv())
        .await
        .expect("no error emitted")
        .unwrap();
    assert!(matches!(err, PagerError::Fetch(_)));
    assert!(pager.is_connected(), "pager survives a failed discovery");
}
