/// Truncation handling
///
/// A later-arriving page may report a smaller total than already-buffered
/// positions imply; the buffer is clamped and out-of-range page keys are
/// invalidated so the region can be re-resolved.
/// Run with: cargo test --test truncation_tests

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use mediapager::{OffsetPager, Page, PageRequest, Pager, PagerConfig};
use tokio::sync::watch;

async fn next_size(rx: &mut watch::Receiver<usize>) -> usize {
    tokio::time::timeout(Duration::from_secs(2), rx.changed())
        .await
        .expect("timed out waiting for size")
        .unwrap();
    *rx.borrow_and_update()
}

#[tokio::test]
async fn smaller_total_truncates_buffer_and_size() {
    // Page 0 claims 100 items; page 1 corrects the total down to 30.
    let pager = OffsetPager::from_fn(
        |request: PageRequest| async move {
            match request.page {
                0 => Ok(Page::new((0..50).collect(), Some(100))),
                _ => Ok(Page::new(Vec::<usize>::new(), Some(30))),
            }
        },
        PagerConfig::new(50),
    )
    .unwrap();

    let mut size = pager.observe_size();
    let items = pager.observe_items();

    pager.fetch_at(0, 50);
    assert_eq!(next_size(&mut size).await, 100);

    pager.fetch_at(50, 50);
    assert_eq!(next_size(&mut size).await, 30);

    let buffer = items.borrow().clone();
    assert_eq!(buffer.len(), 30);
    assert_eq!(buffer.resident_len(), 30);
    assert_eq!(pager.total(), Some(30));
}

#[tokio::test]
async fn windows_beyond_the_truncated_total_are_not_fetched() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let pager = OffsetPager::from_fn(
        move |request: PageRequest| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                match request.page {
                    0 => Ok(Page::new((0..50).collect::<Vec<usize>>(), Some(100))),
                    _ => Ok(Page::new(Vec::new(), Some(30))),
                }
            }
        },
        PagerConfig::new(50),
    )
    .unwrap();

    let mut size = pager.observe_size();
    pager.fetch_at(0, 50);
    assert_eq!(next_size(&mut size).await, 100);
    pager.fetch_at(50, 10);
    assert_eq!(next_size(&mut size).await, 30);

    // Page 1 started at offset 50 >= total 30, so its key was invalidated,
    // but the window now lies beyond the collection and resolves to nothing.
    pager.fetch_at(50, 10);
    pager.fetch_at(29, 0);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
