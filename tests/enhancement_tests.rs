/// Enhancement pipeline tests
///
/// Additions-driven metadata enrichment republishing corrected records in
/// place through the change dispatcher.
/// Run with: cargo test --test enhancement_tests

use std::sync::Arc;
use std::time::Duration;

use mediapager::{
    ChangeDispatcher, ItemChange, OffsetPager, Page, PageRequest, Pager, PagerConfig, changes,
};

#[derive(Debug, Clone, PartialEq)]
struct Track {
    id: usize,
    title: String,
    play_count: Option<u32>,
}

fn track_pager(total: usize, page_size: usize) -> OffsetPager<Track> {
    OffsetPager::from_fn(
        move |request: PageRequest| async move {
            let start = request.offset.min(total);
            let end = (request.offset + request.limit).min(total);
            let items = (start..end)
                .map(|id| Track {
                    id,
                    title: format!("track {id}"),
                    play_count: None,
                })
                .collect();
            Ok(Page::new(items, Some(total)))
        },
        PagerConfig::new(page_size),
    )
    .unwrap()
}

#[tokio::test]
async fn additions_emit_only_newly_appended_items() {
    let pager = track_pager(20, 10);
    let mut additions = pager.observe_additions();
    let mut items = pager.observe_items();

    pager.fetch_at(0, 10);
    let first = tokio::time::timeout(Duration::from_secs(2), additions.recv())
        .await
        .expect("no additions for page 0")
        .unwrap();
    assert_eq!(first.len(), 10);
    assert_eq!(first[0].id, 0);

    pager.fetch_at(10, 10);
    let second = tokio::time::timeout(Duration::from_secs(2), additions.recv())
        .await
        .expect("no additions for page 1")
        .unwrap();
    assert_eq!(second.len(), 10);
    assert_eq!(second[0].id, 10, "previously-seen items are not re-emitted");

    items.changed().await.ok();
    assert_eq!(items.borrow().resident_len(), 20);
}

#[tokio::test]
async fn dispatched_changes_patch_items_in_place() {
    let pager: Arc<dyn Pager<Track>> = Arc::new(track_pager(10, 10));
    let dispatcher = ChangeDispatcher::new();
    let subscription = changes::attach(&dispatcher, Arc::clone(&pager));

    let mut items = pager.observe_items();
    pager.fetch_at(0, 10);
    tokio::time::timeout(Duration::from_secs(2), items.changed())
        .await
        .expect("page never resolved")
        .unwrap();
    let before = items.borrow_and_update().clone();
    assert_eq!(before.get(3).unwrap().play_count, None);

    // The enrichment fetch learned play counts for two tracks.
    dispatcher.dispatch(vec![
        ItemChange::new(
            |track: &Track| track.id == 3,
            |track| track.play_count = Some(42),
        ),
        ItemChange::new(
            |track: &Track| track.id == 7,
            |track| track.play_count = Some(7),
        ),
    ]);

    tokio::time::timeout(Duration::from_secs(2), items.changed())
        .await
        .expect("patched buffer never republished")
        .unwrap();
    let after = items.borrow().clone();
    assert_eq!(after.get(3).unwrap().play_count, Some(42));
    assert_eq!(after.get(7).unwrap().play_count, Some(7));
    assert_eq!(after.get(0).unwrap().play_count, None);

    // Identity and positions are untouched.
    assert_eq!(after.get(3).unwrap().id, 3);
    assert_eq!(after.len(), before.len());
    assert_eq!(*pager.observe_size().borrow(), 10);

    pager.disconnect();
    drop(dispatcher);
    subscription.await.unwrap();
}

#[tokio::test]
async fn unmatched_changes_do_not_republish() {
    let pager = track_pager(5, 5);
    let mut items = pager.observe_items();
    pager.fetch_at(0, 5);
    tokio::time::timeout(Duration::from_secs(2), items.changed())
        .await
        .expect("page never resolved")
        .unwrap();
    items.borrow_and_update();

    pager.apply_changes(&[ItemChange::new(
        |track: &Track| track.id == 999,
        |track| track.play_count = Some(1),
    )]);
    assert!(
        !items.has_changed().unwrap(),
        "no emission when nothing matched"
    );
}
