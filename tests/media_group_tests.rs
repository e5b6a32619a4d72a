use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::time::{advance, sleep, Duration};

use photoshoot_bot::media_group::{
    MediaGroupAggregator, PhotoRegistration, FINALIZE_DELAY, QUIET_PERIOD,
};

/// Finalize yields the batch exactly once per group
#[tokio::test(start_paused = true)]
async fn test_finalize_fires_at_most_once() {
    let aggregator = MediaGroupAggregator::new();

    aggregator
        .register_photo("g1", 1, 100, "file-1".to_string())
        .await;
    advance(FINALIZE_DELAY + Duration::from_millis(100)).await;

    let batch = aggregator.try_finalize("g1").await.expect("batch ready");
    assert_eq!(batch.photo_count, 1);
    assert_eq!(batch.owner_user_id, 1);
    assert_eq!(batch.chat_id, 100);

    // A second attempt (a stale scheduled task) must be a no-op
    assert!(aggregator.try_finalize("g1").await.is_none());

    // The buffer survives finalization until the user acts on it
    assert!(aggregator.contains("g1").await);
}

/// A burst of photos with a duplicate collapses into one deduplicated batch
#[tokio::test(start_paused = true)]
async fn test_burst_collapses_into_single_batch() {
    let aggregator = MediaGroupAggregator::new();

    for i in 1..=5 {
        aggregator
            .register_photo("g1", 1, 100, format!("file-{i}"))
            .await;
        advance(Duration::from_millis(60)).await;
    }
    // Telegram occasionally re-delivers a photo
    let registration = aggregator
        .register_photo("g1", 1, 100, "file-3".to_string())
        .await;
    assert!(matches!(
        registration,
        PhotoRegistration::AlreadyKnown { count: 5, .. }
    ));

    advance(FINALIZE_DELAY + Duration::from_millis(100)).await;
    let batch = aggregator.try_finalize("g1").await.expect("batch ready");
    assert_eq!(batch.photo_count, 5);
    assert_eq!(
        aggregator.file_paths("g1").await.unwrap(),
        vec!["file-1", "file-2", "file-3", "file-4", "file-5"]
    );
}

/// A photo from another user never lands in someone else's buffer
#[tokio::test(start_paused = true)]
async fn test_foreign_user_rejected() {
    let aggregator = MediaGroupAggregator::new();

    aggregator
        .register_photo("g1", 1, 100, "file-1".to_string())
        .await;
    let registration = aggregator
        .register_photo("g1", 2, 200, "intruder".to_string())
        .await;

    assert_eq!(registration, PhotoRegistration::ForeignUser);
    assert_eq!(aggregator.file_paths("g1").await.unwrap(), vec!["file-1"]);
}

/// An attempt that runs while photos are still arriving steps aside and
/// leaves the group finalizable later
#[tokio::test(start_paused = true)]
async fn test_finalize_respects_quiet_period() {
    let aggregator = MediaGroupAggregator::new();

    aggregator
        .register_photo("g1", 1, 100, "file-1".to_string())
        .await;
    advance(QUIET_PERIOD / 2).await;

    assert!(aggregator.try_finalize("g1").await.is_none());

    advance(FINALIZE_DELAY).await;
    assert!(aggregator.try_finalize("g1").await.is_some());
}

/// Photos arriving past the boundary cannot re-finalize a finished group
#[tokio::test(start_paused = true)]
async fn test_late_photos_do_not_refinalize() {
    let aggregator = MediaGroupAggregator::new();

    aggregator
        .register_photo("g1", 1, 100, "file-1".to_string())
        .await;
    advance(FINALIZE_DELAY - Duration::from_millis(100)).await;
    // One more just before the boundary
    aggregator
        .register_photo("g1", 1, 100, "file-2".to_string())
        .await;
    advance(FINALIZE_DELAY + Duration::from_millis(100)).await;

    let batch = aggregator.try_finalize("g1").await.expect("batch ready");
    assert_eq!(batch.photo_count, 2);

    // And one past it
    aggregator
        .register_photo("g1", 1, 100, "file-3".to_string())
        .await;
    advance(FINALIZE_DELAY + Duration::from_millis(100)).await;
    assert!(aggregator.try_finalize("g1").await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_remove_deletes_buffer() {
    let aggregator = MediaGroupAggregator::new();

    aggregator
        .register_photo("g1", 1, 100, "file-1".to_string())
        .await;
    aggregator.remove("g1").await;

    assert!(!aggregator.contains("g1").await);
    advance(FINALIZE_DELAY * 2).await;
    assert!(aggregator.try_finalize("g1").await.is_none());
}

/// Installing a new finalize task cancels the previously scheduled one
#[tokio::test(start_paused = true)]
async fn test_install_finalize_task_cancels_previous() {
    let aggregator = Arc::new(MediaGroupAggregator::new());
    aggregator
        .register_photo("g1", 1, 100, "file-1".to_string())
        .await;

    let first_ran = Arc::new(AtomicBool::new(false));
    let second_ran = Arc::new(AtomicBool::new(false));

    let first = tokio::spawn({
        let flag = Arc::clone(&first_ran);
        async move {
            sleep(FINALIZE_DELAY).await;
            flag.store(true, Ordering::SeqCst);
        }
    });
    aggregator.install_finalize_task("g1", first).await;

    let second = tokio::spawn({
        let flag = Arc::clone(&second_ran);
        async move {
            sleep(FINALIZE_DELAY).await;
            flag.store(true, Ordering::SeqCst);
        }
    });
    aggregator.install_finalize_task("g1", second).await;

    advance(FINALIZE_DELAY + Duration::from_millis(100)).await;
    sleep(Duration::from_millis(10)).await;

    assert!(!first_ran.load(Ordering::SeqCst));
    assert!(second_ran.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_status_message_attached_after_first_photo() {
    let aggregator = MediaGroupAggregator::new();

    let registration = aggregator
        .register_photo("g1", 1, 100, "file-1".to_string())
        .await;
    assert!(matches!(registration, PhotoRegistration::NewGroup { count: 1 }));

    aggregator.set_status_message("g1", 555).await;

    let registration = aggregator
        .register_photo("g1", 1, 100, "file-2".to_string())
        .await;
    assert!(matches!(
        registration,
        PhotoRegistration::Added {
            count: 2,
            status_message_id: Some(555),
        }
    ));
    assert_eq!(aggregator.status_message_id("g1").await, Some(555));
}

/// Abandoned buffers fall to the TTL sweep
#[tokio::test(start_paused = true)]
async fn test_sweep_stale_evicts_abandoned_groups() {
    let aggregator = MediaGroupAggregator::new();
    let ttl = Duration::from_secs(24 * 3600);

    aggregator
        .register_photo("g1", 1, 100, "file-1".to_string())
        .await;

    assert_eq!(aggregator.sweep_stale(ttl).await, 0);
    advance(ttl + Duration::from_secs(1)).await;
    assert_eq!(aggregator.sweep_stale(ttl).await, 1);
    assert!(!aggregator.contains("g1").await);
}
