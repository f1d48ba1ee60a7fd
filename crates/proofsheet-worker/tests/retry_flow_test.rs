#[path = "helpers/mod.rs"]
mod helpers;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use helpers::fixtures::{gray_jpeg, pending_photo, start, upload_event};
use helpers::{TestEnv, DLQ, PROCESSING_QUEUE, UPLOADS};
use proofsheet_core::{ProcessingStatus, RetryMetadata};
use proofsheet_worker::{
    ConsumerSettings, Disposition, DlqHandler, MessageQueue, QueueConsumer, QueueMessage,
    SchedulerOutcome,
};

const KEY: &str = "gal_1/photo_1/original.jpg";

async fn receive_one(env: &TestEnv, queue_url: &str) -> QueueMessage {
    let mut batch = env.queue.receive(queue_url, 1, 0).await.unwrap();
    assert_eq!(batch.len(), 1, "expected one message on {}", queue_url);
    batch.remove(0)
}

/// One primary attempt followed by the scheduler's decision, at `now`.
async fn fail_once(env: &TestEnv, now: DateTime<Utc>) -> SchedulerOutcome {
    let handler = env.processing_handler();
    let message = receive_one(env, PROCESSING_QUEUE).await;
    assert_eq!(handler.handle_at(&message, now).await, Disposition::Delete);
    env.queue
        .delete(PROCESSING_QUEUE, &message.receipt_handle)
        .await
        .unwrap();

    let dead = receive_one(env, DLQ).await;
    let outcome = env.scheduler().handle_at(&dead, now).await;
    env.queue.delete(DLQ, &dead.receipt_handle).await.unwrap();
    outcome
}

#[tokio::test]
async fn test_persistent_download_failure_ends_failed_permanent() {
    let env = TestEnv::new();
    env.photos
        .insert(pending_photo("gal_1", "photo_1", "original.jpg"))
        .await;
    env.storage.insert(UPLOADS, KEY, gray_jpeg(64, 64), "image/jpeg").await;
    env.storage.set_failure(UPLOADS, Some("S3 download error")).await;
    env.queue
        .push(PROCESSING_QUEUE, &upload_event(KEY), HashMap::new())
        .await;

    let mut now = start();
    let mut delays = Vec::new();
    for expected_attempt in 1..=5 {
        match fail_once(&env, now).await {
            SchedulerOutcome::Requeued { attempt, delay } => {
                assert_eq!(attempt, expected_attempt);
                delays.push(delay.as_secs());
                now += chrono::Duration::from_std(delay).unwrap();
            }
            other => panic!("attempt {} was not requeued: {:?}", expected_attempt, other),
        }

        let photo = env.photos.get("photo_1").await.unwrap();
        assert_eq!(photo.processing_status, ProcessingStatus::Failed);
    }
    assert_eq!(delays, vec![60, 300, 900, 3600, 14400]);

    // Requeues never exceed the queue's delay limit; longer waits ride on notBefore.
    let requeued = env.queue.sent(PROCESSING_QUEUE).await;
    let sent_delays: Vec<i32> = requeued.iter().map(|m| m.delay_seconds).collect();
    assert_eq!(sent_delays, vec![60, 300, 900, 900, 900]);
    assert!(requeued[3].attributes.contains_key("notBefore"));

    let outcome = fail_once(&env, now).await;
    assert_eq!(
        outcome,
        SchedulerOutcome::MarkedPermanent {
            photos: vec!["photo_1".to_string()]
        }
    );

    let photo = env.photos.get("photo_1").await.unwrap();
    assert_eq!(photo.processing_status, ProcessingStatus::FailedPermanent);
    assert!(photo.metadata["failureReason"].contains("S3 download error"));
    assert_eq!(photo.metadata["failureAttempts"], "5");
    assert_eq!(photo.metadata["firstFailedAt"], "2024-06-01T09:00:00Z");
    assert!(photo.metadata.contains_key("lastRetryAt"));

    assert_eq!(env.queue.visible_count(PROCESSING_QUEUE).await, 0);
    assert_eq!(env.queue.visible_count(DLQ).await, 0);
}

#[tokio::test]
async fn test_failing_duplicate_delivery_keeps_completed_record() {
    let env = TestEnv::new();
    env.photos
        .insert(pending_photo("gal_1", "photo_1", "original.jpg"))
        .await;
    env.storage.insert(UPLOADS, KEY, gray_jpeg(64, 64), "image/jpeg").await;
    env.queue
        .push(PROCESSING_QUEUE, &upload_event(KEY), HashMap::new())
        .await;

    let message = receive_one(&env, PROCESSING_QUEUE).await;
    let disposition = env.processing_handler().handle_at(&message, start()).await;
    assert_eq!(disposition, Disposition::Delete);
    let completed = env.photos.get("photo_1").await.unwrap();
    assert_eq!(completed.processing_status, ProcessingStatus::Completed);

    // The same notification arrives again, and every attempt at it fails.
    env.storage.set_failure(UPLOADS, Some("S3 download error")).await;
    env.queue
        .push(PROCESSING_QUEUE, &upload_event(KEY), HashMap::new())
        .await;

    let mut now = start();
    for _ in 1..=5 {
        match fail_once(&env, now).await {
            SchedulerOutcome::Requeued { delay, .. } => {
                now += chrono::Duration::from_std(delay).unwrap();
            }
            other => panic!("expected a requeue, got {:?}", other),
        }
        let photo = env.photos.get("photo_1").await.unwrap();
        assert_eq!(photo.processing_status, ProcessingStatus::Completed);
    }

    let outcome = fail_once(&env, now).await;
    assert_eq!(outcome, SchedulerOutcome::MarkedPermanent { photos: vec![] });

    let photo = env.photos.get("photo_1").await.unwrap();
    assert_eq!(photo.processing_status, ProcessingStatus::Completed);
    assert_eq!(photo.thumbnail_key, completed.thumbnail_key);
    assert_eq!(photo.optimized_key, completed.optimized_key);
    assert!(!photo.metadata.contains_key("failureReason"));
    assert!(!photo.metadata.contains_key("failureAttempts"));
}

#[tokio::test]
async fn test_recovery_after_transient_failure_clears_diagnostics() {
    let env = TestEnv::new();
    env.photos
        .insert(pending_photo("gal_1", "photo_1", "original.jpg"))
        .await;
    env.storage.insert(UPLOADS, KEY, gray_jpeg(64, 64), "image/jpeg").await;
    env.storage.set_failure(UPLOADS, Some("S3 download error")).await;
    env.queue
        .push(PROCESSING_QUEUE, &upload_event(KEY), HashMap::new())
        .await;

    let outcome = fail_once(&env, start()).await;
    assert!(matches!(outcome, SchedulerOutcome::Requeued { attempt: 1, .. }));
    assert!(env
        .photos
        .get("photo_1")
        .await
        .unwrap()
        .metadata
        .contains_key("failureReason"));

    env.storage.set_failure(UPLOADS, None).await;
    let message = receive_one(&env, PROCESSING_QUEUE).await;
    let disposition = env
        .processing_handler()
        .handle_at(&message, start() + chrono::Duration::minutes(1))
        .await;
    assert_eq!(disposition, Disposition::Delete);

    let photo = env.photos.get("photo_1").await.unwrap();
    assert_eq!(photo.processing_status, ProcessingStatus::Completed);
    assert!(!photo.metadata.contains_key("failureReason"));
}

#[tokio::test]
async fn test_exhausted_attempt_number_is_always_permanent() {
    let env = TestEnv::new();
    env.photos
        .insert(pending_photo("gal_1", "photo_1", "original.jpg"))
        .await;

    let retry = RetryMetadata {
        attempt_number: 5,
        error_message: Some("S3 download error".to_string()),
        ..RetryMetadata::default()
    };
    env.queue
        .push(DLQ, &upload_event(KEY), retry.to_attributes())
        .await;

    let consumer = QueueConsumer::new(
        "dlq-test",
        Arc::new(env.queue.clone()),
        Arc::new(DlqHandler::new(Arc::new(env.scheduler()))),
        ConsumerSettings {
            queue_url: DLQ.to_string(),
            max_workers: 2,
            batch_size: 10,
            wait_seconds: 0,
        },
    );
    assert_eq!(consumer.poll_once().await.unwrap(), 1);

    assert_eq!(env.queue.deleted_count(DLQ).await, 1);
    assert!(env.queue.sent(PROCESSING_QUEUE).await.is_empty());
    let photo = env.photos.get("photo_1").await.unwrap();
    assert_eq!(photo.processing_status, ProcessingStatus::FailedPermanent);
    assert_eq!(photo.metadata["failureAttempts"], "5");
    assert_eq!(photo.metadata["failureReason"], "S3 download error");
}

#[tokio::test]
async fn test_failed_requeue_leaves_message_on_dlq() {
    let env = TestEnv::new();
    env.queue.push(DLQ, &upload_event(KEY), HashMap::new()).await;
    env.queue
        .set_send_failure(PROCESSING_QUEUE, Some("throttled"))
        .await;

    let consumer = QueueConsumer::new(
        "dlq-test",
        Arc::new(env.queue.clone()),
        Arc::new(DlqHandler::new(Arc::new(env.scheduler()))),
        ConsumerSettings {
            queue_url: DLQ.to_string(),
            max_workers: 1,
            batch_size: 10,
            wait_seconds: 0,
        },
    );
    assert_eq!(consumer.poll_once().await.unwrap(), 1);
    assert_eq!(env.queue.deleted_count(DLQ).await, 0);
    assert_eq!(env.queue.in_flight_count(DLQ).await, 1);
}
