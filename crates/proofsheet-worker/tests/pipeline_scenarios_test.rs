#[path = "helpers/mod.rs"]
mod helpers;

use std::collections::HashMap;
use std::sync::Arc;

use helpers::fixtures::{gray_jpeg, upload_event, watermarked_gallery};
use helpers::{TestEnv, OPTIMIZED, PROCESSING_QUEUE, THUMBNAILS, UPLOADS};
use image::GenericImageView;
use proofsheet_core::{Gallery, ProcessingStatus};
use proofsheet_worker::{ConsumerSettings, QueueConsumer};

const KEY: &str = "gal_1/photo_1/original.jpg";

fn luma(img: &image::DynamicImage, x: u32, y: u32) -> u8 {
    let px = img.get_pixel(x, y);
    ((px[0] as u32 + px[1] as u32 + px[2] as u32) / 3) as u8
}

#[tokio::test]
async fn test_full_hd_jpeg_without_exif() {
    let env = TestEnv::new();
    env.galleries.insert(Gallery::new("gal_1", "Wedding")).await;
    env.storage.insert(UPLOADS, KEY, gray_jpeg(1920, 1080), "image/jpeg").await;

    let result = env.pipeline.process(UPLOADS, KEY).await.unwrap();
    assert!(result.created);
    assert_eq!((result.width, result.height), (1920, 1080));

    let photo = env.photos.get("photo_1").await.unwrap();
    assert_eq!(photo.processing_status, ProcessingStatus::Completed);
    assert_eq!((photo.width, photo.height), (1920, 1080));
    assert_eq!(photo.thumbnail_key, "gal_1/photo_1/original.jpg");
    assert_eq!(photo.optimized_key, "gal_1/photo_1/original.jpg");
    assert_eq!(photo.gallery_id, "gal_1");
    assert_eq!(photo.file_name, "original.jpg");
    assert_eq!(photo.mime_type, "image/jpeg");
    assert!(!photo.metadata.contains_key("cameraModel"));
    assert!(!photo.metadata.contains_key("iso"));

    let thumb = env.storage.get(THUMBNAILS, KEY).await.unwrap();
    let thumb = image::load_from_memory(&thumb.data).unwrap();
    assert_eq!(thumb.dimensions(), (200, 200));

    let optimized = env.storage.get(OPTIMIZED, KEY).await.unwrap();
    let optimized = image::load_from_memory(&optimized.data).unwrap();
    assert_eq!(optimized.dimensions(), (1920, 1080));
}

#[tokio::test]
async fn test_oversized_original_is_fit_within_bounds() {
    let env = TestEnv::new();
    let key = "gal_1/photo_2/panorama.jpg";
    env.storage.insert(UPLOADS, key, gray_jpeg(4000, 1000), "image/jpeg").await;

    env.pipeline.process(UPLOADS, key).await.unwrap();

    let optimized = env.storage.get(OPTIMIZED, key).await.unwrap();
    let optimized = image::load_from_memory(&optimized.data).unwrap();
    assert_eq!(optimized.dimensions(), (1920, 480));

    // Original dimensions are what the record keeps.
    let photo = env.photos.get("photo_2").await.unwrap();
    assert_eq!((photo.width, photo.height), (4000, 1000));
}

#[tokio::test]
async fn test_processing_twice_is_idempotent() {
    let env = TestEnv::new();
    env.galleries.insert(Gallery::new("gal_1", "Wedding")).await;
    env.storage.insert(UPLOADS, KEY, gray_jpeg(800, 600), "image/jpeg").await;

    let first = env.pipeline.process(UPLOADS, KEY).await.unwrap();
    let after_first = env.photos.get("photo_1").await.unwrap();
    let second = env.pipeline.process(UPLOADS, KEY).await.unwrap();
    let after_second = env.photos.get("photo_1").await.unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(after_second.processing_status, ProcessingStatus::Completed);
    assert_eq!(after_first.thumbnail_key, after_second.thumbnail_key);
    assert_eq!(after_first.optimized_key, after_second.optimized_key);
    assert_eq!(env.photos.len().await, 1);
    assert_eq!(env.galleries.get("gal_1").await.unwrap().photo_count, 1);
}

#[tokio::test]
async fn test_duplicate_notifications_through_the_consumer() {
    let env = TestEnv::new();
    env.galleries.insert(Gallery::new("gal_1", "Wedding")).await;
    env.storage.insert(UPLOADS, KEY, gray_jpeg(320, 240), "image/jpeg").await;
    for _ in 0..3 {
        env.queue
            .push(PROCESSING_QUEUE, &upload_event(KEY), HashMap::new())
            .await;
    }

    let consumer = QueueConsumer::new(
        "processing-test",
        Arc::new(env.queue.clone()),
        Arc::new(env.processing_handler()),
        ConsumerSettings {
            queue_url: PROCESSING_QUEUE.to_string(),
            max_workers: 1,
            batch_size: 10,
            wait_seconds: 0,
        },
    );
    assert_eq!(consumer.poll_once().await.unwrap(), 3);

    assert_eq!(env.queue.deleted_count(PROCESSING_QUEUE).await, 3);
    assert_eq!(env.photos.len().await, 1);
    assert_eq!(env.galleries.get("gal_1").await.unwrap().photo_count, 1);
}

#[tokio::test]
async fn test_watermark_with_blank_position_lands_bottom_right() {
    let env = TestEnv::new();
    env.galleries
        .insert(watermarked_gallery("gal_1", "© Studio", ""))
        .await;
    env.storage.insert(UPLOADS, KEY, gray_jpeg(1920, 1080), "image/jpeg").await;

    env.pipeline.process(UPLOADS, KEY).await.unwrap();

    let optimized = env.storage.get(OPTIMIZED, KEY).await.unwrap();
    let optimized = image::load_from_memory(&optimized.data).unwrap();
    assert_eq!(optimized.dimensions(), (1920, 1080));

    // Inside the backdrop's padding, just inside the bottom-right margin.
    assert!(luma(&optimized, 1920 - 22 - 3, 1080 - 22 - 3) < 110);
    // Opposite corner and centre are untouched gray.
    assert!(luma(&optimized, 22 + 3, 1080 - 22 - 3).abs_diff(128) <= 8);
    assert!(luma(&optimized, 960, 540).abs_diff(128) <= 8);
    assert!(luma(&optimized, 10, 10).abs_diff(128) <= 8);

    // Thumbnails are never watermarked.
    let thumb = env.storage.get(THUMBNAILS, KEY).await.unwrap();
    let thumb = image::load_from_memory(&thumb.data).unwrap();
    assert!(luma(&thumb, 195, 195).abs_diff(128) <= 8);
}

#[tokio::test]
async fn test_watermark_disabled_without_text() {
    let env = TestEnv::new();
    env.galleries
        .insert(watermarked_gallery("gal_1", "   ", "center"))
        .await;
    env.storage.insert(UPLOADS, KEY, gray_jpeg(800, 600), "image/jpeg").await;

    env.pipeline.process(UPLOADS, KEY).await.unwrap();

    let optimized = env.storage.get(OPTIMIZED, KEY).await.unwrap();
    let optimized = image::load_from_memory(&optimized.data).unwrap();
    assert!(luma(&optimized, 400, 300).abs_diff(128) <= 8);
}
