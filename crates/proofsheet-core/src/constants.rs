//! Application-wide constants.

/// Prefix every gallery identifier carries.
pub const GALLERY_ID_PREFIX: &str = "gal_";

/// Prefix every photo identifier carries.
pub const PHOTO_ID_PREFIX: &str = "photo_";

/// Extension given to every derived rendition, whatever the original format.
pub const RENDITION_EXTENSION: &str = ".jpg";

/// Content type of every derived rendition.
pub const RENDITION_CONTENT_TYPE: &str = "image/jpeg";

pub const DEFAULT_THUMBNAIL_WIDTH: u32 = 200;
pub const DEFAULT_THUMBNAIL_HEIGHT: u32 = 200;
pub const DEFAULT_OPTIMIZED_MAX_WIDTH: u32 = 1920;
pub const DEFAULT_OPTIMIZED_MAX_HEIGHT: u32 = 1080;
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Attempts after which a dead-lettered photo is marked `failed_permanent`.
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 5;

/// Keys of the string-to-string metadata map persisted on a photo record.
pub mod metadata_keys {
    pub const CAMERA_MODEL: &str = "cameraModel";
    pub const DATE_TAKEN: &str = "dateTaken";
    pub const ISO: &str = "iso";
    pub const APERTURE: &str = "aperture";
    pub const SHUTTER_SPEED: &str = "shutterSpeed";
    pub const FOCAL_LENGTH: &str = "focalLength";
    pub const GPS: &str = "gps";

    pub const FAILURE_REASON: &str = "failureReason";
    pub const FAILURE_ATTEMPTS: &str = "failureAttempts";
    pub const FIRST_FAILED_AT: &str = "firstFailedAt";
    pub const LAST_RETRY_AT: &str = "lastRetryAt";

    /// Diagnostics removed again once a photo processes successfully.
    pub const FAILURE_KEYS: [&str; 4] = [
        FAILURE_REASON,
        FAILURE_ATTEMPTS,
        FIRST_FAILED_AT,
        LAST_RETRY_AT,
    ];
}

/// Names of the queue message attributes carrying retry state.
pub mod retry_attributes {
    pub const ATTEMPT_NUMBER: &str = "attemptNumber";
    pub const FIRST_FAILED_AT: &str = "firstFailedAt";
    pub const LAST_RETRY_AT: &str = "lastRetryAt";
    pub const ERROR_MESSAGE: &str = "errorMessage";
    pub const NOT_BEFORE: &str = "notBefore";
}
