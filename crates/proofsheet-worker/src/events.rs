//! Object-storage event notifications
//!
//! Queue bodies are S3 event notifications. Object keys arrive URL-encoded
//! with `+` for spaces. The `s3:TestEvent` sent when a notification is first
//! configured has no `Records` and parses to an empty list.

use percent_encoding::percent_decode_str;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Malformed event body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Object key is not valid UTF-8 after decoding: {0}")]
    KeyEncoding(String),
}

/// One object referenced by an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

#[derive(Debug, Deserialize)]
struct S3Event {
    #[serde(rename = "Records", default)]
    records: Vec<S3EventRecord>,
}

#[derive(Debug, Deserialize)]
struct S3EventRecord {
    #[serde(rename = "eventName", default)]
    event_name: Option<String>,
    s3: S3Entity,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: S3Bucket,
    object: S3Object,
}

#[derive(Debug, Deserialize)]
struct S3Bucket {
    name: String,
}

#[derive(Debug, Deserialize)]
struct S3Object {
    key: String,
}

/// Objects referenced by `body`, in record order.
pub fn parse_s3_event(body: &str) -> Result<Vec<ObjectRef>, EventError> {
    let event: S3Event = serde_json::from_str(body)?;

    event
        .records
        .into_iter()
        .map(|record| -> Result<ObjectRef, EventError> {
            tracing::trace!(event_name = ?record.event_name, "Parsing event record");
            Ok(ObjectRef {
                bucket: record.s3.bucket.name,
                key: decode_object_key(&record.s3.object.key)?,
            })
        })
        .collect()
}

/// Decode an event-encoded object key.
pub fn decode_object_key(raw: &str) -> Result<String, EventError> {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| EventError::KeyEncoding(raw.to_string()))
}

/// Build an event body referencing `objects`, in the notification shape.
pub fn s3_event_body(objects: &[ObjectRef]) -> String {
    let records: Vec<serde_json::Value> = objects
        .iter()
        .map(|object| {
            serde_json::json!({
                "eventSource": "aws:s3",
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": { "name": object.bucket },
                    "object": { "key": encode_object_key(&object.key) },
                },
            })
        })
        .collect();
    serde_json::json!({ "Records": records }).to_string()
}

fn encode_object_key(key: &str) -> String {
    use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

    const KEY_SET: &AsciiSet = &NON_ALPHANUMERIC
        .remove(b'/')
        .remove(b'-')
        .remove(b'_')
        .remove(b'.')
        .remove(b'~')
        .remove(b' ');
    utf8_percent_encode(key, KEY_SET).to_string().replace(' ', "+")
}
