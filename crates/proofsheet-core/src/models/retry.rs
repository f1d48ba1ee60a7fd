use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::constants::retry_attributes;

/// Retry state carried as queue message attributes.
///
/// A message that reaches the dead-letter path for the first time carries no
/// attributes, which reads as attempt zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryMetadata {
    pub attempt_number: u32,
    pub first_failed_at: Option<DateTime<Utc>>,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    /// Earliest time the primary consumer may process the message.
    pub not_before: Option<DateTime<Utc>>,
}

impl RetryMetadata {
    /// Read retry state from message attributes. Unparseable values are
    /// treated as absent.
    pub fn from_attributes(attributes: &HashMap<String, String>) -> Self {
        let timestamp = |name: &str| {
            attributes
                .get(name)
                .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
                .map(|dt| dt.with_timezone(&Utc))
        };

        RetryMetadata {
            attempt_number: attributes
                .get(retry_attributes::ATTEMPT_NUMBER)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0),
            first_failed_at: timestamp(retry_attributes::FIRST_FAILED_AT),
            last_retry_at: timestamp(retry_attributes::LAST_RETRY_AT),
            error_message: attributes
                .get(retry_attributes::ERROR_MESSAGE)
                .filter(|v| !v.is_empty())
                .cloned(),
            not_before: timestamp(retry_attributes::NOT_BEFORE),
        }
    }

    pub fn to_attributes(&self) -> HashMap<String, String> {
        let mut attributes = HashMap::new();
        attributes.insert(
            retry_attributes::ATTEMPT_NUMBER.to_string(),
            self.attempt_number.to_string(),
        );
        if let Some(at) = self.first_failed_at {
            attributes.insert(retry_attributes::FIRST_FAILED_AT.to_string(), rfc3339(at));
        }
        if let Some(at) = self.last_retry_at {
            attributes.insert(retry_attributes::LAST_RETRY_AT.to_string(), rfc3339(at));
        }
        if let Some(message) = &self.error_message {
            attributes.insert(retry_attributes::ERROR_MESSAGE.to_string(), message.clone());
        }
        if let Some(at) = self.not_before {
            attributes.insert(retry_attributes::NOT_BEFORE.to_string(), rfc3339(at));
        }
        attributes
    }

    /// State for the next re-enqueue: attempt incremented, first failure
    /// stamped if unset, last retry stamped now. Any deferral is cleared.
    pub fn next_attempt(&self, now: DateTime<Utc>) -> Self {
        RetryMetadata {
            attempt_number: self.attempt_number.saturating_add(1),
            first_failed_at: self.first_failed_at.or(Some(now)),
            last_retry_at: Some(now),
            error_message: self.error_message.clone(),
            not_before: None,
        }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_not_before(mut self, not_before: Option<DateTime<Utc>>) -> Self {
        self.not_before = not_before;
        self
    }
}

/// RFC 3339 with second precision and a `Z` suffix, as stored in metadata maps
/// and message attributes.
pub fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
