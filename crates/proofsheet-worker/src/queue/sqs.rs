use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::{Message, MessageAttributeValue};
use aws_sdk_sqs::Client as SqsClient;

use super::{
    MessageQueue, OutboundMessage, QueueError, QueueMessage, QueueResult, MAX_DELAY_SECONDS,
    MAX_RECEIVE_BATCH, MAX_VISIBILITY_TIMEOUT_SECONDS,
};

/// Amazon SQS backend
#[derive(Clone)]
pub struct SqsQueue {
    client: SqsClient,
}

impl SqsQueue {
    /// Build a client from the default AWS credential chain. `endpoint` points
    /// at an SQS-compatible service such as LocalStack.
    pub async fn new(region: Option<String>, endpoint: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region));
        }
        if let Some(endpoint) = endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;

        tracing::info!(region = ?config.region(), "SQS client initialized");
        Self::from_client(SqsClient::new(&config))
    }

    pub fn from_client(client: SqsClient) -> Self {
        Self { client }
    }

    fn convert(message: &Message) -> Option<QueueMessage> {
        let Some(receipt_handle) = message.receipt_handle() else {
            tracing::warn!(message_id = ?message.message_id(), "Received message without receipt handle");
            return None;
        };

        let attributes = message
            .message_attributes()
            .map(|attrs| {
                attrs
                    .iter()
                    .filter_map(|(name, value)| {
                        value
                            .string_value()
                            .map(|v| (name.clone(), v.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(QueueMessage {
            id: message.message_id().unwrap_or_default().to_string(),
            receipt_handle: receipt_handle.to_string(),
            body: message.body().unwrap_or_default().to_string(),
            attributes,
        })
    }
}

fn string_attribute(value: String) -> QueueResult<MessageAttributeValue> {
    MessageAttributeValue::builder()
        .data_type("String")
        .string_value(value)
        .build()
        .map_err(|e| QueueError::Send(e.to_string()))
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn receive(
        &self,
        queue_url: &str,
        max_messages: i32,
        wait_seconds: i32,
    ) -> QueueResult<Vec<QueueMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(max_messages.clamp(1, MAX_RECEIVE_BATCH))
            .wait_time_seconds(wait_seconds.clamp(0, 20))
            .message_attribute_names("All")
            .send()
            .await
            .map_err(|e| QueueError::Receive(DisplayErrorContext(&e).to_string()))?;

        let messages: Vec<QueueMessage> = output.messages().iter().filter_map(Self::convert).collect();
        tracing::trace!(queue_url = %queue_url, count = messages.len(), "Received messages");
        Ok(messages)
    }

    async fn send(&self, queue_url: &str, message: OutboundMessage) -> QueueResult<()> {
        let delay = message.delay_seconds.clamp(0, MAX_DELAY_SECONDS);
        let mut request = self
            .client
            .send_message()
            .queue_url(queue_url)
            .message_body(message.body)
            .delay_seconds(delay);

        for (name, value) in message.attributes {
            request = request.message_attributes(name, string_attribute(value)?);
        }

        let output = request
            .send()
            .await
            .map_err(|e| QueueError::Send(DisplayErrorContext(&e).to_string()))?;

        tracing::debug!(
            queue_url = %queue_url,
            message_id = ?output.message_id(),
            delay_seconds = delay,
            "Message sent"
        );
        Ok(())
    }

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> QueueResult<()> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Delete(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn change_visibility(
        &self,
        queue_url: &str,
        receipt_handle: &str,
        timeout_seconds: i32,
    ) -> QueueResult<()> {
        self.client
            .change_message_visibility()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .visibility_timeout(timeout_seconds.clamp(0, MAX_VISIBILITY_TIMEOUT_SECONDS))
            .send()
            .await
            .map_err(|e| QueueError::Visibility(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "sqs"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_string_attributes_only() {
        let message = Message::builder()
            .message_id("m-1")
            .receipt_handle("r-1")
            .body("{}")
            .message_attributes("attemptNumber", string_attribute("2".to_string()).unwrap())
            .message_attributes(
                "blob",
                MessageAttributeValue::builder()
                    .data_type("Binary")
                    .binary_value(aws_sdk_sqs::primitives::Blob::new(vec![1, 2, 3]))
                    .build()
                    .unwrap(),
            )
            .build();

        let converted = SqsQueue::convert(&message).unwrap();
        assert_eq!(converted.id, "m-1");
        assert_eq!(converted.receipt_handle, "r-1");
        assert_eq!(converted.attributes.len(), 1);
        assert_eq!(converted.attributes["attemptNumber"], "2");
    }

    #[test]
    fn messages_without_receipt_are_dropped() {
        let message = Message::builder().message_id("m-1").body("{}").build();
        assert!(SqsQueue::convert(&message).is_none());
    }
}
