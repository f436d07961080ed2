use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::Error;

use super::{store::expiry, Conversation, ConversationStore};

/// Item layout. `expires_at` doubles as the table's TTL attribute.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct ConversationItem {
    sender_id: String,
    version: u64,
    expires_at: i64,
    conversation: Conversation,
}

/// Condition guarding a write, with the values its placeholders refer to.
#[derive(Debug, PartialEq)]
struct WriteCondition {
    expression: &'static str,
    values: HashMap<String, AttributeValue>,
}

impl WriteCondition {
    /// First write succeeds over a missing or expired item. Later writes need
    /// the held version and a live item.
    fn put(expected_version: u64, now: i64) -> Self {
        let mut values = HashMap::from([(":now".to_string(), number(now))]);
        let expression = if expected_version == 0 {
            "attribute_not_exists(sender_id) OR expires_at <= :now"
        } else {
            values.insert(":expected".to_string(), number(expected_version));
            "version = :expected AND expires_at > :now"
        };
        Self { expression, values }
    }

    /// Nothing to delete for version 0.
    fn delete(expected_version: u64) -> Option<Self> {
        (expected_version > 0).then(|| Self {
            expression: "version = :expected",
            values: HashMap::from([(":expected".to_string(), number(expected_version))]),
        })
    }
}

fn number(value: impl ToString) -> AttributeValue {
    AttributeValue::N(value.to_string())
}

/// Conversations kept in DynamoDB so that every Lambda instance sees them.
pub struct DynamoConversationStore {
    client: aws_sdk_dynamodb::Client,
    table: String,
    ttl: Duration,
}

impl DynamoConversationStore {
    pub fn new(client: aws_sdk_dynamodb::Client, table: impl Into<String>, ttl: Duration) -> Self {
        Self {
            client,
            table: table.into(),
            ttl,
        }
    }

    fn key(sender_id: &str) -> (String, AttributeValue) {
        ("sender_id".to_string(), AttributeValue::S(sender_id.to_string()))
    }

    fn conflict(sender_id: &str) -> Error {
        Error::Conflict {
            sender_id: sender_id.to_string(),
        }
    }
}

#[async_trait]
impl ConversationStore for DynamoConversationStore {
    async fn get(&self, sender_id: &str) -> Result<Option<Conversation>, Error> {
        let (name, value) = Self::key(sender_id);
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key(name, value)
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| Error::Store {
                message: e.into_service_error().to_string(),
            })?;

        let Some(item) = output.item else {
            return Ok(None);
        };
        let item: ConversationItem =
            serde_dynamo::from_item(item).map_err(|e| Error::Serialization {
                message: e.to_string(),
            })?;

        // TTL deletion in DynamoDB is lazy, so check the expiry ourselves.
        if item.expires_at <= Utc::now().timestamp() {
            return Ok(None);
        }
        Ok(Some(item.conversation))
    }

    async fn put(&self, conversation: &Conversation, expected_version: u64) -> Result<(), Error> {
        let now = Utc::now();
        let item = ConversationItem {
            sender_id: conversation.sender_id.clone(),
            version: conversation.version,
            expires_at: expiry(self.ttl, now).timestamp(),
            conversation: conversation.clone(),
        };
        let item: HashMap<String, AttributeValue> =
            serde_dynamo::to_item(item).map_err(|e| Error::Serialization {
                message: e.to_string(),
            })?;

        let condition = WriteCondition::put(expected_version, now.timestamp());
        let result = self
            .client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(item))
            .condition_expression(condition.expression)
            .set_expression_attribute_values(Some(condition.values))
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_conditional_check_failed_exception() {
                    Err(Self::conflict(&conversation.sender_id))
                } else {
                    Err(Error::Store {
                        message: service_error.to_string(),
                    })
                }
            }
        }
    }

    async fn delete(&self, sender_id: &str, expected_version: u64) -> Result<(), Error> {
        let Some(condition) = WriteCondition::delete(expected_version) else {
            return Ok(());
        };

        let (name, value) = Self::key(sender_id);
        let result = self
            .client
            .delete_item()
            .table_name(&self.table)
            .key(name, value)
            .condition_expression(condition.expression)
            .set_expression_attribute_values(Some(condition.values))
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_conditional_check_failed_exception() {
                    Err(Self::conflict(sender_id))
                } else {
                    Err(Error::Store {
                        message: service_error.to_string(),
                    })
                }
            }
        }
    }
}
