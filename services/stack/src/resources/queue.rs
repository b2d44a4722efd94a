//! SQS Queues
//!
//! The processing queue redrives to a dead-letter queue after
//! [`MAX_RECEIVE_COUNT`] failed receives. The DLQ is declared first and
//! referenced by ARN, so the engine creates it before the main queue.

use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

use super::{policy_json, types};
use crate::error::Result;
use crate::output::Output;
use crate::policy::PolicyDocument;
use crate::stack::{Resource, ResourceRef, Stack};

/// Deliveries before a message moves to the dead-letter queue
pub const MAX_RECEIVE_COUNT: u32 = 3;

/// Message and delivery settings of the processing queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueAttributes {
    pub delay_seconds: u32,
    /// Bytes
    pub max_message_size: u32,
    pub message_retention_seconds: u32,
    pub visibility_timeout_seconds: u32,
    pub receive_wait_time_seconds: u32,
}

impl Default for QueueAttributes {
    fn default() -> Self {
        Self {
            delay_seconds: 0,
            max_message_size: 262_144,
            message_retention_seconds: 345_600,
            visibility_timeout_seconds: 30,
            receive_wait_time_seconds: 0,
        }
    }
}

/// Redrive policy of the processing queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedrivePolicy {
    dead_letter_target_arn: Output,
    max_receive_count: u32,
}

impl RedrivePolicy {
    pub fn to(dead_letter_target_arn: Output) -> Self {
        Self {
            dead_letter_target_arn,
            max_receive_count: MAX_RECEIVE_COUNT,
        }
    }

    pub fn max_receive_count(&self) -> u32 {
        self.max_receive_count
    }
}

/// Handles to the declared queue resources
#[derive(Debug, Clone)]
pub struct QueueResources {
    pub dead_letter: ResourceRef,
    pub queue: ResourceRef,
    pub access_policy: ResourceRef,
}

/// Declare the dead-letter queue, the processing queue and the policy
/// granting message access to both.
pub fn declare_queues(
    stack: &mut Stack,
    queue_name: &str,
    dead_letter_name: &str,
    policy_name: &str,
    tags: &BTreeMap<String, String>,
) -> Result<QueueResources> {
    let dead_letter = stack.declare(Resource::new(
        "dead-letter-queue",
        types::SQS_QUEUE,
        json!({
            "name": dead_letter_name,
            "tags": tags,
        }),
    ))?;

    let redrive = RedrivePolicy::to(dead_letter.arn());
    let mut properties = serde_json::to_value(QueueAttributes::default())?;
    if let Some(map) = properties.as_object_mut() {
        map.insert("name".to_string(), json!(queue_name));
        map.insert("redrivePolicy".to_string(), json!({ "fn::toJSON": redrive }));
        map.insert("tags".to_string(), json!(tags));
    }
    let queue = stack.declare(Resource::new("processing-queue", types::SQS_QUEUE, properties))?;

    let document = PolicyDocument::queue_access(&queue.arn(), &dead_letter.arn());
    let access_policy = stack.declare(Resource::new(
        "sqs-access-policy",
        types::IAM_POLICY,
        json!({
            "name": policy_name,
            "description": format!("Policy for accessing SQS queue {}", queue_name),
            "policy": policy_json(&document)?,
            "tags": tags,
        }),
    ))?;

    Ok(QueueResources {
        dead_letter,
        queue,
        access_policy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::common_tags;

    fn declared() -> (Stack, QueueResources) {
        let mut stack = Stack::new();
        let queues = declare_queues(
            &mut stack,
            "demo-processing-queue",
            "demo-processing-queue-dlq",
            "demo-processing-queue-access-policy",
            &common_tags("dev", "demo"),
        )
        .unwrap();
        (stack, queues)
    }

    #[test]
    fn test_redrive_count_is_fixed() {
        let policy = RedrivePolicy::to(Output::literal("arn:aws:sqs:us-east-1:1:dlq"));
        assert_eq!(policy.max_receive_count(), 3);
        let json = serde_json::to_value(&policy).unwrap();
        assert_eq!(json["maxReceiveCount"], 3);
        assert_eq!(json["deadLetterTargetArn"], "arn:aws:sqs:us-east-1:1:dlq");
    }

    #[test]
    fn test_dead_letter_declared_first() {
        let (stack, queues) = declared();
        let names: Vec<&str> = stack.resources().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["dead-letter-queue", "processing-queue", "sqs-access-policy"]);
        assert_eq!(
            stack.get(&queues.dead_letter.name).unwrap().properties["name"],
            "demo-processing-queue-dlq"
        );
    }

    #[test]
    fn test_processing_queue_attributes() {
        let (stack, queues) = declared();
        let props = &stack.get(&queues.queue.name).unwrap().properties;

        assert_eq!(props["name"], "demo-processing-queue");
        assert_eq!(props["delaySeconds"], 0);
        assert_eq!(props["maxMessageSize"], 262_144);
        assert_eq!(props["messageRetentionSeconds"], 345_600);
        assert_eq!(props["visibilityTimeoutSeconds"], 30);
        assert_eq!(props["receiveWaitTimeSeconds"], 0);

        let redrive = &props["redrivePolicy"]["fn::toJSON"];
        assert_eq!(redrive["deadLetterTargetArn"], "${dead-letter-queue.arn}");
        assert_eq!(redrive["maxReceiveCount"], MAX_RECEIVE_COUNT);
    }

    #[test]
    fn test_queue_depends_on_dead_letter_queue() {
        let (stack, queues) = declared();
        let queue = stack.get(&queues.queue.name).unwrap();
        assert!(queue.data_dependencies().contains("dead-letter-queue"));

        let policy = stack.get(&queues.access_policy.name).unwrap();
        let deps = policy.data_dependencies();
        assert!(deps.contains("processing-queue"));
        assert!(deps.contains("dead-letter-queue"));
    }
}
