//! IAM Policy Documents
//!
//! Typed access and trust policy documents. Resource ARNs are late-bound
//! [`Output`]s, so a rendered document embeds `${resource.arn}`
//! interpolations that the engine fills in.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::output::Output;

/// IAM policy language version
pub const POLICY_VERSION: &str = "2012-10-17";

/// IAM action names (PUBLIC - same for all accounts)
pub mod actions {
    // ============================================================
    // S3
    // ============================================================

    pub const S3_GET_OBJECT: &str = "s3:GetObject";
    pub const S3_PUT_OBJECT: &str = "s3:PutObject";
    pub const S3_DELETE_OBJECT: &str = "s3:DeleteObject";
    pub const S3_LIST_BUCKET: &str = "s3:ListBucket";

    // ============================================================
    // SQS
    // ============================================================

    pub const SQS_SEND_MESSAGE: &str = "sqs:SendMessage";
    pub const SQS_RECEIVE_MESSAGE: &str = "sqs:ReceiveMessage";
    pub const SQS_DELETE_MESSAGE: &str = "sqs:DeleteMessage";
    pub const SQS_GET_QUEUE_ATTRIBUTES: &str = "sqs:GetQueueAttributes";
    pub const SQS_GET_QUEUE_URL: &str = "sqs:GetQueueUrl";

    // ============================================================
    // STS
    // ============================================================

    pub const STS_ASSUME_ROLE: &str = "sts:AssumeRole";
    pub const STS_ASSUME_ROLE_WITH_WEB_IDENTITY: &str = "sts:AssumeRoleWithWebIdentity";

    /// Object read/write plus listing
    pub const STORAGE: [&str; 4] = [S3_GET_OBJECT, S3_PUT_OBJECT, S3_DELETE_OBJECT, S3_LIST_BUCKET];

    /// Produce, consume and inspect messages
    pub const QUEUE: [&str; 5] = [
        SQS_SEND_MESSAGE,
        SQS_RECEIVE_MESSAGE,
        SQS_DELETE_MESSAGE,
        SQS_GET_QUEUE_ATTRIBUTES,
        SQS_GET_QUEUE_URL,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// Who a trust statement applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Principal {
    #[serde(rename = "AWS")]
    Aws(String),
    Federated(String),
}

/// A single action is rendered as a string, several as a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Actions {
    One(String),
    Many(Vec<String>),
}

impl Actions {
    pub fn contains(&self, action: &str) -> bool {
        match self {
            Actions::One(a) => a == action,
            Actions::Many(all) => all.iter().any(|a| a == action),
        }
    }
}

impl From<&[&str]> for Actions {
    fn from(actions: &[&str]) -> Self {
        Actions::Many(actions.iter().map(|a| a.to_string()).collect())
    }
}

/// Condition operator -> condition key -> value
pub type Conditions = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub effect: Effect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    pub action: Actions,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<Output>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub condition: Conditions,
}

impl Statement {
    /// Allow `actions` on `resources`
    pub fn allow(actions: &[&str], resources: Vec<Output>) -> Self {
        Self {
            effect: Effect::Allow,
            principal: None,
            action: actions.into(),
            resource: resources,
            condition: Conditions::new(),
        }
    }

    /// Allow `principal` to perform a single STS action
    pub fn trust(principal: Principal, action: &str) -> Self {
        Self {
            effect: Effect::Allow,
            principal: Some(principal),
            action: Actions::One(action.to_string()),
            resource: Vec::new(),
            condition: Conditions::new(),
        }
    }

    /// Add a `StringEquals` condition
    pub fn string_equals(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.condition
            .entry("StringEquals".to_string())
            .or_default()
            .insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: &'static str,
    pub statement: Vec<Statement>,
}

impl PolicyDocument {
    pub fn new(statement: Vec<Statement>) -> Self {
        Self {
            version: POLICY_VERSION,
            statement,
        }
    }

    /// Object access on a bucket and everything in it
    pub fn storage_access(bucket_arn: &Output) -> Self {
        Self::new(vec![Statement::allow(
            &actions::STORAGE,
            vec![bucket_arn.clone(), bucket_arn.suffixed("/*")],
        )])
    }

    /// Message access on a queue and its dead-letter queue
    pub fn queue_access(queue_arn: &Output, dlq_arn: &Output) -> Self {
        Self::new(vec![Statement::allow(
            &actions::QUEUE,
            vec![queue_arn.clone(), dlq_arn.clone()],
        )])
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
