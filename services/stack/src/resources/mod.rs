//! Resource Declarations
//!
//! One module per group of resources the stack owns:
//! - `storage`: data bucket with versioning, encryption and public access block
//! - `queue`: processing queue with its dead-letter queue
//! - `iam`: workload role and policy attachments
//! - `kubernetes`: namespace, IRSA service account and resource config map

pub mod iam;
pub mod kubernetes;
pub mod queue;
pub mod storage;

use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::policy::PolicyDocument;

/// Engine type tokens
pub mod types {
    pub const S3_BUCKET: &str = "aws:s3:Bucket";
    pub const S3_BUCKET_VERSIONING: &str = "aws:s3:BucketVersioningV2";
    pub const S3_BUCKET_ENCRYPTION: &str = "aws:s3:BucketServerSideEncryptionConfigurationV2";
    pub const S3_PUBLIC_ACCESS_BLOCK: &str = "aws:s3:BucketPublicAccessBlock";
    pub const SQS_QUEUE: &str = "aws:sqs:Queue";
    pub const IAM_POLICY: &str = "aws:iam:Policy";
    pub const IAM_ROLE: &str = "aws:iam:Role";
    pub const IAM_ROLE_POLICY_ATTACHMENT: &str = "aws:iam:RolePolicyAttachment";
    pub const K8S_NAMESPACE: &str = "kubernetes:core/v1:Namespace";
    pub const K8S_SERVICE_ACCOUNT: &str = "kubernetes:core/v1:ServiceAccount";
    pub const K8S_CONFIG_MAP: &str = "kubernetes:core/v1:ConfigMap";
}

/// Value of the `ManagedBy` tag and `app.kubernetes.io/managed-by` label
pub const MANAGED_BY: &str = "Pulumi";

/// Tags applied to every taggable AWS resource
pub fn common_tags(stack: &str, prefix: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("Environment".to_string(), stack.to_string()),
        ("Project".to_string(), prefix.to_string()),
        ("ManagedBy".to_string(), MANAGED_BY.to_string()),
        ("GitOps".to_string(), "true".to_string()),
    ])
}

/// Embed a policy document as a JSON string the engine renders once all
/// interpolations inside it are resolved
pub fn policy_json(document: &PolicyDocument) -> Result<Value> {
    Ok(json!({ "fn::toJSON": document.to_json()? }))
}
