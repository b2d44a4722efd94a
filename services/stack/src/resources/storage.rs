//! S3 Storage
//!
//! The data bucket plus the three companion resources that configure it,
//! and the IAM policy granting object access to it.

use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

use super::{policy_json, types};
use crate::error::Result;
use crate::policy::PolicyDocument;
use crate::stack::{Resource, ResourceRef, Stack};

/// Server-side encryption algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum SseAlgorithm {
    /// S3-managed keys
    #[default]
    #[serde(rename = "AES256")]
    Aes256,
}

impl std::fmt::Display for SseAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SseAlgorithm::Aes256 => write!(f, "AES256"),
        }
    }
}

/// Public access settings of a bucket.
///
/// Only the fully blocked configuration can be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicAccessBlock {
    block_public_acls: bool,
    block_public_policy: bool,
    ignore_public_acls: bool,
    restrict_public_buckets: bool,
}

impl PublicAccessBlock {
    pub fn fully_blocked() -> Self {
        Self {
            block_public_acls: true,
            block_public_policy: true,
            ignore_public_acls: true,
            restrict_public_buckets: true,
        }
    }

    pub fn is_fully_blocked(&self) -> bool {
        self.block_public_acls
            && self.block_public_policy
            && self.ignore_public_acls
            && self.restrict_public_buckets
    }
}

/// Desired state of the data bucket
#[derive(Debug, Clone)]
pub struct BucketSpec {
    pub name: String,
    pub tags: BTreeMap<String, String>,
    pub versioning: bool,
    pub encryption: SseAlgorithm,
    pub public_access: PublicAccessBlock,
}

impl BucketSpec {
    /// Versioned, AES256-encrypted, never public
    pub fn new(name: impl Into<String>, tags: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            tags,
            versioning: true,
            encryption: SseAlgorithm::default(),
            public_access: PublicAccessBlock::fully_blocked(),
        }
    }
}

/// Handles to the declared storage resources
#[derive(Debug, Clone)]
pub struct StorageResources {
    pub bucket: ResourceRef,
    pub versioning: ResourceRef,
    pub encryption: ResourceRef,
    pub public_access_block: ResourceRef,
    pub access_policy: ResourceRef,
}

/// Declare the bucket, its configuration and its access policy.
pub fn declare_storage(
    stack: &mut Stack,
    spec: &BucketSpec,
    policy_name: &str,
) -> Result<StorageResources> {
    let bucket = stack.declare(Resource::new(
        "data-bucket",
        types::S3_BUCKET,
        json!({
            "bucket": spec.name,
            "tags": spec.tags,
        }),
    ))?;

    let status = if spec.versioning { "Enabled" } else { "Suspended" };
    let versioning = stack.declare(Resource::new(
        "bucket-versioning",
        types::S3_BUCKET_VERSIONING,
        json!({
            "bucket": bucket.id(),
            "versioningConfiguration": { "status": status },
        }),
    ))?;

    let encryption = stack.declare(Resource::new(
        "bucket-encryption",
        types::S3_BUCKET_ENCRYPTION,
        json!({
            "bucket": bucket.id(),
            "rules": [{
                "applyServerSideEncryptionByDefault": {
                    "sseAlgorithm": spec.encryption,
                },
            }],
        }),
    ))?;

    let block = spec.public_access;
    let public_access_block = stack.declare(Resource::new(
        "bucket-public-access-block",
        types::S3_PUBLIC_ACCESS_BLOCK,
        json!({
            "bucket": bucket.id(),
            "blockPublicAcls": block.block_public_acls,
            "blockPublicPolicy": block.block_public_policy,
            "ignorePublicAcls": block.ignore_public_acls,
            "restrictPublicBuckets": block.restrict_public_buckets,
        }),
    ))?;

    let document = PolicyDocument::storage_access(&bucket.arn());
    let access_policy = stack.declare(Resource::new(
        "s3-access-policy",
        types::IAM_POLICY,
        json!({
            "name": policy_name,
            "description": format!("Policy for accessing S3 bucket {}", spec.name),
            "policy": policy_json(&document)?,
            "tags": spec.tags,
        }),
    ))?;

    Ok(StorageResources {
        bucket,
        versioning,
        encryption,
        public_access_block,
        access_policy,
    })
}
