//! IAM Role for Service Accounts
//!
//! The workload role carries the trust policy chosen at synthesis time
//! and gets the storage and queue access policies attached.

use serde_json::json;
use std::collections::BTreeMap;

use super::{policy_json, types};
use crate::error::Result;
use crate::stack::{Resource, ResourceRef, Stack};
use crate::trust::TrustPolicy;

/// Declare the workload role.
pub fn declare_role(
    stack: &mut Stack,
    role_name: &str,
    trust: &TrustPolicy,
    tags: &BTreeMap<String, String>,
) -> Result<ResourceRef> {
    stack.declare(Resource::new(
        "service-account-role",
        types::IAM_ROLE,
        json!({
            "name": role_name,
            "assumeRolePolicy": policy_json(&trust.document)?,
            "tags": tags,
        }),
    ))
}

/// Attach a managed policy to a role.
pub fn attach_policy(
    stack: &mut Stack,
    logical_name: &str,
    role: &ResourceRef,
    policy: &ResourceRef,
) -> Result<ResourceRef> {
    stack.declare(Resource::new(
        logical_name,
        types::IAM_ROLE_POLICY_ATTACHMENT,
        json!({
            "role": role.output("name"),
            "policyArn": policy.arn(),
        }),
    ))
}
