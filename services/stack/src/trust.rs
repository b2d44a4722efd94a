//! IRSA Trust Policy
//!
//! Builds the assume-role policy of the workload role. When the EKS
//! cluster exists, the role trusts the cluster's OIDC provider for one
//! namespace/service-account subject. Before the cluster exists, the role
//! falls back to account-root trust gated by an external id; re-running
//! synthesis once the cluster is up switches it to federated trust.

use tracing::warn;

use crate::cloud::{CallerIdentity, ClusterInfo, CloudLookup};
use crate::naming::ResourceNames;
use crate::policy::{actions, PolicyDocument, Principal, Statement};

/// Audience projected service account tokens are issued for
pub const STS_AUDIENCE: &str = "sts.amazonaws.com";

/// Everything the trust policy is scoped by
#[derive(Debug, Clone)]
pub struct TrustContext {
    pub identity: CallerIdentity,
    pub namespace: String,
    pub names: ResourceNames,
}

/// Which trust relationship the role got
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustVariant {
    /// Account root may assume the role with the external id
    AccountRoot { external_id: String },
    /// The cluster's OIDC provider may assume the role for one subject
    Federated { issuer_host: String },
}

/// Trust policy plus the branch that produced it
#[derive(Debug, Clone)]
pub struct TrustPolicy {
    pub variant: TrustVariant,
    pub document: PolicyDocument,
}

impl TrustPolicy {
    pub fn is_federated(&self) -> bool {
        matches!(self.variant, TrustVariant::Federated { .. })
    }
}

/// Strip the URL scheme from an OIDC issuer.
///
/// IAM names OIDC providers and their condition keys by host and path
/// only; the provider ARN and both condition keys must use this exact
/// string or the role can never be assumed.
pub fn issuer_host(issuer: &str) -> &str {
    let trimmed = issuer.trim();
    let host = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    host.trim_end_matches('/')
}

/// Build the trust policy for an optional cluster.
pub fn build_trust_policy(ctx: &TrustContext, cluster: Option<&ClusterInfo>) -> TrustPolicy {
    match cluster {
        Some(cluster) => federated(ctx, cluster),
        None => account_root(ctx),
    }
}

/// Look up the workload cluster and build the matching trust policy.
///
/// A failed lookup is not an error: the role is created with account-root
/// trust and a warning is logged.
pub async fn resolve_trust_policy(lookup: &dyn CloudLookup, ctx: &TrustContext) -> TrustPolicy {
    let cluster_name = &ctx.names.cluster;

    match lookup.cluster(cluster_name).await {
        Ok(cluster) => build_trust_policy(ctx, Some(&cluster)),
        Err(e) => {
            warn!(
                cluster = %cluster_name,
                error = %e,
                "EKS cluster '{}' not found. IRSA will be configured but may not work until cluster exists.",
                cluster_name
            );
            build_trust_policy(ctx, None)
        }
    }
}

fn account_root(ctx: &TrustContext) -> TrustPolicy {
    let root = format!(
        "arn:{}:iam::{}:root",
        ctx.identity.partition, ctx.identity.account_id
    );
    let external_id = ctx.names.external_id.clone();

    let statement = Statement::trust(Principal::Aws(root), actions::STS_ASSUME_ROLE)
        .string_equals("sts:ExternalId", external_id.clone());

    TrustPolicy {
        variant: TrustVariant::AccountRoot { external_id },
        document: PolicyDocument::new(vec![statement]),
    }
}

fn federated(ctx: &TrustContext, cluster: &ClusterInfo) -> TrustPolicy {
    let host = issuer_host(&cluster.oidc_issuer).to_string();
    let provider_arn = format!(
        "arn:{}:iam::{}:oidc-provider/{}",
        ctx.identity.partition, ctx.identity.account_id, host
    );
    let subject = format!(
        "system:serviceaccount:{}:{}",
        ctx.namespace, ctx.names.service_account
    );

    let statement = Statement::trust(
        Principal::Federated(provider_arn),
        actions::STS_ASSUME_ROLE_WITH_WEB_IDENTITY,
    )
    .string_equals(format!("{}:sub", host), subject)
    .string_equals(format!("{}:aud", host), STS_AUDIENCE);

    TrustPolicy {
        variant: TrustVariant::Federated { issuer_host: host },
        document: PolicyDocument::new(vec![statement]),
    }
}
