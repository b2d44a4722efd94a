//! Cloud Lookups
//!
//! The only reads synthesis performs against a real account: who is
//! calling (account id and partition) and whether the workload cluster
//! exists yet (its OIDC issuer).

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use tracing::{debug, info};

/// Account the stack is synthesized for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub account_id: String,
    /// `aws`, `aws-cn`, `aws-us-gov`, ...
    pub partition: String,
}

impl CallerIdentity {
    pub fn new(account_id: impl Into<String>, partition: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            partition: partition.into(),
        }
    }

    /// Build from an STS caller ARN (`arn:<partition>:sts::<account>:...`)
    pub fn from_arn(arn: &str) -> Option<Self> {
        let mut parts = arn.splitn(6, ':');
        if parts.next()? != "arn" {
            return None;
        }
        let partition = parts.next().filter(|p| !p.is_empty())?;
        let _service = parts.next()?;
        let _region = parts.next()?;
        let account = parts.next().filter(|a| !a.is_empty())?;
        Some(Self::new(account, partition))
    }
}

/// An EKS cluster that was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterInfo {
    pub name: String,
    /// OIDC issuer URL, scheme included
    pub oidc_issuer: String,
}

/// Trait for the account lookups synthesis depends on
#[async_trait]
pub trait CloudLookup: Send + Sync {
    /// Resolve the calling account
    async fn caller_identity(&self) -> Result<CallerIdentity>;

    /// Resolve a cluster by name. Errors when it does not exist.
    async fn cluster(&self, name: &str) -> Result<ClusterInfo>;
}

/// AWS lookup - STS GetCallerIdentity and EKS DescribeCluster
pub struct AwsCloudLookup {
    sts: aws_sdk_sts::Client,
    eks: aws_sdk_eks::Client,
    region: String,
}

impl std::fmt::Debug for AwsCloudLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCloudLookup")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl AwsCloudLookup {
    /// Create clients from the default credential chain for `region`.
    pub async fn new(region: &str) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;

        Self::from_sdk_config(&sdk_config, region)
    }

    pub fn from_sdk_config(sdk_config: &SdkConfig, region: &str) -> Self {
        debug!(region = %region, "Initializing AWS lookup clients");
        Self {
            sts: aws_sdk_sts::Client::new(sdk_config),
            eks: aws_sdk_eks::Client::new(sdk_config),
            region: region.to_string(),
        }
    }
}

#[async_trait]
impl CloudLookup for AwsCloudLookup {
    async fn caller_identity(&self) -> Result<CallerIdentity> {
        let response = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .context("Failed to call STS GetCallerIdentity")?;

        let arn = response.arn().context("STS response has no caller ARN")?;
        let mut identity = CallerIdentity::from_arn(arn)
            .with_context(|| format!("Unrecognized caller ARN: {}", arn))?;

        if let Some(account) = response.account() {
            identity.account_id = account.to_string();
        }

        info!(
            account = %identity.account_id,
            partition = %identity.partition,
            "Resolved caller identity"
        );
        Ok(identity)
    }

    async fn cluster(&self, name: &str) -> Result<ClusterInfo> {
        let response = self
            .eks
            .describe_cluster()
            .name(name)
            .send()
            .await
            .with_context(|| format!("Failed to describe EKS cluster {}", name))?;

        let issuer = response
            .cluster()
            .and_then(|c| c.identity())
            .and_then(|i| i.oidc())
            .and_then(|o| o.issuer())
            .with_context(|| format!("EKS cluster {} has no OIDC issuer", name))?;

        info!(cluster = %name, issuer = %issuer, "Resolved EKS cluster");
        Ok(ClusterInfo {
            name: name.to_string(),
            oidc_issuer: issuer.to_string(),
        })
    }
}

/// Offline lookup with fixed answers
///
/// Used by `--offline` and by tests. Without an issuer every cluster
/// lookup fails, which selects account-root trust.
#[derive(Debug, Clone)]
pub struct StaticCloudLookup {
    identity: CallerIdentity,
    oidc_issuer: Option<String>,
}

impl StaticCloudLookup {
    pub fn new(identity: CallerIdentity) -> Self {
        Self {
            identity,
            oidc_issuer: None,
        }
    }

    /// Answer every cluster lookup with this issuer
    pub fn with_oidc_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.oidc_issuer = Some(issuer.into());
        self
    }
}

#[async_trait]
impl CloudLookup for StaticCloudLookup {
    async fn caller_identity(&self) -> Result<CallerIdentity> {
        Ok(self.identity.clone())
    }

    async fn cluster(&self, name: &str) -> Result<ClusterInfo> {
        let issuer = self
            .oidc_issuer
            .as_ref()
            .with_context(|| format!("EKS cluster {} not found", name))?;

        Ok(ClusterInfo {
            name: name.to_string(),
            oidc_issuer: issuer.clone(),
        })
    }
}
